//! Mock version of TwsiHandle
use crate::error::Result;
use mockall::mock;

mock! {
    pub TwsiHandle {
        pub fn open(index: u8) -> Result<Self>;
        pub fn set_speed(&self, hz: u32) -> Result<()>;
        pub fn read_write(
            &self,
            slave: u8,
            sub_addr: &[u8],
            write: &[u8],
            read: &mut [u8],
        ) -> Result<usize>;
    }
}
