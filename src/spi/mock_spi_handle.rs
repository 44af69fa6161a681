//! Mock version of SpiHandle
use crate::error::Result;
use mockall::mock;

mock! {
    pub SpiHandle {
        pub fn open(path: &str) -> Result<Self>;
        pub fn configure(&mut self, mode: u8, speed_hz: u32) -> Result<()>;
        pub fn transfer(&self, tx: &[u8], rx: &mut [u8]) -> Result<()>;
    }
}
