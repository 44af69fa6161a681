//! Mock version of GpioHandle
use crate::error::Result;
use mockall::mock;

mock! {
    pub GpioHandle {
        pub fn open() -> Result<Self>;
        pub fn set_function(&self, pin: u32, function: u32) -> Result<()>;
        pub fn set_output(&self, pin: u32, output: bool) -> Result<()>;
        pub fn write(&self, pin: u32, value: bool) -> Result<()>;
        pub fn read(&self, pin: u32) -> Result<bool>;
    }
}
