use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

use crate::bus::{GPIO_DEV, PINMUX_DEV};
use crate::error::Result;
use crate::ioctl::{
    gpio_get_value, gpio_set_input, gpio_set_output, gpio_set_value, pinmux_set_function,
    GpioArgs, PinmuxArgs,
};

/// `/dev/gpio` plus `/dev/pinmux`, opened together.
#[derive(Debug)]
pub struct GpioHandle {
    gpio: File,
    pinmux: File,
}

impl GpioHandle {
    pub fn open() -> Result<Self> {
        Ok(GpioHandle {
            gpio: OpenOptions::new().read(true).write(true).open(GPIO_DEV)?,
            pinmux: OpenOptions::new().read(true).write(true).open(PINMUX_DEV)?,
        })
    }

    pub fn set_function(&self, pin: u32, function: u32) -> Result<()> {
        let args = PinmuxArgs { pin, function };
        unsafe { pinmux_set_function(self.pinmux.as_raw_fd(), &args) }?;
        Ok(())
    }

    pub fn set_output(&self, pin: u32, output: bool) -> Result<()> {
        let args = GpioArgs { pin, value: 0 };
        let fd = self.gpio.as_raw_fd();
        match output {
            true => unsafe { gpio_set_output(fd, &args) }?,
            false => unsafe { gpio_set_input(fd, &args) }?,
        };
        Ok(())
    }

    pub fn write(&self, pin: u32, value: bool) -> Result<()> {
        let args = GpioArgs {
            pin,
            value: value as u32,
        };
        unsafe { gpio_set_value(self.gpio.as_raw_fd(), &args) }?;
        Ok(())
    }

    pub fn read(&self, pin: u32) -> Result<bool> {
        let mut args = GpioArgs { pin, value: 0 };
        unsafe { gpio_get_value(self.gpio.as_raw_fd(), &mut args) }?;
        Ok(args.value != 0)
    }
}
