pub mod gpio_handle;
#[cfg(test)]
pub(crate) mod mock_gpio_handle;

#[cfg(not(test))]
use gpio_handle::GpioHandle;
#[cfg(test)]
use mock_gpio_handle::MockGpioHandle as GpioHandle;

use crate::error::Result;
use log::debug;
use std::fmt;
use std::thread;
use std::time::Duration;

#[cfg(test)]
mod gpio_test;

/// Pinmux function number selecting plain GPIO on this SoC.
pub const PINMUX_FUNC_GPIO: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

pub struct Gpio {
    handle: GpioHandle,
}

impl fmt::Debug for Gpio {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Gpio")
    }
}

impl Gpio {
    pub fn open() -> Result<Gpio> {
        Ok(Gpio {
            handle: GpioHandle::open()?,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_handle(handle: GpioHandle) -> Gpio {
        Gpio { handle }
    }

    /// Route `pin` to the GPIO block and set its direction.
    pub fn configure(&self, pin: u32, direction: Direction) -> Result<()> {
        self.handle.set_function(pin, PINMUX_FUNC_GPIO)?;
        self.handle.set_output(pin, direction == Direction::Out)?;
        debug!("gpio {} configured as {:?}", pin, direction);
        Ok(())
    }

    pub fn output(&self, pin: u32, level: bool) -> Result<()> {
        self.handle.write(pin, level)
    }

    pub fn input(&self, pin: u32) -> Result<bool> {
        self.handle.read(pin)
    }

    /// Drive `pin` to `active` for `width`, then back to the inactive level.
    pub fn pulse(&self, pin: u32, active: bool, width: Duration) -> Result<()> {
        self.handle.write(pin, active)?;
        thread::sleep(width);
        self.handle.write(pin, !active)
    }
}
