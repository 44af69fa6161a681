pub mod constants;
pub use constants::*;
pub mod twsi_handle;
#[cfg(test)]
mod mock_twsi_handle;
#[cfg(test)]
pub(crate) mod fake_chip;

#[cfg(not(test))]
use twsi_handle::TwsiHandle;
#[cfg(test)]
use mock_twsi_handle::MockTwsiHandle as TwsiHandle;

use crate::error::Result;
use byteorder::{BigEndian, ByteOrder};
/// Register-level I2C access through a TWSI master
use log::{error, info};
use std::fmt;

#[cfg(test)]
mod bus_test;

pub struct I2cBus {
    handle: TwsiHandle,
}

impl fmt::Debug for I2cBus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "I2cBus")
    }
}

impl I2cBus {
    pub fn open(index: u8, speed: Speed) -> Result<I2cBus> {
        let handle = TwsiHandle::open(index)?;
        handle.set_speed(speed.hz())?;
        info!("Opened TWSI master {} at {} Hz", index, speed.hz());
        Ok(I2cBus { handle })
    }

    /// Write `data` starting at register `reg`. Long writes are split into
    /// several transactions with the sub-address advanced accordingly.
    pub fn write(&self, slave: u8, reg: u8, data: &[u8]) -> Result<usize> {
        let mut written = 0;
        for (i, chunk) in data.chunks(MAX_XFER_LEN).enumerate() {
            let sub_addr = [reg.wrapping_add((i * MAX_XFER_LEN) as u8)];
            written += match self.handle.read_write(slave, &sub_addr, chunk, &mut []) {
                Ok(n) => n,
                Err(e) => {
                    error!(
                        "i2c write failed: {} slave: {:#04x} reg: {:#04x} len: {}",
                        e,
                        slave,
                        sub_addr[0],
                        chunk.len()
                    );
                    return Err(e);
                }
            };
        }
        Ok(written)
    }

    /// Write the sub-address, then read `buf.len()` bytes from it.
    pub fn read(&self, slave: u8, reg: u8, buf: &mut [u8]) -> Result<usize> {
        match self.handle.read_write(slave, &[reg], &[], buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                error!(
                    "i2c read failed: {} slave: {:#04x} reg: {:#04x} len: {}",
                    e,
                    slave,
                    reg,
                    buf.len()
                );
                Err(e)
            }
        }
    }

    pub fn write_reg(&self, slave: u8, reg: u8, val: u8) -> Result<()> {
        self.write(slave, reg, &[val])?;
        Ok(())
    }

    pub fn read_reg(&self, slave: u8, reg: u8) -> Result<u8> {
        let mut data = [0_u8];
        self.read(slave, reg, &mut data)?;
        Ok(data[0])
    }

    /// Read-modify-write of the bits selected by `mask`.
    pub fn update_bits(&self, slave: u8, reg: u8, mask: u8, val: u8) -> Result<()> {
        let current = self.read_reg(slave, reg)?;
        let applied = (current & !mask) | (val & mask);
        self.write_reg(slave, reg, applied)
    }

    /// Write a list of (register, value) pairs in order.
    pub fn write_table(&self, slave: u8, table: &[(u8, u8)]) -> Result<()> {
        for &(reg, val) in table {
            self.write_reg(slave, reg, val)?;
        }
        Ok(())
    }

    /// Big-endian 16-bit word from two consecutive registers.
    pub fn read_u16_be(&self, slave: u8, reg: u8) -> Result<u16> {
        let mut data = [0_u8; 2];
        self.read(slave, reg, &mut data)?;
        Ok(BigEndian::read_u16(&data))
    }

    /// Plain write with no sub-address, for chips that take a fixed byte
    /// pattern (e.g. PLL divider/control bytes).
    pub fn write_raw(&self, slave: u8, data: &[u8]) -> Result<usize> {
        match self.handle.read_write(slave, &[], data, &mut []) {
            Ok(n) => Ok(n),
            Err(e) => {
                error!("i2c raw write failed: {} slave: {:#04x}", e, slave);
                Err(e)
            }
        }
    }

    /// Plain read with no sub-address, for chips that return a status byte.
    pub fn read_raw(&self, slave: u8, buf: &mut [u8]) -> Result<usize> {
        match self.handle.read_write(slave, &[], &[], buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                error!("i2c raw read failed: {} slave: {:#04x}", e, slave);
                Err(e)
            }
        }
    }
}
