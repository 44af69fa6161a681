pub mod spi_handle;
#[cfg(test)]
pub(crate) mod mock_spi_handle;

#[cfg(not(test))]
use spi_handle::SpiHandle;
#[cfg(test)]
use mock_spi_handle::MockSpiHandle as SpiHandle;

use crate::error::Result;
use log::{debug, error};
use std::fmt;

#[cfg(test)]
mod spi_test;

pub const SPI_MODE_0: u8 = 0x00;

/// Byte clocked out while reading.
const SPI_FILL: u8 = 0x00;

pub struct SpiBus {
    handle: SpiHandle,
}

impl fmt::Debug for SpiBus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SpiBus")
    }
}

impl SpiBus {
    pub fn open(path: &str, mode: u8, speed_hz: u32) -> Result<SpiBus> {
        let mut handle = SpiHandle::open(path)?;
        handle.configure(mode, speed_hz)?;
        debug!("Opened {} mode {} at {} Hz", path, mode, speed_hz);
        Ok(SpiBus { handle })
    }

    #[cfg(test)]
    pub(crate) fn from_handle(handle: SpiHandle) -> SpiBus {
        SpiBus { handle }
    }

    pub fn write(&self, frame: &[u8]) -> Result<()> {
        self.handle.transfer(frame, &mut []).map_err(|e| {
            error!("spi write of {} bytes failed: {}", frame.len(), e);
            e
        })
    }

    pub fn read(&self, len: usize) -> Result<Vec<u8>> {
        let tx = vec![SPI_FILL; len];
        let mut rx = vec![0_u8; len];
        self.handle.transfer(&tx, &mut rx).map_err(|e| {
            error!("spi read of {} bytes failed: {}", len, e);
            e
        })?;
        Ok(rx)
    }

    pub fn transfer(&self, tx: &[u8]) -> Result<Vec<u8>> {
        let mut rx = vec![0_u8; tx.len()];
        self.handle.transfer(tx, &mut rx)?;
        Ok(rx)
    }
}
