use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

use crate::error::Result;
use crate::ioctl::{
    spi_message, spi_set_bits_per_word, spi_set_max_speed, spi_set_mode, SpiIocTransfer,
};

/// An open SPI character device.
#[derive(Debug)]
pub struct SpiHandle {
    file: File,
    speed_hz: u32,
}

impl SpiHandle {
    pub fn open(path: &str) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(SpiHandle { file, speed_hz: 0 })
    }

    pub fn configure(&mut self, mode: u8, speed_hz: u32) -> Result<()> {
        let fd = self.file.as_raw_fd();
        let bits: u8 = 8;
        unsafe {
            spi_set_mode(fd, &mode)?;
            spi_set_bits_per_word(fd, &bits)?;
            spi_set_max_speed(fd, &speed_hz)?;
        }
        self.speed_hz = speed_hz;
        Ok(())
    }

    /// Full-duplex transfer under one chip-select assertion. `rx` may be
    /// empty for write-only frames; otherwise it must match `tx` in length.
    pub fn transfer(&self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        assert!(rx.is_empty() || rx.len() == tx.len());
        let xfer = SpiIocTransfer {
            tx_buf: tx.as_ptr() as u64,
            rx_buf: if rx.is_empty() { 0 } else { rx.as_mut_ptr() as u64 },
            len: tx.len() as u32,
            speed_hz: self.speed_hz,
            bits_per_word: 8,
            ..Default::default()
        };
        unsafe { spi_message(self.file.as_raw_fd(), &[xfer]) }?;
        Ok(())
    }
}
