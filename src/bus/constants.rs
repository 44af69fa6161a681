#![allow(dead_code)]

pub const TWSI_DEV_PREFIX: &str = "/dev/twsi";
pub const SPI_DEV: &str = "/dev/spi1";
pub const GPIO_DEV: &str = "/dev/gpio";
pub const PINMUX_DEV: &str = "/dev/pinmux";

/// Highest TWSI master index exposed by the SoC.
pub const MAX_TWSI_INDEX: u8 = 3;

/// Sub-address bytes the TWSI driver accepts in a single transaction.
pub const MAX_SUB_ADDR_LEN: usize = 4;

/// Data bytes (excluding the sub-address) in one TWSI write. Longer
/// writes are split and the sub-address advanced.
pub const MAX_XFER_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    Standard,
    Fast,
}

impl Speed {
    pub fn hz(&self) -> u32 {
        match self {
            Speed::Standard => 100_000,
            Speed::Fast => 400_000,
        }
    }
}

impl Default for Speed {
    fn default() -> Self {
        Speed::Fast
    }
}
