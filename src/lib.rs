//! # tvfe Library
//! Register-level drivers for DVB tuner and demodulator chips reached
//! through the kernel TWSI (I2C), SPI and GPIO character devices.
//!
//! Satellite: Montage M88DS3000 demodulator with the M88TS2022 tuner.
//! Terrestrial/cable: Sony CXD2820R demodulator with an ASCOT2S or
//! NuTune FT3114 tuner. CI+: CIMaX bridge on SPI.

pub mod bus;
pub mod cimax;
pub mod demods;
pub mod diseqc;
pub mod error;
mod frontend;
pub mod gpio;
mod ioctl;
pub mod monitor;
pub mod spi;
pub mod tuners;

pub use bus::{I2cBus, Speed};
pub use frontend::{Frontend, TerrestrialTuner};
pub use monitor::{LockState, SignalStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliverySystem {
    DvbS,
    DvbS2,
    DvbT,
    DvbT2,
    DvbC,
}

impl DeliverySystem {
    pub fn is_satellite(&self) -> bool {
        matches!(self, DeliverySystem::DvbS | DeliverySystem::DvbS2)
    }
}

/// What to tune to. Satellite frequencies are the LNB IF in kHz,
/// terrestrial/cable frequencies are RF in kHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuneParams {
    pub system: DeliverySystem,
    pub frequency_khz: u32,
    /// Symbols per second (satellite and cable)
    pub symbol_rate: u32,
    /// Channel bandwidth in Hz (terrestrial)
    pub bandwidth_hz: u32,
}

impl TuneParams {
    pub fn satellite(system: DeliverySystem, frequency_khz: u32, symbol_rate: u32) -> Self {
        TuneParams {
            system,
            frequency_khz,
            symbol_rate,
            bandwidth_hz: 0,
        }
    }

    pub fn terrestrial(system: DeliverySystem, frequency_khz: u32, bandwidth_hz: u32) -> Self {
        TuneParams {
            system,
            frequency_khz,
            symbol_rate: 0,
            bandwidth_hz,
        }
    }

    pub fn cable(frequency_khz: u32, symbol_rate: u32) -> Self {
        TuneParams {
            system: DeliverySystem::DvbC,
            frequency_khz,
            symbol_rate,
            bandwidth_hz: 8_000_000,
        }
    }
}
