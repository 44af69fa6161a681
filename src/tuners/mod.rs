pub mod ascot2s;
pub mod ft3114;
pub mod m88ts2022;

use std::fmt;

use crate::bus::I2cBus;
use crate::error::Result;
use crate::TuneParams;
use log::{error, info};
#[cfg(test)]
use mockall::automock;

// FT3114 has no ID register, so only the tuners that can be probed are listed
pub const KNOWN_TUNERS: [TunerInfo; 2] = [m88ts2022::TUNER_INFO, ascot2s::TUNER_INFO];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunerInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub i2c_addr: u8,
    /// Register writes that bring the chip out of reset before the ID
    /// register reads back.
    pub wake: &'static [(u8, u8)],
    pub check_addr: u8,
    /// Any of these in `check_addr` identifies the chip.
    pub check_vals: &'static [u8],
}

#[cfg_attr(test, automock)]
pub trait Tuner: fmt::Debug {
    fn get_info(&self) -> TunerInfo;
    fn init(&mut self, bus: &I2cBus) -> Result<()>;
    fn sleep(&mut self, bus: &I2cBus) -> Result<()>;
    fn set_params(&mut self, bus: &I2cBus, params: &TuneParams) -> Result<()>;
    /// Frequency actually programmed, in kHz
    fn get_frequency(&self) -> u32;
    /// IF handed to the demodulator, in Hz (0 for zero-IF tuners)
    fn get_if_freq(&self) -> u32;
    /// Tuners without a lock indicator report locked.
    fn is_locked(&self, _bus: &I2cBus) -> Result<bool> {
        Ok(true)
    }
    fn get_rf_strength(&self, _bus: &I2cBus) -> Result<Option<u16>> {
        Ok(None)
    }
}

/// Probe the known tuners' ID registers and return the first match. The
/// demodulator's I2C gate must already be open.
pub fn probe(bus: &I2cBus) -> Option<&'static str> {
    for tuner_info in KNOWN_TUNERS.iter() {
        info!(
            "Probing I2C address {:#04x} checking address {:#04x}",
            tuner_info.i2c_addr, tuner_info.check_addr
        );
        for &(reg, val) in tuner_info.wake {
            if let Err(e) = bus.write_reg(tuner_info.i2c_addr, reg, val) {
                error!("Wake write failed, continuing. Err: {}", e);
            }
        }
        match bus.read_reg(tuner_info.i2c_addr, tuner_info.check_addr) {
            Ok(val) => {
                if tuner_info.check_vals.contains(&val) {
                    return Some(tuner_info.id);
                }
            }
            Err(e) => {
                error!("Reading failed, continuing. Err: {}", e);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::fake_chip::FakeChip;

    #[test]
    fn test_probe_finds_ascot() {
        let chip = FakeChip::shared();
        {
            let info = ascot2s::TUNER_INFO;
            chip.lock()
                .unwrap()
                .set(info.i2c_addr, info.check_addr, info.check_vals[0]);
        }
        let bus = FakeChip::bus(&chip);
        assert_eq!(probe(&bus), Some(ascot2s::TUNER_ID));
    }

    #[test]
    fn test_probe_wakes_m88ts2022_second_id() {
        let chip = FakeChip::shared();
        chip.lock().unwrap().pin(0x60, 0x00, 0x83);
        let bus = FakeChip::bus(&chip);
        assert_eq!(probe(&bus), Some(m88ts2022::TUNER_ID));
        // reset release before the ID read
        assert_eq!(chip.lock().unwrap().writes_to(0x60, 0x00), vec![0x01, 0x03]);
    }

    #[test]
    fn test_probe_nothing() {
        let chip = FakeChip::shared();
        let bus = FakeChip::bus(&chip);
        assert_eq!(probe(&bus), None);
    }
}
