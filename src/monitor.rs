//! Lock state, signal statistics and the arithmetic shared by the
//! demodulator monitor functions.
use std::fmt;

use crate::bus::I2cBus;
use crate::error::{FrontendError, Result};

/// Demodulator acquisition progress, ordered from nothing to full lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LockState {
    NoSignal,
    Signal,
    Carrier,
    Viterbi,
    Sync,
    Locked,
}

impl Default for LockState {
    fn default() -> Self {
        LockState::NoSignal
    }
}

/// One snapshot of the monitor values. A field is `None` when the lock
/// state does not allow the value to be read.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SignalStats {
    pub lock: LockState,
    /// Relative strength, 0..=0xffff
    pub strength: Option<u16>,
    pub cnr_db: Option<f64>,
    pub mer_db: Option<f64>,
    pub post_bit_errors: Option<u64>,
    pub ucblocks: Option<u64>,
    pub carrier_offset_hz: Option<i32>,
    pub ppm: Option<f64>,
}

impl fmt::Display for SignalStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.lock)?;
        if let Some(s) = self.strength {
            write!(f, " strength {:5.1}%", s as f64 * 100.0 / 65535.0)?;
        }
        if let Some(cnr) = self.cnr_db {
            write!(f, " cnr {:.2} dB", cnr)?;
        }
        if let Some(mer) = self.mer_db {
            write!(f, " mer {:.2} dB", mer)?;
        }
        if let Some(ber) = self.post_bit_errors {
            write!(f, " ber {}", ber)?;
        }
        if let Some(ucb) = self.ucblocks {
            write!(f, " ucb {}", ucb)?;
        }
        if let Some(offset) = self.carrier_offset_hz {
            write!(f, " offset {} Hz", offset)?;
        }
        if let Some(ppm) = self.ppm {
            write!(f, " ({:+.2} ppm)", ppm)?;
        }
        Ok(())
    }
}

/// Sign-extend the low `bits` bits of `value`.
pub fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// 10·log10(ratio)
pub fn db10(ratio: f64) -> f64 {
    10.0 * ratio.log10()
}

/// Parts-per-million of `offset_hz` relative to `reference_hz`.
pub fn ppm(offset_hz: i32, reference_hz: u64) -> Option<f64> {
    if reference_hz == 0 {
        return None;
    }
    Some(offset_hz as f64 * 1e6 / reference_hz as f64)
}

/// Linearly map `value` in `min..=max` onto 0..=0xffff, clamping outside.
pub fn scale_to_u16(value: u32, min: u32, max: u32) -> u16 {
    let clamped = value.clamp(min, max);
    ((clamped - min) as u64 * 0xffff / (max - min) as u64) as u16
}

/// Run `read` with the chip's monitor registers frozen so multi-byte
/// counters come from one snapshot. The unfreeze write is issued even if
/// `read` fails; the first error wins.
pub fn with_frozen<T, F>(bus: &I2cBus, slave: u8, freeze_reg: u8, read: F) -> Result<T>
where
    F: FnOnce(&I2cBus) -> Result<T>,
{
    bus.write_reg(slave, freeze_reg, 0x01)?;
    let value = read(bus);
    let unfreeze = bus.write_reg(slave, freeze_reg, 0x00);
    let value = value?;
    unfreeze?;
    Ok(value)
}

/// Turn hardware-state errors into `None` so a stats snapshot can skip
/// values the chip cannot provide right now. Transport errors pass.
pub(crate) fn optional<T>(res: Result<T>) -> Result<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(FrontendError::HwState(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::fake_chip::FakeChip;
    use crate::error::HwStateError;

    #[test]
    fn test_lock_state_ordering() {
        assert!(LockState::Locked > LockState::Sync);
        assert!(LockState::Signal > LockState::NoSignal);
        assert!(LockState::Viterbi >= LockState::Carrier);
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0x1fff_ffff, 29), -1);
        assert_eq!(sign_extend(0x0fff_ffff, 29), 0x0fff_ffff);
        assert_eq!(sign_extend(0x2000, 14), -8192);
        assert_eq!(sign_extend(0x1000, 14), 4096);
    }

    #[test]
    fn test_scale_to_u16() {
        assert_eq!(scale_to_u16(100, 200, 300), 0);
        assert_eq!(scale_to_u16(400, 200, 300), 0xffff);
        assert_eq!(scale_to_u16(250, 200, 300), 0x7fff);
    }

    #[test]
    fn test_ppm() {
        assert_eq!(ppm(500, 0), None);
        let p = ppm(-1_000, 500_000_000).unwrap();
        assert!((p + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_with_frozen_unfreezes_on_error() {
        let chip = FakeChip::shared();
        let bus = FakeChip::bus(&chip);
        let res: Result<u8> = with_frozen(&bus, 0x6c, 0x01, |_| {
            Err(HwStateError::NotLocked.into())
        });
        assert!(res.is_err());
        assert_eq!(chip.lock().unwrap().writes_to(0x6c, 0x01), vec![0x01, 0x00]);
    }

    #[test]
    fn test_optional_maps_hw_state_only() {
        let hw: Result<u8> = Err(HwStateError::NotLocked.into());
        assert_eq!(optional(hw).unwrap(), None);
        let io: Result<u8> = Err(FrontendError::FrontendErr("boom".to_string()));
        assert!(optional(io).is_err());
    }
}
