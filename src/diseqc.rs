//! DiSEqC message builders and LNB band/polarisation selection.
//!
//! Messages are plain byte patterns; sending them is up to the
//! demodulator (see `Demod::send_diseqc`).
use std::f64::consts::PI;

use crate::error::FrontendError::FrontendErr;
use crate::error::Result;

pub const DISEQC_MIN_LEN: usize = 3;
pub const DISEQC_MAX_LEN: usize = 6;

// Framing bytes
const FRAMING_MASTER_NO_REPLY: u8 = 0xe0;
// Address bytes
const ADDR_ANY: u8 = 0x00;
const ADDR_LNB_SWITCH: u8 = 0x10;
const ADDR_POSITIONER: u8 = 0x31;
// Commands
const CMD_RESET: u8 = 0x00;
const CMD_POWER_ON: u8 = 0x03;
const CMD_COMMITTED: u8 = 0x38;
const CMD_UNCOMMITTED: u8 = 0x39;
const CMD_ODU_CHANNEL_CHANGE: u8 = 0x5a;
const CMD_HALT: u8 = 0x60;
const CMD_LIMITS_OFF: u8 = 0x63;
const CMD_LIMIT_EAST: u8 = 0x66;
const CMD_LIMIT_WEST: u8 = 0x67;
const CMD_DRIVE_EAST: u8 = 0x68;
const CMD_DRIVE_WEST: u8 = 0x69;
const CMD_STORE: u8 = 0x6a;
const CMD_GOTO: u8 = 0x6b;
const CMD_GOTO_X: u8 = 0x6e;
const CMD_RECALCULATE: u8 = 0x6f;

/// Equatorial earth radius over geostationary orbit radius.
const EARTH_TO_GEO_RATIO: f64 = 6378.14 / 42164.2;
/// USALS encodes tenths of a degree with these nibbles.
const GOTO_X_FRACTION: [u8; 10] = [0x00, 0x02, 0x03, 0x05, 0x06, 0x08, 0x0a, 0x0b, 0x0d, 0x0e];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LnbVoltage {
    Off,
    V13,
    V18,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Off,
    On,
}

/// Mini-DiSEqC tone burst: A is unmodulated, B is modulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneBurst {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarization {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiseqcMessage {
    bytes: [u8; DISEQC_MAX_LEN],
    len: usize,
}

impl DiseqcMessage {
    pub fn new(bytes: &[u8]) -> Result<DiseqcMessage> {
        if bytes.len() < DISEQC_MIN_LEN || bytes.len() > DISEQC_MAX_LEN {
            return Err(FrontendErr(format!(
                "DiSEqC message must be {}..={} bytes, got {}",
                DISEQC_MIN_LEN,
                DISEQC_MAX_LEN,
                bytes.len()
            )));
        }
        let mut msg = DiseqcMessage {
            bytes: [0; DISEQC_MAX_LEN],
            len: bytes.len(),
        };
        msg.bytes[..bytes.len()].copy_from_slice(bytes);
        Ok(msg)
    }

    fn from_fixed(bytes: &[u8]) -> DiseqcMessage {
        let mut msg = DiseqcMessage {
            bytes: [0; DISEQC_MAX_LEN],
            len: bytes.len(),
        };
        msg.bytes[..bytes.len()].copy_from_slice(bytes);
        msg
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn reset() -> DiseqcMessage {
        Self::from_fixed(&[FRAMING_MASTER_NO_REPLY, ADDR_ANY, CMD_RESET])
    }

    pub fn power_on() -> DiseqcMessage {
        Self::from_fixed(&[FRAMING_MASTER_NO_REPLY, ADDR_ANY, CMD_POWER_ON])
    }

    /// Committed switch, port 0..=3 (option/position bits).
    pub fn committed(port: u8, pol: Polarization, high_band: bool) -> Result<DiseqcMessage> {
        if port > 3 {
            return Err(FrontendErr(format!("committed switch port {} out of range", port)));
        }
        let mut data = 0xf0 | (port << 2);
        if pol == Polarization::Horizontal {
            data |= 0x02;
        }
        if high_band {
            data |= 0x01;
        }
        Ok(Self::from_fixed(&[
            FRAMING_MASTER_NO_REPLY,
            ADDR_LNB_SWITCH,
            CMD_COMMITTED,
            data,
        ]))
    }

    /// Uncommitted switch, port 0..=15.
    pub fn uncommitted(port: u8) -> Result<DiseqcMessage> {
        if port > 15 {
            return Err(FrontendErr(format!("uncommitted switch port {} out of range", port)));
        }
        Ok(Self::from_fixed(&[
            FRAMING_MASTER_NO_REPLY,
            ADDR_LNB_SWITCH,
            CMD_UNCOMMITTED,
            0xf0 | port,
        ]))
    }

    pub fn halt() -> DiseqcMessage {
        Self::positioner(CMD_HALT)
    }

    pub fn limits_off() -> DiseqcMessage {
        Self::positioner(CMD_LIMITS_OFF)
    }

    pub fn limit_east() -> DiseqcMessage {
        Self::positioner(CMD_LIMIT_EAST)
    }

    pub fn limit_west() -> DiseqcMessage {
        Self::positioner(CMD_LIMIT_WEST)
    }

    pub fn recalculate() -> DiseqcMessage {
        Self::positioner(CMD_RECALCULATE)
    }

    /// Drive east. `steps` 0 means continuous, 1..=127 steps, 0x80.. is a
    /// timed drive in the positioner's own encoding.
    pub fn drive_east(steps: u8) -> DiseqcMessage {
        Self::positioner_arg(CMD_DRIVE_EAST, steps)
    }

    pub fn drive_west(steps: u8) -> DiseqcMessage {
        Self::positioner_arg(CMD_DRIVE_WEST, steps)
    }

    pub fn store(position: u8) -> DiseqcMessage {
        Self::positioner_arg(CMD_STORE, position)
    }

    pub fn goto(position: u8) -> DiseqcMessage {
        Self::positioner_arg(CMD_GOTO, position)
    }

    /// USALS "goto angle". Positive angles are east of the meridian.
    pub fn goto_angle(angle_deg: f64) -> DiseqcMessage {
        let (dir, angle) = if angle_deg < 0.0 {
            (0xd0_u16, -angle_deg)
        } else {
            (0xe0_u16, angle_deg)
        };
        let mut whole = angle.trunc() as u16;
        let mut tenths = ((angle - angle.trunc()) * 10.0).round() as usize;
        if tenths == 10 {
            whole += 1;
            tenths = 0;
        }
        let cmd = (dir << 8)
            | ((whole / 16) << 8)
            | ((whole % 16) << 4)
            | GOTO_X_FRACTION[tenths] as u16;
        Self::from_fixed(&[
            FRAMING_MASTER_NO_REPLY,
            ADDR_POSITIONER,
            CMD_GOTO_X,
            (cmd >> 8) as u8,
            cmd as u8,
        ])
    }

    /// Unicable (EN50494) ODU_Channel_change for user band `ub` (0..=7)
    /// and bank (0..=7), tuning the LNB IF `if_khz` onto the user band
    /// centre `ub_freq_khz`.
    pub fn unicable_channel_change(
        ub: u8,
        bank: u8,
        if_khz: u32,
        ub_freq_khz: u32,
    ) -> Result<DiseqcMessage> {
        if ub > 7 || bank > 7 {
            return Err(FrontendErr(format!(
                "unicable user band {} / bank {} out of range",
                ub, bank
            )));
        }
        let t = ((if_khz + ub_freq_khz) as f64 / 4000.0).round() as i64 - 350;
        if !(0..=0x3ff).contains(&t) {
            return Err(FrontendErr(format!(
                "unicable tuning word {} out of range for IF {} kHz",
                t, if_khz
            )));
        }
        let t = t as u16;
        Ok(Self::from_fixed(&[
            FRAMING_MASTER_NO_REPLY,
            ADDR_LNB_SWITCH,
            CMD_ODU_CHANNEL_CHANGE,
            (ub << 5) | (bank << 2) | ((t >> 8) as u8 & 0x03),
            t as u8,
        ]))
    }

    fn positioner(cmd: u8) -> DiseqcMessage {
        Self::from_fixed(&[FRAMING_MASTER_NO_REPLY, ADDR_POSITIONER, cmd])
    }

    fn positioner_arg(cmd: u8, arg: u8) -> DiseqcMessage {
        Self::from_fixed(&[FRAMING_MASTER_NO_REPLY, ADDR_POSITIONER, cmd, arg])
    }
}

/// Motor hour angle in degrees for a polar mount at `site_lat`/`site_long`
/// pointing at a geostationary satellite at `sat_long`. East positive.
pub fn usals_angle(site_lat: f64, site_long: f64, sat_long: f64) -> f64 {
    let dlon = (sat_long - site_long) * PI / 180.0;
    let phi = site_lat * PI / 180.0;
    let angle = dlon.sin().atan2(dlon.cos() - EARTH_TO_GEO_RATIO * phi.cos());
    angle * 180.0 / PI
}

/// Local oscillator plan of a (universal) Ku-band LNB. Frequencies in kHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LnbConfig {
    pub lo_low: u32,
    pub lo_high: u32,
    pub switch_freq: u32,
}

impl Default for LnbConfig {
    fn default() -> Self {
        LnbConfig {
            lo_low: 9_750_000,
            lo_high: 10_600_000,
            switch_freq: 11_700_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LnbSetting {
    pub if_khz: u32,
    pub tone: Tone,
    pub voltage: LnbVoltage,
    pub high_band: bool,
}

impl LnbConfig {
    /// Band, tone, supply voltage and IF for a downlink frequency.
    pub fn if_for(&self, freq_khz: u32, pol: Polarization) -> Result<LnbSetting> {
        let high_band = self.lo_high > 0 && freq_khz >= self.switch_freq;
        let lo = if high_band { self.lo_high } else { self.lo_low };
        if freq_khz < lo {
            return Err(FrontendErr(format!(
                "{} kHz is below the LNB oscillator ({} kHz)",
                freq_khz, lo
            )));
        }
        Ok(LnbSetting {
            if_khz: freq_khz - lo,
            tone: if high_band { Tone::On } else { Tone::Off },
            voltage: match pol {
                Polarization::Vertical => LnbVoltage::V13,
                Polarization::Horizontal => LnbVoltage::V18,
            },
            high_band,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_length_bounds() {
        assert!(DiseqcMessage::new(&[0xe0, 0x10]).is_err());
        assert!(DiseqcMessage::new(&[0xe0; 7]).is_err());
        let msg = DiseqcMessage::new(&[0xe0, 0x10, 0x38, 0xf3]).unwrap();
        assert_eq!(msg.as_bytes(), &[0xe0, 0x10, 0x38, 0xf3]);
    }

    #[test]
    fn test_committed_switch_bits() {
        let msg = DiseqcMessage::committed(1, Polarization::Horizontal, true).unwrap();
        assert_eq!(msg.as_bytes(), &[0xe0, 0x10, 0x38, 0xf7]);
        let msg = DiseqcMessage::committed(0, Polarization::Vertical, false).unwrap();
        assert_eq!(msg.as_bytes(), &[0xe0, 0x10, 0x38, 0xf0]);
        assert!(DiseqcMessage::committed(4, Polarization::Vertical, false).is_err());
    }

    #[test]
    fn test_positioner_commands() {
        assert_eq!(DiseqcMessage::halt().as_bytes(), &[0xe0, 0x31, 0x60]);
        assert_eq!(DiseqcMessage::goto(5).as_bytes(), &[0xe0, 0x31, 0x6b, 0x05]);
        assert_eq!(
            DiseqcMessage::drive_west(10).as_bytes(),
            &[0xe0, 0x31, 0x69, 0x0a]
        );
    }

    #[test]
    fn test_goto_angle_encoding() {
        // 19.2 degrees east: 0xE0 | 19/16, (19%16)<<4 | fraction(2)
        let msg = DiseqcMessage::goto_angle(19.2);
        assert_eq!(msg.as_bytes(), &[0xe0, 0x31, 0x6e, 0xe1, 0x33]);
        // 5.5 degrees west
        let msg = DiseqcMessage::goto_angle(-5.5);
        assert_eq!(msg.as_bytes(), &[0xe0, 0x31, 0x6e, 0xd0, 0x58]);
    }

    #[test]
    fn test_usals_angle() {
        // Satellite on the site meridian needs no rotation
        assert!(usals_angle(50.0, 10.0, 10.0).abs() < 1e-9);
        // East satellites give positive angles, and the angle exceeds the
        // longitude difference because the site is off the equator
        let east = usals_angle(50.0, 0.0, 19.2);
        assert!(east > 19.2 && east < 25.0);
        let west = usals_angle(50.0, 0.0, -19.2);
        assert!((east + west).abs() < 1e-9);
    }

    #[test]
    fn test_unicable_channel_change() {
        // IF 1210 MHz onto user band 1 at 1400 MHz: 2610/4 = 652.5 rounds to 653
        let msg = DiseqcMessage::unicable_channel_change(1, 2, 1_210_000, 1_400_000).unwrap();
        let t: u16 = 653 - 350;
        assert_eq!(
            msg.as_bytes(),
            &[0xe0, 0x10, 0x5a, (1 << 5) | (2 << 2) | (t >> 8) as u8, t as u8]
        );
        assert!(DiseqcMessage::unicable_channel_change(8, 0, 1_210_000, 1_400_000).is_err());
    }

    #[test]
    fn test_universal_lnb() {
        let lnb = LnbConfig::default();
        let low = lnb.if_for(11_362_000, Polarization::Vertical).unwrap();
        assert_eq!(low.if_khz, 1_612_000);
        assert_eq!(low.tone, Tone::Off);
        assert_eq!(low.voltage, LnbVoltage::V13);
        let high = lnb.if_for(12_188_000, Polarization::Horizontal).unwrap();
        assert_eq!(high.if_khz, 1_588_000);
        assert_eq!(high.tone, Tone::On);
        assert_eq!(high.voltage, LnbVoltage::V18);
        assert!(lnb.if_for(9_000_000, Polarization::Vertical).is_err());
    }
}
