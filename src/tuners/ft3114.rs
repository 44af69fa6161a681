use std::thread;
use std::time::Duration;

use super::{Tuner, TunerInfo};
use crate::bus::I2cBus;
use crate::error::{HwStateError, Result};
use crate::{DeliverySystem, TuneParams};
use log::{debug, info, warn};

pub const TUNER_ID: &str = "ft3114";

/// The FT3114 has no ID register; it is never probed.
pub const TUNER_INFO: TunerInfo = TunerInfo {
    id: TUNER_ID,
    name: "NuTune FT3114",
    i2c_addr: 0x61,
    wake: &[],
    check_addr: 0x00,
    check_vals: &[],
};

pub const DEFAULT_IF_HZ: u32 = 36_125_000;

// Status byte
const STATUS_POR: u8 = 0x80;
const STATUS_FL: u8 = 0x40;
/// Internal RF AGC has taken over the gain.
const STATUS_AGC: u8 = 0x08;
const STATUS_ADC_MASK: u8 = 0x07;

// Control byte: charge pump high, reference divider per step size
const CB_STEP_166K: u8 = 0xca;
const CB_STEP_62K5: u8 = 0xce;

// Band switch byte
const BB_VHF_LOW: u8 = 0x01;
const BB_VHF_HIGH: u8 = 0x02;
const BB_UHF: u8 = 0x04;
const BB_SAW_8MHZ: u8 = 0x08;

const VHF_LOW_LIMIT_KHZ: u32 = 174_000;
const VHF_HIGH_LIMIT_KHZ: u32 = 470_000;

const LOCK_POLL_TRIES: usize = 10;
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Synthesiser step as a fraction num/den Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    num: u64,
    den: u64,
    control: u8,
}

const STEP_166K: Step = Step {
    num: 500_000,
    den: 3,
    control: CB_STEP_166K,
};

const STEP_62K5: Step = Step {
    num: 62_500,
    den: 1,
    control: CB_STEP_62K5,
};

#[derive(Debug, Clone, Copy)]
pub struct Ft3114Config {
    pub i2c_addr: u8,
    pub if_hz: u32,
}

impl Default for Ft3114Config {
    fn default() -> Self {
        Ft3114Config {
            i2c_addr: TUNER_INFO.i2c_addr,
            if_hz: DEFAULT_IF_HZ,
        }
    }
}

#[derive(Debug)]
pub struct Ft3114 {
    config: Ft3114Config,
    frequency_khz: u32,
    control: u8,
}

impl Ft3114 {
    pub fn new(config: Ft3114Config) -> Ft3114 {
        Ft3114 {
            config,
            frequency_khz: 0,
            control: CB_STEP_166K,
        }
    }

    fn read_status(&self, bus: &I2cBus) -> Result<u8> {
        let mut status = [0u8; 1];
        bus.read_raw(self.config.i2c_addr, &mut status)?;
        Ok(status[0])
    }

    /// Whether the internal RF AGC is active.
    pub fn agc_active(&self, bus: &I2cBus) -> Result<bool> {
        Ok(self.read_status(bus)? & STATUS_AGC != 0)
    }
}

fn band_switch(frequency_khz: u32) -> u8 {
    if frequency_khz < VHF_LOW_LIMIT_KHZ {
        BB_VHF_LOW
    } else if frequency_khz < VHF_HIGH_LIMIT_KHZ {
        BB_VHF_HIGH
    } else {
        BB_UHF
    }
}

/// Divider word for `rf_hz + if_hz`, rounded to the nearest step.
fn divider(rf_hz: u64, if_hz: u64, step: Step) -> u16 {
    (((rf_hz + if_hz) * step.den + step.num / 2) / step.num) as u16
}

impl Tuner for Ft3114 {
    fn get_info(&self) -> TunerInfo {
        TUNER_INFO
    }

    fn init(&mut self, bus: &I2cBus) -> Result<()> {
        let status = self.read_status(bus)?;
        if status & STATUS_POR != 0 {
            info!("FT3114 at {:#04x} came out of power-on reset", self.config.i2c_addr);
        }
        Ok(())
    }

    fn sleep(&mut self, bus: &I2cBus) -> Result<()> {
        // Control byte followed by an empty band switch turns every band off
        bus.write_raw(self.config.i2c_addr, &[self.control, 0x00])?;
        Ok(())
    }

    fn set_params(&mut self, bus: &I2cBus, params: &TuneParams) -> Result<()> {
        let step = match params.system {
            DeliverySystem::DvbC => STEP_62K5,
            DeliverySystem::DvbT | DeliverySystem::DvbT2 => STEP_166K,
            sys => return Err(HwStateError::Unsupported(sys).into()),
        };

        let rf_hz = params.frequency_khz as u64 * 1000;
        let if_hz = self.config.if_hz as u64;
        let n = divider(rf_hz, if_hz, step);

        let mut bb = band_switch(params.frequency_khz);
        if params.bandwidth_hz >= 8_000_000 {
            bb |= BB_SAW_8MHZ;
        }
        let buf = [((n >> 8) & 0x7f) as u8, n as u8, step.control, bb];
        debug!("ft3114: N {} bytes {:02x?}", n, buf);
        bus.write_raw(self.config.i2c_addr, &buf)?;

        self.control = step.control;
        let lo_hz = n as u64 * step.num / step.den;
        self.frequency_khz = ((lo_hz - if_hz) / 1000) as u32;

        for _ in 0..LOCK_POLL_TRIES {
            let status = self.read_status(bus)?;
            if status & STATUS_FL != 0 {
                debug!(
                    "ft3114: locked at {} kHz, AGC {}",
                    self.frequency_khz,
                    if status & STATUS_AGC != 0 { "on" } else { "off" }
                );
                return Ok(());
            }
            thread::sleep(LOCK_POLL_INTERVAL);
        }
        warn!("ft3114: PLL not locked at {} kHz", self.frequency_khz);
        Ok(())
    }

    fn get_frequency(&self) -> u32 {
        self.frequency_khz
    }

    fn get_if_freq(&self) -> u32 {
        self.config.if_hz
    }

    fn is_locked(&self, bus: &I2cBus) -> Result<bool> {
        Ok(self.read_status(bus)? & STATUS_FL != 0)
    }

    fn get_rf_strength(&self, bus: &I2cBus) -> Result<Option<u16>> {
        let adc = (self.read_status(bus)? & STATUS_ADC_MASK) as u32;
        Ok(Some((adc * 0xffff / STATUS_ADC_MASK as u32) as u16))
    }
}
