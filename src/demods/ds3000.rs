//! Montage M88DS3000 DVB-S/S2 demodulator.
use std::thread;
use std::time::Duration;

use super::{active, gated, Demod, DemodInfo};
use crate::bus::I2cBus;
use crate::diseqc::{DiseqcMessage, LnbVoltage, Tone, ToneBurst};
use crate::error::{FrontendError, HwStateError, Result};
use crate::monitor::LockState;
use crate::tuners::Tuner;
use crate::{DeliverySystem, TuneParams};
use log::{debug, error, info, warn};

pub const DEMOD_ID: &str = "ds3000";

pub const DEMOD_INFO: DemodInfo = DemodInfo {
    id: DEMOD_ID,
    name: "Montage M88DS3000",
    i2c_addr: 0x68,
    systems: &[DeliverySystem::DvbS, DeliverySystem::DvbS2],
};

const CHIP_ID: u8 = 0xe0;
/// ADC sample rate in kHz
const SAMPLE_RATE_KHZ: i64 = 96_000;

const LOCK_WAIT_TRIES: usize = 30;
const LOCK_WAIT_INTERVAL: Duration = Duration::from_millis(10);

const DISEQC_POLL_TRIES: usize = 15;
const DISEQC_POLL_INTERVAL: Duration = Duration::from_millis(10);
const BURST_SETTLE: Duration = Duration::from_millis(13);
const BURST_POLL_TRIES: usize = 5;
const BURST_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// S2 BER is only meaningful once this many LDPC frames were decoded.
const S2_MIN_LDPC_FRAMES: u32 = 750;

// Signal-to-noise lookup tables, 10·log10 scaled
/// 10000·ln(n) for n = 1..=20
const DVBS_SNR_TAB: [u32; 20] = [
    0, 6931, 10986, 13863, 16094, 17918, 19459, 20794, 21972, 23026, 23979, 24849, 25649, 26391,
    27081, 27726, 28332, 28904, 29444, 29957,
];

/// 1000·10·log10(n) for n = 1..=80
const DVBS2_SNR_TAB: [u32; 80] = [
    0, 3010, 4771, 6021, 6990, 7782, 8451, 9031, 9542, 10000,
    10414, 10792, 11139, 11461, 11761, 12041, 12304, 12553, 12788, 13010,
    13222, 13424, 13617, 13802, 13979, 14150, 14314, 14472, 14624, 14771,
    14914, 15051, 15185, 15315, 15441, 15563, 15682, 15798, 15911, 16021,
    16128, 16232, 16335, 16435, 16532, 16628, 16721, 16812, 16902, 16990,
    17076, 17160, 17243, 17324, 17404, 17482, 17559, 17634, 17709, 17782,
    17853, 17924, 17993, 18062, 18129, 18195, 18261, 18325, 18388, 18451,
    18513, 18573, 18633, 18692, 18751, 18808, 18865, 18921, 18976, 19031,
];

const DVBS_INIT_TAB: [(u8, u8); 74] = [
    (0x23, 0x05), (0x08, 0x03), (0x0c, 0x00), (0x21, 0x54), (0x25, 0x82),
    (0x27, 0x31), (0x30, 0x08), (0x31, 0x40), (0x32, 0x32), (0x33, 0x35),
    (0x35, 0xff), (0x3a, 0x00), (0x37, 0x10), (0x38, 0x10), (0x39, 0x02),
    (0x42, 0x60), (0x4a, 0x40), (0x4b, 0x04), (0x4d, 0x91), (0x5d, 0xc8),
    (0x50, 0x77), (0x51, 0x77), (0x52, 0x36), (0x53, 0x36), (0x56, 0x01),
    (0x63, 0x43), (0x64, 0x30), (0x65, 0x40), (0x68, 0x26), (0x69, 0x4c),
    (0x70, 0x20), (0x71, 0x70), (0x72, 0x04), (0x73, 0x00), (0x70, 0x40),
    (0x71, 0x70), (0x72, 0x04), (0x73, 0x00), (0x70, 0x60), (0x71, 0x70),
    (0x72, 0x04), (0x73, 0x00), (0x70, 0x80), (0x71, 0x70), (0x72, 0x04),
    (0x73, 0x00), (0x70, 0xa0), (0x71, 0x70), (0x72, 0x04), (0x73, 0x00),
    (0x70, 0x1f), (0x76, 0x00), (0x77, 0xd1), (0x78, 0x0c), (0x79, 0x80),
    (0x7f, 0x04), (0x7c, 0x00), (0x80, 0x86), (0x81, 0xa6), (0x85, 0x04),
    (0xcd, 0xf4), (0x90, 0x33), (0xa0, 0x44), (0xc0, 0x18), (0xc3, 0x10),
    (0xc4, 0x08), (0xc5, 0x80), (0xc6, 0x80), (0xc7, 0x0a), (0xc8, 0x1a),
    (0xc9, 0x80), (0xe0, 0xf8), (0xe6, 0x8b), (0xd0, 0x40),
];

const DVBS2_INIT_TAB: [(u8, u8); 78] = [
    (0x23, 0x0f), (0x08, 0x07), (0x0c, 0x00), (0x21, 0x54), (0x25, 0x82),
    (0x27, 0x31), (0x30, 0x08), (0x31, 0x32), (0x32, 0x32), (0x33, 0x35),
    (0x35, 0xff), (0x3a, 0x00), (0x37, 0x10), (0x38, 0x10), (0x39, 0x02),
    (0x42, 0x60), (0x4a, 0x80), (0x4b, 0x04), (0x4d, 0x81), (0x5d, 0x88),
    (0x50, 0x36), (0x51, 0x36), (0x52, 0x36), (0x53, 0x36), (0x63, 0x60),
    (0x64, 0x10), (0x65, 0x10), (0x68, 0x04), (0x69, 0x29), (0x70, 0x20),
    (0x71, 0x70), (0x72, 0x04), (0x73, 0x00), (0x70, 0x40), (0x71, 0x70),
    (0x72, 0x04), (0x73, 0x00), (0x70, 0x60), (0x71, 0x70), (0x72, 0x04),
    (0x73, 0x00), (0x70, 0x80), (0x71, 0x70), (0x72, 0x04), (0x73, 0x00),
    (0x70, 0xa0), (0x71, 0x70), (0x72, 0x04), (0x73, 0x00), (0x70, 0x1f),
    (0xa0, 0x44), (0xc0, 0x08), (0xc1, 0x10), (0xc2, 0x08), (0xc3, 0x10),
    (0xc4, 0x08), (0xc5, 0xf0), (0xc6, 0xf0), (0xc7, 0x0a), (0xc8, 0x1a),
    (0xc9, 0x80), (0xca, 0x23), (0xcb, 0x24), (0xce, 0x74), (0x90, 0x03),
    (0x76, 0x80), (0x77, 0x42), (0x78, 0x0a), (0x79, 0x80), (0xad, 0x40),
    (0xae, 0x07), (0x7f, 0xd4), (0x7c, 0x00), (0x80, 0xa8), (0x81, 0xda),
    (0x85, 0x08), (0x86, 0x00), (0x87, 0x02),
];

#[derive(Debug, Clone, Copy)]
pub struct Ds3000Config {
    pub i2c_addr: u8,
    /// Route the TS through a CI slot (slower, gapped clock)
    pub ci_mode: bool,
}

impl Default for Ds3000Config {
    fn default() -> Self {
        Ds3000Config {
            i2c_addr: DEMOD_INFO.i2c_addr,
            ci_mode: false,
        }
    }
}

#[derive(Debug)]
pub struct Ds3000 {
    config: Ds3000Config,
    system: Option<DeliverySystem>,
    prev_ucb_s2: u16,
}

impl Ds3000 {
    pub fn new(config: Ds3000Config) -> Ds3000 {
        Ds3000 {
            config,
            system: None,
            prev_ucb_s2: 0,
        }
    }

    fn write_reg(&self, bus: &I2cBus, reg: u8, val: u8) -> Result<()> {
        bus.write_reg(self.config.i2c_addr, reg, val)
    }

    fn read_reg(&self, bus: &I2cBus, reg: u8) -> Result<u8> {
        bus.read_reg(self.config.i2c_addr, reg)
    }

    fn set_symbol_rate(&self, bus: &I2cBus, symbol_rate: u32) -> Result<()> {
        let sr_ksps = symbol_rate / 1000;
        if sr_ksps == 0 {
            return Err(FrontendError::FrontendErr(format!(
                "invalid symbol rate {}",
                symbol_rate
            )));
        }

        // Timing loop bandwidth by symbol rate band: (0xc3, 0xc8, 0xc4, 0xc7)
        let regs = if sr_ksps <= 5000 {
            let mut value = 29777 / sr_ksps + 1;
            value += value % 2;
            [0x0d, value as u8, 0x10, 0x0e]
        } else if sr_ksps <= 10000 {
            let mut value = 92166 / sr_ksps + 1;
            value += value % 2;
            [0x07, value as u8, 0x09, 0x12]
        } else if sr_ksps <= 20000 {
            let value = 64516 / sr_ksps + 1;
            [value as u8, 0x0e, 0x07, 0x18]
        } else {
            let value = 129032 / sr_ksps + 1;
            [value as u8, 0x0a, 0x05, 0x24]
        };
        self.write_reg(bus, 0xc3, regs[0])?;
        self.write_reg(bus, 0xc8, regs[1])?;
        self.write_reg(bus, 0xc4, regs[2])?;
        self.write_reg(bus, 0xc7, regs[3])?;

        // Normalised to the sample rate, rounded
        let norm = ((sr_ksps as i64) << 16) + SAMPLE_RATE_KHZ / 2;
        let norm = (norm / SAMPLE_RATE_KHZ) as u16;
        self.write_reg(bus, 0x61, norm as u8)?;
        self.write_reg(bus, 0x62, (norm >> 8) as u8)
    }

    fn set_carrier_offset(&self, bus: &I2cBus, offset_khz: i32) -> Result<()> {
        let tmp = (2 * offset_khz as i64 * 65536 + SAMPLE_RATE_KHZ) / (2 * SAMPLE_RATE_KHZ);
        let tmp = if tmp < 0 { tmp + 65536 } else { tmp };
        let tmp = tmp as u16;
        self.write_reg(bus, 0x5f, (tmp >> 8) as u8)?;
        self.write_reg(bus, 0x5e, tmp as u8)
    }

    /// Re-enable the SEC output after a DiSEqC or burst transfer.
    fn finish_sec(&self, bus: &I2cBus) -> Result<()> {
        let data = self.read_reg(bus, 0xa2)? & !0xc0;
        self.write_reg(bus, 0xa2, data | 0x80)
    }

    /// Poll the SEC busy bit; on timeout abort the transfer and report.
    fn wait_sec_idle(&self, bus: &I2cBus, tries: usize, interval: Duration) -> Result<()> {
        for _ in 0..tries {
            if self.read_reg(bus, 0xa1)? & 0x40 == 0 {
                return self.finish_sec(bus);
            }
            thread::sleep(interval);
        }
        error!("ds3000: DiSEqC transfer did not complete");
        let data = self.read_reg(bus, 0xa1)?;
        self.write_reg(bus, 0xa1, (data & !0x80) | 0x40)?;
        self.finish_sec(bus)?;
        Err(HwStateError::Timeout("DiSEqC transfer").into())
    }

    fn enable_sec_pin(&self, bus: &I2cBus) -> Result<()> {
        let data = self.read_reg(bus, 0xa2)?;
        self.write_reg(bus, 0xa2, data & !0xc0)
    }
}

impl Demod for Ds3000 {
    fn get_info(&self) -> DemodInfo {
        DEMOD_INFO
    }

    fn init(&mut self, bus: &I2cBus) -> Result<()> {
        let chip_id = self.read_reg(bus, 0x00)?;
        if chip_id & 0xfe != CHIP_ID {
            return Err(HwStateError::BadChipId {
                expected: CHIP_ID,
                found: chip_id,
            }
            .into());
        }
        info!("Found M88DS3000, chip id {:#04x}", chip_id);
        self.write_reg(bus, 0x07, 0x80)?;
        self.write_reg(bus, 0x07, 0x00)?;
        bus.update_bits(self.config.i2c_addr, 0x08, 0x01, 0x01)?;
        thread::sleep(Duration::from_millis(1));
        self.system = None;
        Ok(())
    }

    fn sleep(&mut self, bus: &I2cBus) -> Result<()> {
        // Held in global reset until the next tune
        self.write_reg(bus, 0x07, 0x80)?;
        self.system = None;
        Ok(())
    }

    fn i2c_gate(&mut self, bus: &I2cBus, enable: bool) -> Result<()> {
        self.write_reg(bus, 0x03, if enable { 0x12 } else { 0x02 })
    }

    fn set_frontend(
        &mut self,
        bus: &I2cBus,
        tuner: &mut dyn Tuner,
        params: &TuneParams,
    ) -> Result<()> {
        if !params.system.is_satellite() {
            return Err(HwStateError::Unsupported(params.system).into());
        }
        gated(&mut *self, bus, |bus| tuner.set_params(bus, params))?;

        self.write_reg(bus, 0x07, 0x80)?;
        self.write_reg(bus, 0x07, 0x00)?;
        // uC reset, soft reset
        self.write_reg(bus, 0xb2, 0x01)?;
        self.write_reg(bus, 0x00, 0x01)?;

        if params.system == DeliverySystem::DvbS {
            bus.write_table(self.config.i2c_addr, &DVBS_INIT_TAB)?;
            let value = self.read_reg(bus, 0xfe)?;
            self.write_reg(bus, 0xfe, (value & 0xc0) | 0x1b)?;
        } else {
            bus.write_table(self.config.i2c_addr, &DVBS2_INIT_TAB)?;
            self.write_reg(bus, 0xfe, 0x54)?;
        }

        // 27 MHz clock out, AC coupling
        self.write_reg(bus, 0x29, 0x80)?;
        self.write_reg(bus, 0x25, 0x8a)?;

        self.set_symbol_rate(bus, params.symbol_rate)?;

        // co-channel interference cancellation and equaliser off
        self.write_reg(bus, 0x56, 0x00)?;
        self.write_reg(bus, 0x76, 0x00)?;

        if self.config.ci_mode {
            let ci = if params.system == DeliverySystem::DvbS { 0x80 } else { 0x01 };
            self.write_reg(bus, 0xfd, ci)?;
        }

        // offset must be in place before the soft reset is released
        let offset_khz = tuner.get_frequency() as i32 - params.frequency_khz as i32;
        debug!(
            "ds3000: {:?} {} kHz {} sps, carrier offset {} kHz",
            params.system, params.frequency_khz, params.symbol_rate, offset_khz
        );
        self.set_carrier_offset(bus, offset_khz)?;

        self.write_reg(bus, 0x00, 0x00)?;
        self.write_reg(bus, 0xb2, 0x00)?;
        self.system = Some(params.system);
        self.prev_ucb_s2 = 0;

        for _ in 0..LOCK_WAIT_TRIES {
            if self.read_status(bus)? == LockState::Locked {
                info!("ds3000: locked on {} kHz", params.frequency_khz);
                return Ok(());
            }
            thread::sleep(LOCK_WAIT_INTERVAL);
        }
        warn!("ds3000: no lock on {} kHz", params.frequency_khz);
        Ok(())
    }

    fn delivery_system(&self) -> Option<DeliverySystem> {
        self.system
    }

    fn read_status(&mut self, bus: &I2cBus) -> Result<LockState> {
        let locked = match active(self.system)? {
            DeliverySystem::DvbS => self.read_reg(bus, 0xd1)? & 0x07 == 0x07,
            _ => self.read_reg(bus, 0x0d)? & 0x8f == 0x8f,
        };
        Ok(if locked {
            LockState::Locked
        } else {
            LockState::NoSignal
        })
    }

    fn read_snr(&mut self, bus: &I2cBus) -> Result<f64> {
        match active(self.system)? {
            DeliverySystem::DvbS => {
                let n = (self.read_reg(bus, 0xff)? / 8) as usize;
                if n == 0 {
                    return Ok(0.0);
                }
                Ok(DVBS_SNR_TAB[n.min(20) - 1] as f64 / 2302.6)
            }
            _ => {
                let noise = (self.read_reg(bus, 0x8c)? & 0x3f) as u32
                    + ((self.read_reg(bus, 0x8d)? as u32) << 4);
                let tmp = self.read_reg(bus, 0x8e)? as u32;
                let signal = (tmp * tmp) >> 1;
                let (ratio, sign) = if signal > noise {
                    (signal.checked_div(noise).unwrap_or(80), 1.0)
                } else {
                    (noise.checked_div(signal).unwrap_or(80), -1.0)
                };
                let ratio = ratio.clamp(1, 80) as usize;
                Ok(sign * DVBS2_SNR_TAB[ratio - 1] as f64 / 1000.0)
            }
        }
    }

    fn read_ber(&mut self, bus: &I2cBus) -> Result<Option<u64>> {
        match active(self.system)? {
            DeliverySystem::DvbS => {
                // window length
                self.write_reg(bus, 0xf9, 0x04)?;
                let data = self.read_reg(bus, 0xf8)?;
                if data & 0x10 != 0 {
                    return Ok(None);
                }
                let errors = ((self.read_reg(bus, 0xf7)? as u64) << 8)
                    | self.read_reg(bus, 0xf6)? as u64;
                // restart needs two writes
                self.write_reg(bus, 0xf8, data | 0x10)?;
                self.write_reg(bus, 0xf8, data | 0x10)?;
                Ok(Some(errors))
            }
            _ => {
                let mut frames = [0u8; 3];
                bus.read(self.config.i2c_addr, 0xd5, &mut frames)?;
                let frames =
                    ((frames[2] as u32) << 16) | ((frames[1] as u32) << 8) | frames[0] as u32;
                if frames <= S2_MIN_LDPC_FRAMES {
                    return Ok(None);
                }
                let bad = ((self.read_reg(bus, 0xf8)? as u64) << 8)
                    | self.read_reg(bus, 0xf7)? as u64;
                bus.write_table(
                    self.config.i2c_addr,
                    &[(0xd1, 0x01), (0xf9, 0x01), (0xf9, 0x00), (0xd1, 0x00)],
                )?;
                Ok(Some(bad))
            }
        }
    }

    fn read_ucblocks(&mut self, bus: &I2cBus) -> Result<u64> {
        match active(self.system)? {
            DeliverySystem::DvbS => {
                let ucb = ((self.read_reg(bus, 0xf5)? as u64) << 8)
                    | self.read_reg(bus, 0xf4)? as u64;
                let data = self.read_reg(bus, 0xf8)?;
                self.write_reg(bus, 0xf8, data & !0x20)?;
                self.write_reg(bus, 0xf8, data | 0x20)?;
                Ok(ucb)
            }
            _ => {
                let ucb = ((self.read_reg(bus, 0xe2)? as u16) << 8)
                    | self.read_reg(bus, 0xe1)? as u16;
                let delta = if ucb > self.prev_ucb_s2 {
                    ucb - self.prev_ucb_s2
                } else {
                    self.prev_ucb_s2 - ucb
                };
                self.prev_ucb_s2 = ucb;
                Ok(delta as u64)
            }
        }
    }

    fn read_carrier_offset(&mut self, bus: &I2cBus) -> Result<i32> {
        active(self.system)?;
        let raw = ((self.read_reg(bus, 0x5f)? as u16) << 8) | self.read_reg(bus, 0x5e)? as u16;
        let offset_hz = raw as i16 as i64 * SAMPLE_RATE_KHZ * 1000 / 65536;
        Ok(offset_hz as i32)
    }

    fn set_voltage(&mut self, bus: &I2cBus, voltage: LnbVoltage) -> Result<()> {
        // bit 0 selects 13 V, bit 1 set means off
        let data = self.read_reg(bus, 0xa2)? | 0x03;
        let data = match voltage {
            LnbVoltage::V18 => data & !0x03,
            LnbVoltage::V13 => (data & !0x03) | 0x01,
            LnbVoltage::Off => data,
        };
        self.write_reg(bus, 0xa2, data)
    }

    fn set_tone(&mut self, bus: &I2cBus, tone: Tone) -> Result<()> {
        self.enable_sec_pin(bus)?;
        match tone {
            Tone::On => {
                let data = self.read_reg(bus, 0xa1)?;
                self.write_reg(bus, 0xa1, (data & !0x43) | 0x04)
            }
            Tone::Off => {
                let data = self.read_reg(bus, 0xa2)?;
                self.write_reg(bus, 0xa2, data | 0x80)
            }
        }
    }

    fn send_diseqc(&mut self, bus: &I2cBus, msg: &DiseqcMessage) -> Result<()> {
        debug!("ds3000: DiSEqC {:02x?}", msg.as_bytes());
        self.enable_sec_pin(bus)?;
        bus.write(self.config.i2c_addr, 0xa3, msg.as_bytes())?;
        let data = self.read_reg(bus, 0xa1)? & !0xf8;
        self.write_reg(bus, 0xa1, data | (((msg.len() - 1) as u8) << 3) | 0x07)?;
        self.wait_sec_idle(bus, DISEQC_POLL_TRIES, DISEQC_POLL_INTERVAL)
    }

    fn send_burst(&mut self, bus: &I2cBus, burst: ToneBurst) -> Result<()> {
        self.enable_sec_pin(bus)?;
        let cmd = match burst {
            ToneBurst::A => 0x02,
            ToneBurst::B => 0x01,
        };
        self.write_reg(bus, 0xa1, cmd)?;
        thread::sleep(BURST_SETTLE);
        self.wait_sec_idle(bus, BURST_POLL_TRIES, BURST_POLL_INTERVAL)
    }
}

#[cfg(test)]
#[path = "ds3000_test.rs"]
mod ds3000_test;
