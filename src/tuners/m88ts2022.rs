use std::thread;
use std::time::Duration;

use super::{Tuner, TunerInfo};
use crate::bus::I2cBus;
use crate::error::{FrontendError, HwStateError, Result};
use crate::monitor::scale_to_u16;
use crate::TuneParams;
use log::{debug, info, warn};

pub const TUNER_ID: &str = "m88ts2022";

pub const TUNER_INFO: TunerInfo = TunerInfo {
    id: TUNER_ID,
    name: "Montage M88TS2022",
    i2c_addr: 0x60,
    wake: &[(0x00, 0x01), (0x00, 0x03)],
    check_addr: 0x00,
    check_vals: &CHIP_IDS,
};

const CHIP_IDS: [u8; 2] = [0xc3, 0x83];

/// L-band input range in kHz.
const MIN_FREQ_KHZ: u32 = 950_000;
const MAX_FREQ_KHZ: u32 = 2_150_000;
/// Below this the VCO runs at twice the RF frequency.
const DIV_OUT_THRESHOLD_KHZ: u32 = 1_103_000;
/// Low symbol rates get tuned 3 MHz off and the filter widened to match.
const LOW_SYMBOL_RATE: u32 = 5_000_000;
const LOW_SYMBOL_RATE_OFFSET_KHZ: u32 = 3_000;
const LPF_COEFF: u64 = 3200;

const PLL_LOCK_REG: u8 = 0x15;
const PLL_LOCK_BIT: u8 = 0x40;

const INIT_TABLE: [(u8, u8); 11] = [
    (0x7d, 0x9d),
    (0x7c, 0x9a),
    (0x7a, 0x76),
    (0x3b, 0x01),
    (0x63, 0x88),
    (0x61, 0x85),
    (0x22, 0x30),
    (0x30, 0x40),
    (0x20, 0x23),
    (0x24, 0x02),
    (0x12, 0xa0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockOut {
    Disabled,
    Enabled,
    XtalOut,
}

#[derive(Debug, Clone, Copy)]
pub struct M88ts2022Config {
    pub i2c_addr: u8,
    /// Reference crystal in Hz
    pub clock: u32,
    pub clock_out: ClockOut,
    pub clock_out_div: u8,
    pub loop_through: bool,
}

impl Default for M88ts2022Config {
    fn default() -> Self {
        M88ts2022Config {
            i2c_addr: TUNER_INFO.i2c_addr,
            clock: 27_000_000,
            clock_out: ClockOut::Disabled,
            clock_out_div: 0,
            loop_through: false,
        }
    }
}

#[derive(Debug)]
pub struct M88ts2022 {
    config: M88ts2022Config,
    frequency_khz: u32,
}

impl M88ts2022 {
    pub fn new(config: M88ts2022Config) -> M88ts2022 {
        M88ts2022 {
            config,
            frequency_khz: 0,
        }
    }

    fn write_reg(&self, bus: &I2cBus, reg: u8, val: u8) -> Result<()> {
        bus.write_reg(self.config.i2c_addr, reg, val)
    }

    fn read_reg(&self, bus: &I2cBus, reg: u8) -> Result<u8> {
        bus.read_reg(self.config.i2c_addr, reg)
    }

    fn update_bits(&self, bus: &I2cBus, reg: u8, mask: u8, val: u8) -> Result<()> {
        bus.update_bits(self.config.i2c_addr, reg, mask, val)
    }

    /// Kick one of the on-chip calibration state machines (`op`) and wait
    /// for `reg & mask` to move away from `val`. Retried once.
    fn cmd(&self, bus: &I2cBus, op: u8, sleep_ms: u64, reg: u8, mask: u8, val: u8) -> Result<u8> {
        let table = [(0x51, 0x1f - op), (0x51, 0x1f), (0x50, op), (0x50, 0x00)];
        let mut status = 0;
        for _ in 0..2 {
            bus.write_table(self.config.i2c_addr, &table)?;
            thread::sleep(Duration::from_millis(sleep_ms));
            status = self.read_reg(bus, reg)?;
            if status & mask != val {
                break;
            }
        }
        Ok(status)
    }

    /// Run the filter capacitor calibration twice and average it.
    fn calibrate_cap(&self, bus: &I2cBus, second_mode: u8) -> Result<u8> {
        let first = self.cmd(bus, 0x04, 2, 0x26, 0xff, 0x00)? & 0x3f;
        self.write_reg(bus, 0x41, second_mode)?;
        let second = self.cmd(bus, 0x04, 2, 0x26, 0xff, 0x00)? & 0x3f;
        Ok((first + second) / 2)
    }
}

/// Round-to-nearest integer division.
fn div_round_closest(n: u64, d: u64) -> u64 {
    (n + d / 2) / d
}

/// The N divider register skips two 1024-wide gaps of the prescaler.
fn encode_pll_n(pll_n: u32) -> u16 {
    let encoded = if pll_n < 4095 {
        pll_n - 1024
    } else if pll_n < 6143 {
        pll_n + 1024
    } else {
        pll_n + 3072
    };
    encoded as u16
}

impl Tuner for M88ts2022 {
    fn get_info(&self) -> TunerInfo {
        TUNER_INFO
    }

    fn init(&mut self, bus: &I2cBus) -> Result<()> {
        // Wake the chip before reading the ID
        self.write_reg(bus, 0x00, 0x01)?;
        self.write_reg(bus, 0x00, 0x03)?;
        let chip_id = self.read_reg(bus, 0x00)?;
        if !CHIP_IDS.contains(&chip_id) {
            return Err(HwStateError::BadChipId {
                expected: CHIP_IDS[0],
                found: chip_id,
            }
            .into());
        }
        info!("Found M88TS2022, chip id {:#04x}", chip_id);

        let clock_out = match self.config.clock_out {
            ClockOut::Disabled => 0x60,
            ClockOut::Enabled => {
                self.write_reg(bus, 0x05, self.config.clock_out_div)?;
                0x70
            }
            ClockOut::XtalOut => 0x6c,
        };
        self.write_reg(bus, 0x42, clock_out)?;

        let loop_through = if self.config.loop_through { 0xec } else { 0x6c };
        self.write_reg(bus, 0x62, loop_through)?;

        bus.write_table(self.config.i2c_addr, &INIT_TABLE)
    }

    fn sleep(&mut self, bus: &I2cBus) -> Result<()> {
        self.write_reg(bus, 0x00, 0x00)
    }

    fn set_params(&mut self, bus: &I2cBus, params: &TuneParams) -> Result<()> {
        if !(MIN_FREQ_KHZ..=MAX_FREQ_KHZ).contains(&params.frequency_khz) {
            return Err(FrontendError::FrontendErr(format!(
                "{} kHz outside {}..{} kHz",
                params.frequency_khz, MIN_FREQ_KHZ, MAX_FREQ_KHZ
            )));
        }
        // Integer-N synthesiser, everything in kHz
        let f_ref_khz = div_round_closest(self.config.clock as u64, 1000) as u32;
        let div_ref = div_round_closest(f_ref_khz as u64, 500) as u32;

        let offset_khz = if params.symbol_rate < LOW_SYMBOL_RATE {
            LOW_SYMBOL_RATE_OFFSET_KHZ
        } else {
            0
        };
        let frequency_khz = params.frequency_khz + offset_khz;

        let (div_out, band) = if frequency_khz < DIV_OUT_THRESHOLD_KHZ {
            (2, 0x1b)
        } else {
            (1, 0x0b)
        };
        bus.write(self.config.i2c_addr, 0x10, &[band, 0x40])?;

        let f_vco_khz = frequency_khz * div_out;
        let mut pll_n = (f_vco_khz as u64 * div_ref as u64 / f_ref_khz as u64) as u32;
        pll_n += pll_n % 2;
        self.frequency_khz = (pll_n as u64 * f_ref_khz as u64 / div_ref as u64 / div_out as u64) as u32;
        debug!(
            "m88ts2022: f_vco {} kHz div_ref {} pll_n {} actual {} kHz",
            f_vco_khz, div_ref, pll_n, self.frequency_khz
        );

        let n = encode_pll_n(pll_n);
        bus.write(
            self.config.i2c_addr,
            0x01,
            &[((n >> 8) & 0x3f) as u8, n as u8, (div_ref - 8) as u8],
        )?;

        self.write_reg(bus, 0x51, 0x80)?;
        self.write_reg(bus, 0x51, 0x00)?;
        self.write_reg(bus, 0x50, 0x00)?;

        // VCO calibration, retried with more current on a weak VCO
        self.cmd(bus, 0x10, 5, PLL_LOCK_REG, PLL_LOCK_BIT, 0x00)?;
        if self.read_reg(bus, 0x14)? & 0x7f < 64 {
            self.update_bits(bus, 0x10, 0x80, 0x80)?;
            self.write_reg(bus, 0x11, 0x6f)?;
            self.cmd(bus, 0x10, 5, PLL_LOCK_REG, PLL_LOCK_BIT, 0x00)?;
        }
        if self.read_reg(bus, 0x14)? & 0x1f > 19 {
            self.update_bits(bus, 0x10, 0x02, 0x00)?;
        }

        self.cmd(bus, 0x08, 5, 0x3c, 0xff, 0x00)?;
        self.write_reg(bus, 0x25, 0x00)?;
        self.write_reg(bus, 0x27, 0x70)?;
        self.write_reg(bus, 0x41, 0x09)?;
        self.write_reg(bus, 0x08, 0x0b)?;

        // Baseband low-pass filter
        let f_ref = f_ref_khz as u64;
        let mut gdiv28 = div_round_closest(f_ref * 1694, 1_000_000);
        self.write_reg(bus, 0x04, gdiv28 as u8)?;
        let cap_code = self.calibrate_cap(bus, 0x0d)? as u64;
        gdiv28 = gdiv28 * 207 / (cap_code * 2 + 151);
        let div_max = (gdiv28 * 135 / 100).min(63);
        let div_min = gdiv28 * 78 / 100;

        let f_3db_hz = (params.symbol_rate as u64 * 135 / 200 + 2_000_000 + offset_khz as u64 * 1000)
            .clamp(7_000_000, 40_000_000);

        let mut lpf_gm = div_round_closest(f_3db_hz * gdiv28, LPF_COEFF * f_ref).clamp(1, 23);
        let mut lpf_mxdiv = div_round_closest(lpf_gm * LPF_COEFF * f_ref, f_3db_hz);
        if lpf_mxdiv < div_min {
            lpf_gm += 1;
            lpf_mxdiv = div_round_closest(lpf_gm * LPF_COEFF * f_ref, f_3db_hz);
        }
        let lpf_mxdiv = lpf_mxdiv.min(div_max);
        debug!(
            "m88ts2022: f_3db {} Hz gdiv28 {} lpf_gm {} lpf_mxdiv {}",
            f_3db_hz, gdiv28, lpf_gm, lpf_mxdiv
        );

        self.write_reg(bus, 0x04, lpf_mxdiv as u8)?;
        self.write_reg(bus, 0x06, lpf_gm as u8)?;
        let cap_code = self.calibrate_cap(bus, 0x09)?;
        self.write_reg(bus, 0x25, cap_code | 0x80)?;
        self.write_reg(bus, 0x27, 0x30)?;
        self.write_reg(bus, 0x08, 0x09)?;
        self.cmd(bus, 0x01, 20, 0x21, 0xff, 0x00)?;

        if !self.is_locked(bus)? {
            warn!("m88ts2022: PLL not locked at {} kHz", self.frequency_khz);
        }
        Ok(())
    }

    fn get_frequency(&self) -> u32 {
        self.frequency_khz
    }

    fn get_if_freq(&self) -> u32 {
        0
    }

    fn is_locked(&self, bus: &I2cBus) -> Result<bool> {
        Ok(self.read_reg(bus, PLL_LOCK_REG)? & PLL_LOCK_BIT != 0)
    }

    fn get_rf_strength(&self, bus: &I2cBus) -> Result<Option<u16>> {
        let gain1 = (self.read_reg(bus, 0x3d)? & 0x1f).clamp(0, 15) as u32;
        let gain2 = (self.read_reg(bus, 0x21)? & 0x1f).clamp(2, 16) as u32;
        let gain3 = ((self.read_reg(bus, 0x66)? >> 3) & 0x07).clamp(0, 6) as u32;
        let gain = gain1 * 265 + gain2 * 338 + gain3 * 285;
        Ok(Some(scale_to_u16(0xffff - gain, 59_000, 61_500)))
    }
}
