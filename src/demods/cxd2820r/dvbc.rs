use super::{if_ctl_qam, Cxd2820r};
use crate::bus::I2cBus;
use crate::error::Result;
use crate::monitor::{sign_extend, LockState};
use log::debug;

const OFFSET_REG: u32 = 0x10015;

const SLEEP_TAB: [(u32, u8, u8); 5] = [
    (0x000ff, 0x1f, 0xff),
    (0x00085, 0x00, 0xff),
    (0x00088, 0x01, 0xff),
    (0x00081, 0x00, 0xff),
    (0x00080, 0x00, 0xff),
];

/// CNR = a/1000 · ln(b / u), coefficients by constellation family
const CNR_COEFF_ODD: (f64, f64) = (8750.0, 650.0);
const CNR_COEFF_EVEN: (f64, f64) = (9500.0, 760.0);

impl Cxd2820r {
    pub(super) fn set_frontend_c(&mut self, bus: &I2cBus, if_hz: u32, fresh: bool) -> Result<()> {
        if fresh {
            let tab = [
                (0x00080, 0x01, 0xff),
                (0x00081, 0x05, 0xff),
                (0x00085, 0x07, 0xff),
                (0x00088, 0x01, 0xff),
                (0x00082, 0x20, 0x60),
                (0x1016a, 0x48, 0xff),
                (0x100a5, 0x00, 0x01),
                (0x10020, 0x06, 0x07),
                (0x10059, 0x50, 0xff),
                (0x10087, 0x0c, 0x3c),
                (0x1008b, 0x07, 0xff),
                (0x1001f, (self.config.if_agc_polarity as u8) << 7, 0x80),
                (0x10070, self.config.ts_mode.value(), 0xff),
                (0x10071, (!self.config.ts_clk_inv as u8) << 4, 0x10),
            ];
            self.wr_table(bus, &tab)?;
        }

        let if_ctl = if_ctl_qam(if_hz);
        debug!("cxd2820r: DVB-C IF control {:#06x}", if_ctl);
        self.wr_regs(bus, 0x10042, &[((if_ctl >> 8) & 0x3f) as u8, if_ctl as u8])
    }

    pub(super) fn sleep_c(&mut self, bus: &I2cBus) -> Result<()> {
        self.wr_table(bus, &SLEEP_TAB)
    }

    pub(super) fn read_status_c(&mut self, bus: &I2cBus) -> Result<LockState> {
        let mut buf = [0u8; 2];
        self.rd_regs(bus, 0x10088, &mut buf)?;
        if buf[0] & 0x01 == 0 {
            return Ok(LockState::NoSignal);
        }
        if buf[1] & 0x08 != 0 {
            Ok(LockState::Locked)
        } else {
            Ok(LockState::Sync)
        }
    }

    /// 10-bit signed AGC level, inverted and scaled to 16 bits.
    pub(super) fn read_signal_strength_c(&mut self, bus: &I2cBus) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.rd_regs(bus, 0x10049, &mut buf)?;
        let raw = (buf[0] as u32 & 0x03) << 8 | buf[1] as u32;
        let level = (511 - sign_extend(raw, 10)) as u32;
        Ok((level << 6 | level >> 4) as u16)
    }

    pub(super) fn read_snr_c(&mut self, bus: &I2cBus) -> Result<f64> {
        let qam = self.rd_reg(bus, 0x10019)? & 0x03;
        let (a, b) = if qam % 2 == 1 {
            CNR_COEFF_ODD
        } else {
            CNR_COEFF_EVEN
        };
        let mut buf = [0u8; 2];
        self.rd_regs(bus, 0x1004d, &mut buf)?;
        let value = (buf[0] as u32 & 0x03) << 8 | buf[1] as u32;
        if value == 0 {
            return Ok(0.0);
        }
        Ok(a / 1000.0 * (b / value as f64).ln())
    }

    /// 14-bit signed offset in units of symbol_rate / 2^14.
    pub(super) fn read_carrier_offset_c(&mut self, bus: &I2cBus) -> Result<i32> {
        let symbol_rate = self.tuned()?.symbol_rate as i64;
        let mut buf = [0u8; 2];
        self.rd_regs_frozen(bus, OFFSET_REG, &mut buf)?;
        let raw = (buf[0] as u32 & 0x3f) << 8 | buf[1] as u32;
        let value = sign_extend(raw, 14) as i64;
        Ok((-(value * symbol_rate) >> 14) as i32)
    }
}
