use super::{bad_bandwidth, if_ctl_ofdm, Cxd2820r};
use crate::bus::I2cBus;
use crate::error::{FrontendError, HwStateError, Result};
use crate::monitor::{db10, sign_extend, LockState};
use crate::{DeliverySystem, TuneParams};
use log::debug;

/// MER correction per FFT size, dB
const MER_OFFSET_2K: f64 = 11.953;
const MER_OFFSET_4K: f64 = 14.963;
const MER_OFFSET_8K: f64 = 17.973;

const MERDT_REG: u32 = 0x00069;
const OFFSET_REG: u32 = 0x0004c;
const TPS_REG: u32 = 0x0002f;

const SLEEP_TAB: [(u32, u8, u8); 5] = [
    (0x000ff, 0x1f, 0xff),
    (0x00085, 0x00, 0xff),
    (0x00088, 0x01, 0xff),
    (0x00081, 0x00, 0xff),
    (0x00080, 0x00, 0xff),
];

/// Filter coefficients per channel bandwidth: 5 bytes at 0x009f,
/// selector for 0x00d7 bits 7..6, 2 bytes at 0x00d9.
pub(super) struct BwParams {
    coeff: [u8; 5],
    select: u8,
    extra: [u8; 2],
}

const BW_6MHZ: BwParams = BwParams {
    coeff: [0x17, 0xea, 0xaa, 0xaa, 0xaa],
    select: 2,
    extra: [0x1f, 0xdc],
};
const BW_7MHZ: BwParams = BwParams {
    coeff: [0x14, 0x80, 0x00, 0x00, 0x00],
    select: 1,
    extra: [0x12, 0xf8],
};
const BW_8MHZ: BwParams = BwParams {
    coeff: [0x11, 0xf0, 0x00, 0x00, 0x00],
    select: 0,
    extra: [0x01, 0xe0],
};

pub(super) fn bw_params(bandwidth_hz: u32) -> Result<&'static BwParams> {
    match bandwidth_hz {
        6_000_000 => Ok(&BW_6MHZ),
        7_000_000 => Ok(&BW_7MHZ),
        8_000_000 => Ok(&BW_8MHZ),
        bw => Err(bad_bandwidth(DeliverySystem::DvbT, bw)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FftMode {
    Fft2k,
    Fft4k,
    Fft8k,
}

impl FftMode {
    fn mer_offset(&self) -> f64 {
        match self {
            FftMode::Fft2k => MER_OFFSET_2K,
            FftMode::Fft4k => MER_OFFSET_4K,
            FftMode::Fft8k => MER_OFFSET_8K,
        }
    }
}

impl Cxd2820r {
    pub(super) fn set_frontend_t(
        &mut self,
        bus: &I2cBus,
        params: &TuneParams,
        if_hz: u32,
        fresh: bool,
    ) -> Result<()> {
        let bw = bw_params(params.bandwidth_hz)?;
        if fresh {
            let tab = [
                (0x00080, 0x00, 0xff),
                (0x00081, 0x03, 0xff),
                (0x00085, 0x07, 0xff),
                (0x00088, 0x01, 0xff),
                (0x00070, self.config.ts_mode.value(), 0xff),
                (0x00071, (!self.config.ts_clk_inv as u8) << 4, 0x10),
                (0x000cb, (self.config.if_agc_polarity as u8) << 6, 0x40),
                (0x000a5, 0x00, 0x01),
                (0x00082, 0x20, 0x60),
                (0x000c2, 0xc3, 0xff),
                (0x0016a, 0x50, 0xff),
                (0x00427, 0x41, 0xff),
            ];
            self.wr_table(bus, &tab)?;
        }

        let if_ctl = if_ctl_ofdm(if_hz);
        debug!("cxd2820r: DVB-T IF control {:#08x}", if_ctl);
        self.wr_regs(
            bus,
            0x000b6,
            &[(if_ctl >> 16) as u8, (if_ctl >> 8) as u8, if_ctl as u8],
        )?;
        self.wr_regs(bus, 0x0009f, &bw.coeff)?;
        self.wr_reg_mask(bus, 0x000d7, bw.select << 6, 0xc0)?;
        self.wr_regs(bus, 0x000d9, &bw.extra)
    }

    pub(super) fn sleep_t(&mut self, bus: &I2cBus) -> Result<()> {
        self.wr_table(bus, &SLEEP_TAB)
    }

    pub(super) fn read_status_t(&mut self, bus: &I2cBus) -> Result<LockState> {
        let sync = self.rd_reg(bus, 0x00010)? & 0x07;
        let ts = self.rd_reg(bus, 0x00073)?;
        if sync == 6 {
            if ts & 0x08 != 0 {
                return Ok(LockState::Locked);
            }
            return Ok(LockState::Sync);
        }
        let agc = self.rd_reg(bus, 0x00014)?;
        if agc & 0x0f >= 4 && self.rd_reg(bus, 0x00a14)? & 0x10 != 0 {
            return Ok(LockState::Signal);
        }
        Ok(LockState::NoSignal)
    }

    pub(super) fn read_snr_t(&mut self, bus: &I2cBus) -> Result<f64> {
        let mut buf = [0u8; 2];
        self.rd_regs(bus, 0x0002c, &mut buf)?;
        let value = ((buf[0] as u32) << 8 | buf[1] as u32).min(31_999);
        if value == 0 {
            return Ok(0.0);
        }
        Ok(db10(value as f64 / (32_000 - value) as f64) + 33.1)
    }

    fn fft_mode(&mut self, bus: &I2cBus) -> Result<FftMode> {
        let mut tps = [0u8; 2];
        self.rd_regs(bus, TPS_REG, &mut tps)?;
        match (tps[1] >> 1) & 0x03 {
            0 => Ok(FftMode::Fft2k),
            1 => Ok(FftMode::Fft8k),
            2 => Ok(FftMode::Fft4k),
            mode => Err(FrontendError::FrontendErr(format!(
                "invalid FFT mode {} in TPS",
                mode
            ))),
        }
    }

    pub(super) fn read_mer_t(&mut self, bus: &I2cBus) -> Result<f64> {
        let mode = self.fft_mode(bus)?;
        let mut buf = [0u8; 3];
        self.rd_regs_frozen(bus, MERDT_REG, &mut buf)?;
        let merdt = (buf[0] as u32 & 0x0f) << 16 | (buf[1] as u32) << 8 | buf[2] as u32;
        if merdt == 0 {
            return Err(HwStateError::NotLocked.into());
        }
        Ok(db10(merdt as f64) - mode.mer_offset())
    }

    pub(super) fn read_carrier_offset_t(&mut self, bus: &I2cBus) -> Result<i32> {
        let bandwidth_hz = self.tuned()?.bandwidth_hz as i64;
        let mut buf = [0u8; 4];
        self.rd_regs_frozen(bus, OFFSET_REG, &mut buf)?;
        let raw = (buf[0] as u32 & 0x1f) << 24
            | (buf[1] as u32) << 16
            | (buf[2] as u32) << 8
            | buf[3] as u32;
        let value = sign_extend(raw, 29) as i64;
        Ok((-(value * bandwidth_hz) / 235_000_000) as i32)
    }
}
