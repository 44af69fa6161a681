use super::{bad_bandwidth, if_ctl_ofdm, Cxd2820r};
use crate::bus::I2cBus;
use crate::error::Result;
use crate::monitor::{db10, sign_extend, LockState};
use crate::{DeliverySystem, TuneParams};
use log::debug;

const OFFSET_REG: u32 = 0x0204c;

const SLEEP_TAB: [(u32, u8, u8); 6] = [
    (0x000ff, 0x1f, 0xff),
    (0x00085, 0x00, 0xff),
    (0x00088, 0x01, 0xff),
    (0x02069, 0x00, 0xff),
    (0x00081, 0x00, 0xff),
    (0x00080, 0x00, 0xff),
];

/// Filter coefficients at 0x209f and the selector for 0x20d7 bits 7..6.
pub(super) struct BwParams {
    coeff: [u8; 5],
    select: u8,
}

const BW_1_7MHZ: BwParams = BwParams {
    coeff: [0x58, 0xe2, 0xaf, 0xe0, 0xbc],
    select: 3,
};
const BW_5MHZ: BwParams = BwParams {
    coeff: [0x1c, 0xb3, 0x33, 0x33, 0x33],
    select: 3,
};
const BW_6MHZ: BwParams = BwParams {
    coeff: [0x17, 0xea, 0xaa, 0xaa, 0xaa],
    select: 2,
};
const BW_7MHZ: BwParams = BwParams {
    coeff: [0x14, 0x80, 0x00, 0x00, 0x00],
    select: 1,
};
const BW_8MHZ: BwParams = BwParams {
    coeff: [0x11, 0xf0, 0x00, 0x00, 0x00],
    select: 0,
};

pub(super) fn bw_params(bandwidth_hz: u32) -> Result<&'static BwParams> {
    match bandwidth_hz {
        1_700_000 => Ok(&BW_1_7MHZ),
        5_000_000 => Ok(&BW_5MHZ),
        6_000_000 => Ok(&BW_6MHZ),
        7_000_000 => Ok(&BW_7MHZ),
        8_000_000 => Ok(&BW_8MHZ),
        bw => Err(bad_bandwidth(DeliverySystem::DvbT2, bw)),
    }
}

impl Cxd2820r {
    pub(super) fn set_frontend_t2(
        &mut self,
        bus: &I2cBus,
        params: &TuneParams,
        if_hz: u32,
        fresh: bool,
    ) -> Result<()> {
        let bw = bw_params(params.bandwidth_hz)?;
        if fresh {
            let tab = [
                (0x00080, 0x02, 0xff),
                (0x00081, 0x20, 0xff),
                (0x00085, 0x07, 0xff),
                (0x00088, 0x01, 0xff),
                (0x02069, 0x01, 0xff),
                (0x0207f, 0x2a, 0xff),
                (0x02082, 0x0a, 0xff),
                (0x02083, 0x0a, 0xff),
                (0x020cb, (self.config.if_agc_polarity as u8) << 6, 0x40),
                (0x02070, self.config.ts_mode.value(), 0xff),
                (0x02071, (!self.config.ts_clk_inv as u8) << 6, 0x40),
                (0x020b5, (self.config.spec_inv as u8) << 4, 0x10),
                (0x02567, 0x07, 0x0f),
                (0x02569, 0x03, 0x03),
                (0x02595, 0x1a, 0xff),
                (0x02596, 0x50, 0xff),
                (0x02a8c, 0x00, 0xff),
                (0x02a8d, 0x34, 0xff),
                (0x02a45, 0x06, 0x07),
                (0x03f10, 0x0d, 0xff),
                (0x03f11, 0x02, 0xff),
                (0x03f12, 0x01, 0xff),
                (0x03f23, 0x2c, 0xff),
                (0x03f51, 0x13, 0xff),
                (0x03f52, 0x01, 0xff),
                (0x03f53, 0x00, 0xff),
                (0x027e6, 0x14, 0xff),
                (0x02786, 0x02, 0x07),
                (0x02787, 0x40, 0xe0),
                (0x027ef, 0x10, 0x18),
            ];
            self.wr_table(bus, &tab)?;
        }

        let if_ctl = if_ctl_ofdm(if_hz);
        debug!("cxd2820r: DVB-T2 IF control {:#08x}", if_ctl);
        self.wr_regs(
            bus,
            0x020b6,
            &[(if_ctl >> 16) as u8, (if_ctl >> 8) as u8, if_ctl as u8],
        )?;
        self.wr_regs(bus, 0x0209f, &bw.coeff)?;
        self.wr_reg_mask(bus, 0x020d7, bw.select << 6, 0xc0)
    }

    pub(super) fn sleep_t2(&mut self, bus: &I2cBus) -> Result<()> {
        self.wr_table(bus, &SLEEP_TAB)
    }

    pub(super) fn read_status_t2(&mut self, bus: &I2cBus) -> Result<LockState> {
        let status = self.rd_reg(bus, 0x02010)?;
        if status & 0x07 != 6 {
            return Ok(LockState::NoSignal);
        }
        if status & 0x20 != 0 {
            Ok(LockState::Locked)
        } else {
            Ok(LockState::Sync)
        }
    }

    pub(super) fn read_snr_t2(&mut self, bus: &I2cBus) -> Result<f64> {
        let mut buf = [0u8; 2];
        self.rd_regs(bus, 0x02028, &mut buf)?;
        let value = (buf[0] as u32 & 0x0f) << 8 | buf[1] as u32;
        if value == 0 {
            return Ok(0.0);
        }
        Ok(db10(value as f64 / 8.0))
    }

    /// 28-bit error count, valid flag in bit 4 of the first byte.
    pub(super) fn read_ber_t2(&mut self, bus: &I2cBus) -> Result<()> {
        let mut buf = [0u8; 4];
        self.rd_regs(bus, 0x02039, &mut buf)?;
        if buf[0] & 0x10 != 0 {
            let errors = ((buf[0] as u32) << 24
                | (buf[1] as u32) << 16
                | (buf[2] as u32) << 8
                | buf[3] as u32)
                & 0x0fff_ffff;
            self.ber.add(errors as u64);
        }
        Ok(())
    }

    pub(super) fn read_carrier_offset_t2(&mut self, bus: &I2cBus) -> Result<i32> {
        let bandwidth_hz = self.tuned()?.bandwidth_hz as i64;
        let mut buf = [0u8; 4];
        self.rd_regs_frozen(bus, OFFSET_REG, &mut buf)?;
        let raw = (buf[0] as u32 & 0x1f) << 24
            | (buf[1] as u32) << 16
            | (buf[2] as u32) << 8
            | buf[3] as u32;
        let value = sign_extend(raw, 29) as i64;
        Ok((-(value * bandwidth_hz) / 940_000_000) as i32)
    }
}
