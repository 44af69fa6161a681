//! Sony CXD2820R DVB-T/T2/C demodulator.
//!
//! Registers are addressed with a 24-bit key: bit 16 selects the second
//! I2C address (DVB-C core), bits 15..8 the bank and bits 7..0 the
//! register. Register 0x00 of each address is the bank select.
mod dvbc;
mod dvbt;
mod dvbt2;

use super::{active, gated, Demod, DemodInfo};
use crate::bus::I2cBus;
use crate::error::{FrontendError, HwStateError, Result};
use crate::monitor::{self, LockState};
use crate::tuners::Tuner;
use crate::{DeliverySystem, TuneParams};
use log::{debug, info};

pub const DEMOD_ID: &str = "cxd2820r";

pub const DEMOD_INFO: DemodInfo = DemodInfo {
    id: DEMOD_ID,
    name: "Sony CXD2820R",
    i2c_addr: 0x6c,
    systems: &[DeliverySystem::DvbT, DeliverySystem::DvbT2, DeliverySystem::DvbC],
};

const CHIP_ID: u8 = 0xe1;
const CHIP_ID_REG: u32 = 0x000fd;
const GATE_REG: u32 = 0x000db;
const FREEZE_REG: u8 = 0x01;
/// Reference for the IF control words, in kHz
const IF_REF_KHZ: u64 = 41_000;

/// Transport stream output format, written as-is to the TS mode register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsMode {
    Serial,
    SerialMsb,
    Parallel,
    ParallelMsb,
}

impl TsMode {
    fn value(&self) -> u8 {
        match self {
            TsMode::Serial => 0x08,
            TsMode::SerialMsb => 0x28,
            TsMode::Parallel => 0x30,
            TsMode::ParallelMsb => 0x70,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Cxd2820rConfig {
    /// Primary address; the DVB-C core answers on the next one
    pub i2c_addr: u8,
    pub ts_mode: TsMode,
    pub ts_clk_inv: bool,
    pub if_agc_polarity: bool,
    pub spec_inv: bool,
}

impl Default for Cxd2820rConfig {
    fn default() -> Self {
        Cxd2820rConfig {
            i2c_addr: DEMOD_INFO.i2c_addr,
            ts_mode: TsMode::Parallel,
            ts_clk_inv: false,
            if_agc_polarity: false,
            spec_inv: false,
        }
    }
}

/// Windowed post-FEC bit error counter, summed since the last tune.
#[derive(Debug, Default, Clone, Copy)]
struct BerCounter {
    running: bool,
    total: Option<u64>,
}

impl BerCounter {
    fn add(&mut self, errors: u64) {
        self.total = Some(self.total.unwrap_or(0) + errors);
    }
}

#[derive(Debug)]
pub struct Cxd2820r {
    config: Cxd2820rConfig,
    bank: [Option<u8>; 2],
    system: Option<DeliverySystem>,
    tuned: Option<TuneParams>,
    ber: BerCounter,
}

impl Cxd2820r {
    pub fn new(config: Cxd2820rConfig) -> Cxd2820r {
        Cxd2820r {
            config,
            bank: [None; 2],
            system: None,
            tuned: None,
            ber: BerCounter::default(),
        }
    }

    /// Resolve a register key to (slave, register), switching bank first
    /// if the cached bank differs.
    fn select(&mut self, bus: &I2cBus, key: u32) -> Result<(u8, u8)> {
        let index = ((key >> 16) & 0x01) as usize;
        let slave = self.config.i2c_addr + index as u8;
        let bank = (key >> 8) as u8;
        if self.bank[index] != Some(bank) {
            if let Err(e) = bus.write_reg(slave, 0x00, bank) {
                self.bank[index] = None;
                return Err(e);
            }
            self.bank[index] = Some(bank);
        }
        Ok((slave, key as u8))
    }

    fn wr_regs(&mut self, bus: &I2cBus, key: u32, data: &[u8]) -> Result<()> {
        let (slave, reg) = self.select(bus, key)?;
        bus.write(slave, reg, data)?;
        Ok(())
    }

    fn rd_regs(&mut self, bus: &I2cBus, key: u32, buf: &mut [u8]) -> Result<()> {
        let (slave, reg) = self.select(bus, key)?;
        bus.read(slave, reg, buf)?;
        Ok(())
    }

    fn wr_reg(&mut self, bus: &I2cBus, key: u32, val: u8) -> Result<()> {
        self.wr_regs(bus, key, &[val])
    }

    fn rd_reg(&mut self, bus: &I2cBus, key: u32) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.rd_regs(bus, key, &mut buf)?;
        Ok(buf[0])
    }

    fn wr_reg_mask(&mut self, bus: &I2cBus, key: u32, val: u8, mask: u8) -> Result<()> {
        let val = if mask != 0xff {
            let old = self.rd_reg(bus, key)?;
            (val & mask) | (old & !mask)
        } else {
            val
        };
        self.wr_reg(bus, key, val)
    }

    /// (key, value, mask) triples
    fn wr_table(&mut self, bus: &I2cBus, table: &[(u32, u8, u8)]) -> Result<()> {
        for &(key, val, mask) in table {
            self.wr_reg_mask(bus, key, val, mask)?;
        }
        Ok(())
    }

    /// Read `buf.len()` bytes at `key` from one frozen snapshot.
    fn rd_regs_frozen(&mut self, bus: &I2cBus, key: u32, buf: &mut [u8]) -> Result<()> {
        let (slave, reg) = self.select(bus, key)?;
        monitor::with_frozen(bus, slave, FREEZE_REG, |bus| {
            bus.read(slave, reg, buf)?;
            Ok(())
        })
    }

    fn require_lock(&mut self, bus: &I2cBus) -> Result<()> {
        if self.read_status(bus)? < LockState::Locked {
            return Err(HwStateError::NotLocked.into());
        }
        Ok(())
    }

    fn tuned(&self) -> Result<TuneParams> {
        self.tuned.ok_or_else(|| HwStateError::NotActive.into())
    }

    fn start(&mut self, bus: &I2cBus) -> Result<()> {
        self.wr_reg(bus, 0x000ff, 0x08)?;
        self.wr_reg(bus, 0x000fe, 0x01)
    }

    /// T and C share the 20-bit windowed counter layout: 3 bytes little
    /// endian at `key`, valid flag in bit 7 of the last byte, window
    /// restarted by writing 1 to `restart_key`.
    fn read_ber_windowed(&mut self, bus: &I2cBus, key: u32, restart_key: u32) -> Result<()> {
        let restart = if self.ber.running {
            let mut buf = [0u8; 3];
            self.rd_regs(bus, key, &mut buf)?;
            if buf[2] & 0x80 != 0 {
                let errors =
                    ((buf[2] as u32) << 16 | (buf[1] as u32) << 8 | buf[0] as u32) & 0x0f_ffff;
                self.ber.add(errors as u64);
                true
            } else {
                false
            }
        } else {
            true
        };
        if restart {
            self.wr_reg(bus, restart_key, 0x01)?;
            self.ber.running = true;
        }
        Ok(())
    }

    fn sleep_system(&mut self, bus: &I2cBus, system: DeliverySystem) -> Result<()> {
        debug!("cxd2820r: {:?} to sleep", system);
        match system {
            DeliverySystem::DvbT2 => self.sleep_t2(bus)?,
            DeliverySystem::DvbC => self.sleep_c(bus)?,
            _ => self.sleep_t(bus)?,
        }
        if self.system == Some(system) {
            self.system = None;
            self.tuned = None;
        }
        Ok(())
    }
}

fn check_bandwidth(params: &TuneParams) -> Result<()> {
    match params.system {
        DeliverySystem::DvbT => dvbt::bw_params(params.bandwidth_hz).map(|_| ()),
        DeliverySystem::DvbT2 => dvbt2::bw_params(params.bandwidth_hz).map(|_| ()),
        _ => Ok(()),
    }
}

fn bad_bandwidth(system: DeliverySystem, bandwidth_hz: u32) -> FrontendError {
    FrontendError::FrontendErr(format!(
        "{:?} bandwidth {} Hz not supported",
        system, bandwidth_hz
    ))
}

/// IF control word for the OFDM cores: IF·2^24 / 41 MHz, rounded.
fn if_ctl_ofdm(if_hz: u32) -> u32 {
    let num = (if_hz / 1000) as u64 * 0x100_0000;
    ((num + IF_REF_KHZ / 2) / IF_REF_KHZ) as u32
}

/// IF control word for the QAM core: 0x4000 − IF·2^14 / 41 MHz.
fn if_ctl_qam(if_hz: u32) -> u16 {
    let num = (if_hz / 1000) as u64 * 0x4000;
    (0x4000 - (num + IF_REF_KHZ / 2) / IF_REF_KHZ) as u16
}

/// Inverted 12-bit AGC reading scaled to 16 bits.
fn ofdm_strength(buf: [u8; 2]) -> u16 {
    let agc = ((buf[0] as u16 & 0x0f) << 8) | buf[1] as u16;
    let level = !agc & 0x0fff;
    level << 4 | level >> 8
}

impl Demod for Cxd2820r {
    fn get_info(&self) -> DemodInfo {
        DEMOD_INFO
    }

    fn init(&mut self, bus: &I2cBus) -> Result<()> {
        self.bank = [None; 2];
        let chip_id = self.rd_reg(bus, CHIP_ID_REG)?;
        if chip_id != CHIP_ID {
            return Err(HwStateError::BadChipId {
                expected: CHIP_ID,
                found: chip_id,
            }
            .into());
        }
        info!("Found CXD2820R at {:#04x}", self.config.i2c_addr);
        self.wr_reg(bus, 0x00085, 0x07)?;
        self.system = None;
        self.tuned = None;
        Ok(())
    }

    fn sleep(&mut self, bus: &I2cBus) -> Result<()> {
        match self.system {
            Some(system) => self.sleep_system(bus, system),
            None => self.sleep_t(bus),
        }
    }

    fn i2c_gate(&mut self, bus: &I2cBus, enable: bool) -> Result<()> {
        self.wr_reg_mask(bus, GATE_REG, enable as u8, 0x01)
    }

    fn set_frontend(
        &mut self,
        bus: &I2cBus,
        tuner: &mut dyn Tuner,
        params: &TuneParams,
    ) -> Result<()> {
        if !DEMOD_INFO.systems.contains(&params.system) {
            return Err(HwStateError::Unsupported(params.system).into());
        }
        check_bandwidth(params)?;

        gated(&mut *self, bus, |bus| tuner.set_params(bus, params))?;
        let if_hz = tuner.get_if_freq();

        let previous = self.system;
        if let Some(prev) = previous {
            if prev != params.system {
                self.sleep_system(bus, prev)?;
            }
        }
        let fresh = previous != Some(params.system);

        match params.system {
            DeliverySystem::DvbT => self.set_frontend_t(bus, params, if_hz, fresh)?,
            DeliverySystem::DvbT2 => self.set_frontend_t2(bus, params, if_hz, fresh)?,
            _ => self.set_frontend_c(bus, if_hz, fresh)?,
        }
        self.start(bus)?;

        self.system = Some(params.system);
        self.tuned = Some(*params);
        self.ber = BerCounter::default();
        debug!(
            "cxd2820r: {:?} {} kHz IF {} Hz started",
            params.system, params.frequency_khz, if_hz
        );
        Ok(())
    }

    fn delivery_system(&self) -> Option<DeliverySystem> {
        self.system
    }

    fn read_status(&mut self, bus: &I2cBus) -> Result<LockState> {
        match active(self.system)? {
            DeliverySystem::DvbT => self.read_status_t(bus),
            DeliverySystem::DvbT2 => self.read_status_t2(bus),
            _ => self.read_status_c(bus),
        }
    }

    fn read_signal_strength(&mut self, bus: &I2cBus) -> Result<u16> {
        let key = match active(self.system)? {
            DeliverySystem::DvbT => 0x00026,
            DeliverySystem::DvbT2 => 0x02026,
            _ => return self.read_signal_strength_c(bus),
        };
        let mut buf = [0u8; 2];
        self.rd_regs(bus, key, &mut buf)?;
        Ok(ofdm_strength(buf))
    }

    fn read_snr(&mut self, bus: &I2cBus) -> Result<f64> {
        let system = active(self.system)?;
        self.require_lock(bus)?;
        match system {
            DeliverySystem::DvbT => self.read_snr_t(bus),
            DeliverySystem::DvbT2 => self.read_snr_t2(bus),
            _ => self.read_snr_c(bus),
        }
    }

    fn read_mer(&mut self, bus: &I2cBus) -> Result<f64> {
        match active(self.system)? {
            DeliverySystem::DvbT => {
                self.require_lock(bus)?;
                self.read_mer_t(bus)
            }
            sys => Err(HwStateError::Unsupported(sys).into()),
        }
    }

    fn read_ber(&mut self, bus: &I2cBus) -> Result<Option<u64>> {
        let system = active(self.system)?;
        self.require_lock(bus)?;
        match system {
            DeliverySystem::DvbT => self.read_ber_windowed(bus, 0x00076, 0x00079)?,
            DeliverySystem::DvbT2 => self.read_ber_t2(bus)?,
            _ => self.read_ber_windowed(bus, 0x10076, 0x10079)?,
        }
        Ok(self.ber.total)
    }

    fn read_ucblocks(&mut self, _bus: &I2cBus) -> Result<u64> {
        Err(HwStateError::NotSupported("uncorrected blocks").into())
    }

    fn read_carrier_offset(&mut self, bus: &I2cBus) -> Result<i32> {
        let system = active(self.system)?;
        self.require_lock(bus)?;
        match system {
            DeliverySystem::DvbT => self.read_carrier_offset_t(bus),
            DeliverySystem::DvbT2 => self.read_carrier_offset_t2(bus),
            _ => self.read_carrier_offset_c(bus),
        }
    }
}
