use crate::bus::{I2cBus, Speed};
use crate::demods::cxd2820r::{Cxd2820r, Cxd2820rConfig};
use crate::demods::ds3000::{Ds3000, Ds3000Config};
use crate::demods::{gated, Demod};
use crate::diseqc::{DiseqcMessage, LnbConfig, LnbVoltage, Polarization, Tone, ToneBurst};
use crate::error::{HwStateError, Result};
use crate::monitor::{optional, ppm, LockState, SignalStats};
use crate::tuners::ascot2s::{Ascot2s, Ascot2sConfig};
use crate::tuners::ft3114::{Ft3114, Ft3114Config};
use crate::tuners::m88ts2022::{M88ts2022, M88ts2022Config};
use crate::tuners::Tuner;
use crate::{DeliverySystem, TuneParams};
use log::{debug, info};

/// Tuner fitted next to the CXD2820R.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrestrialTuner {
    Ascot2s,
    Ft3114,
}

/// One demodulator and its tuner on a TWSI master.
#[derive(Debug)]
pub struct Frontend {
    bus: I2cBus,
    demod: Box<dyn Demod>,
    tuner: Box<dyn Tuner>,
    params: Option<TuneParams>,
}

impl Frontend {
    pub fn new(bus: I2cBus, demod: Box<dyn Demod>, tuner: Box<dyn Tuner>) -> Self {
        Frontend {
            bus,
            demod,
            tuner,
            params: None,
        }
    }

    /// M88DS3000 + M88TS2022 on TWSI master `bus_index`.
    pub fn open_satellite(bus_index: u8) -> Result<Frontend> {
        let bus = I2cBus::open(bus_index, Speed::default())?;
        let mut frontend = Frontend::new(
            bus,
            Box::new(Ds3000::new(Ds3000Config::default())),
            Box::new(M88ts2022::new(M88ts2022Config::default())),
        );
        frontend.init()?;
        Ok(frontend)
    }

    /// CXD2820R + the given tuner on TWSI master `bus_index`.
    pub fn open_terrestrial(bus_index: u8, tuner: TerrestrialTuner) -> Result<Frontend> {
        let bus = I2cBus::open(bus_index, Speed::default())?;
        let tuner: Box<dyn Tuner> = match tuner {
            TerrestrialTuner::Ascot2s => Box::new(Ascot2s::new(Ascot2sConfig::default())),
            TerrestrialTuner::Ft3114 => Box::new(Ft3114::new(Ft3114Config::default())),
        };
        let mut frontend = Frontend::new(
            bus,
            Box::new(Cxd2820r::new(Cxd2820rConfig::default())),
            tuner,
        );
        frontend.init()?;
        Ok(frontend)
    }

    pub fn init(&mut self) -> Result<()> {
        let Frontend {
            bus, demod, tuner, ..
        } = self;
        demod.init(bus)?;
        info!("Init tuner");
        gated(demod.as_mut(), bus, |bus| tuner.init(bus))?;
        self.params = None;
        info!(
            "Init complete: {} + {}",
            self.demod.get_info().name,
            self.tuner.get_info().name
        );
        Ok(())
    }

    pub fn tune(&mut self, params: &TuneParams) -> Result<()> {
        if !self.demod.get_info().systems.contains(&params.system) {
            return Err(HwStateError::Unsupported(params.system).into());
        }
        info!(
            "Tuning {:?} {} kHz, {} sps, {} Hz",
            params.system, params.frequency_khz, params.symbol_rate, params.bandwidth_hz
        );
        self.params = None;
        self.demod
            .set_frontend(&self.bus, self.tuner.as_mut(), params)?;
        self.params = Some(*params);
        Ok(())
    }

    /// Power the LNB for `pol`, select the band with the 22 kHz tone and
    /// tune to the resulting IF.
    pub fn tune_lnb(
        &mut self,
        lnb: &LnbConfig,
        downlink_khz: u32,
        pol: Polarization,
        system: DeliverySystem,
        symbol_rate: u32,
    ) -> Result<()> {
        let setting = lnb.if_for(downlink_khz, pol)?;
        debug!(
            "LNB: {} kHz -> IF {} kHz, {:?}, tone {:?}",
            downlink_khz, setting.if_khz, setting.voltage, setting.tone
        );
        self.set_voltage(setting.voltage)?;
        self.set_tone(setting.tone)?;
        self.tune(&TuneParams::satellite(system, setting.if_khz, symbol_rate))
    }

    /// Parameters of the last successful `tune`.
    pub fn params(&self) -> Option<TuneParams> {
        self.params
    }

    pub fn read_status(&mut self) -> Result<LockState> {
        self.demod.read_status(&self.bus)
    }

    /// Snapshot of the monitor values. Quality figures are only read once
    /// the demodulator reports lock; an idle demodulator reads as
    /// `NoSignal`.
    pub fn read_stats(&mut self) -> Result<SignalStats> {
        let lock = optional(self.demod.read_status(&self.bus))?.unwrap_or_default();
        let mut stats = SignalStats {
            lock,
            ..Default::default()
        };
        stats.strength = match optional(self.demod.read_signal_strength(&self.bus))? {
            Some(strength) => Some(strength),
            None => self.tuner_strength()?,
        };
        if lock < LockState::Locked {
            return Ok(stats);
        }

        let bus = &self.bus;
        stats.cnr_db = optional(self.demod.read_snr(bus))?;
        stats.mer_db = optional(self.demod.read_mer(bus))?;
        stats.post_bit_errors = optional(self.demod.read_ber(bus))?.flatten();
        stats.ucblocks = optional(self.demod.read_ucblocks(bus))?;
        stats.carrier_offset_hz = optional(self.demod.read_carrier_offset(bus))?;
        stats.ppm = match (stats.carrier_offset_hz, self.params) {
            (Some(offset), Some(params)) => ppm(offset, params.frequency_khz as u64 * 1000),
            _ => None,
        };
        Ok(stats)
    }

    fn tuner_strength(&mut self) -> Result<Option<u16>> {
        let Frontend {
            bus, demod, tuner, ..
        } = self;
        let strength = gated(demod.as_mut(), bus, |bus| tuner.get_rf_strength(bus));
        Ok(optional(strength)?.flatten())
    }

    pub fn set_voltage(&mut self, voltage: LnbVoltage) -> Result<()> {
        self.demod.set_voltage(&self.bus, voltage)
    }

    pub fn set_tone(&mut self, tone: Tone) -> Result<()> {
        self.demod.set_tone(&self.bus, tone)
    }

    pub fn send_diseqc(&mut self, msg: &DiseqcMessage) -> Result<()> {
        self.demod.send_diseqc(&self.bus, msg)
    }

    pub fn send_burst(&mut self, burst: ToneBurst) -> Result<()> {
        self.demod.send_burst(&self.bus, burst)
    }

    /// Tuner first (through the gate), then the demodulator.
    pub fn sleep(&mut self) -> Result<()> {
        let Frontend {
            bus, demod, tuner, ..
        } = self;
        gated(demod.as_mut(), bus, |bus| tuner.sleep(bus))?;
        self.demod.sleep(&self.bus)?;
        self.params = None;
        info!("Frontend asleep");
        Ok(())
    }
}

#[cfg(test)]
#[path = "frontend_test.rs"]
mod frontend_test;
