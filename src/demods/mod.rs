pub mod cxd2820r;
pub mod ds3000;

use std::fmt;

use crate::bus::I2cBus;
use crate::diseqc::{DiseqcMessage, LnbVoltage, Tone, ToneBurst};
use crate::error::{HwStateError, Result};
use crate::monitor::LockState;
use crate::tuners::Tuner;
use crate::{DeliverySystem, TuneParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemodInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub i2c_addr: u8,
    pub systems: &'static [DeliverySystem],
}

/// A demodulator. Monitor reads fail with `HwState` when the chip is not
/// in a state where the value means anything.
pub trait Demod: fmt::Debug {
    fn get_info(&self) -> DemodInfo;
    fn init(&mut self, bus: &I2cBus) -> Result<()>;
    fn sleep(&mut self, bus: &I2cBus) -> Result<()>;
    /// Open (`true`) or close the I2C repeater to the tuner.
    fn i2c_gate(&mut self, bus: &I2cBus, enable: bool) -> Result<()>;
    /// Tune `tuner` through the gate, then program the demodulator for
    /// whatever the tuner actually landed on.
    fn set_frontend(
        &mut self,
        bus: &I2cBus,
        tuner: &mut dyn Tuner,
        params: &TuneParams,
    ) -> Result<()>;
    /// The system the last `set_frontend` started, if any.
    fn delivery_system(&self) -> Option<DeliverySystem>;

    fn read_status(&mut self, bus: &I2cBus) -> Result<LockState>;
    fn read_signal_strength(&mut self, _bus: &I2cBus) -> Result<u16> {
        Err(HwStateError::NotSupported("signal strength").into())
    }
    /// CNR in dB
    fn read_snr(&mut self, bus: &I2cBus) -> Result<f64>;
    fn read_mer(&mut self, _bus: &I2cBus) -> Result<f64> {
        Err(HwStateError::NotSupported("MER").into())
    }
    /// Post-FEC error count, `None` while the measurement window is open.
    fn read_ber(&mut self, bus: &I2cBus) -> Result<Option<u64>>;
    fn read_ucblocks(&mut self, bus: &I2cBus) -> Result<u64>;
    /// Carrier offset in Hz
    fn read_carrier_offset(&mut self, bus: &I2cBus) -> Result<i32>;

    fn set_voltage(&mut self, _bus: &I2cBus, _voltage: LnbVoltage) -> Result<()> {
        Err(HwStateError::NotSupported("LNB voltage").into())
    }
    fn set_tone(&mut self, _bus: &I2cBus, _tone: Tone) -> Result<()> {
        Err(HwStateError::NotSupported("22 kHz tone").into())
    }
    fn send_diseqc(&mut self, _bus: &I2cBus, _msg: &DiseqcMessage) -> Result<()> {
        Err(HwStateError::NotSupported("DiSEqC").into())
    }
    fn send_burst(&mut self, _bus: &I2cBus, _burst: ToneBurst) -> Result<()> {
        Err(HwStateError::NotSupported("tone burst").into())
    }
}

/// Run `f` with the demodulator's tuner gate open. The gate is closed
/// again whether or not `f` succeeds; the first error wins.
pub fn gated<T, F>(demod: &mut dyn Demod, bus: &I2cBus, f: F) -> Result<T>
where
    F: FnOnce(&I2cBus) -> Result<T>,
{
    demod.i2c_gate(bus, true)?;
    let value = f(bus);
    let close = demod.i2c_gate(bus, false);
    let value = value?;
    close?;
    Ok(value)
}

/// The active system, or `NotActive`.
pub(crate) fn active(system: Option<DeliverySystem>) -> Result<DeliverySystem> {
    system.ok_or_else(|| HwStateError::NotActive.into())
}
