use std::thread;
use std::time::Duration;

use super::{Tuner, TunerInfo};
use crate::bus::I2cBus;
use crate::error::{FrontendError, HwStateError, Result};
use crate::{DeliverySystem, TuneParams};
use log::{debug, error, info};

pub const TUNER_ID: &str = "ascot2s";

pub const TUNER_INFO: TunerInfo = TunerInfo {
    id: TUNER_ID,
    name: "Sony ASCOT2S",
    i2c_addr: 0x60,
    wake: &[],
    check_addr: 0x7f,
    check_vals: &[0xd0],
};

const FREQ_STEP_KHZ: u32 = 25;
const SETTLE_TIME: Duration = Duration::from_millis(50);
const CPU_IDLE_TIME: Duration = Duration::from_millis(10);

/// Bit 7 hands the RF gain to the internal AGC loop.
const RF_GAIN_AUTO: u8 = 0x80;

const IF_BW_6MHZ: u8 = 0;
const IF_BW_7MHZ: u8 = 1;
const IF_BW_8MHZ: u8 = 2;
const IF_BW_1_7MHZ: u8 = 3;

/// Filter, gain and output setup for one system/bandwidth pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BandSetting {
    if_hz: u32,
    /// 0 drives IF output 1, 1 drives IF output 2
    if_out: u8,
    agc_sel: u8,
    mix_oll: u8,
    rf_gain: u8,
    if_bw: u8,
    /// 5-bit two's complement trims of the IF centre and filter width
    fif_offset: i8,
    bw_offset: i8,
}

impl BandSetting {
    /// 0x05: IF output in bit 0, AGC input in bits 3-4.
    fn output_reg(&self) -> u8 {
        (self.if_out & 0x01) | ((self.agc_sel & 0x03) << 3)
    }

    /// 0x0d..0x0f
    fn filter_regs(&self) -> [u8; 3] {
        [
            self.if_bw & 0x03,
            self.fif_offset as u8 & 0x1f,
            self.bw_offset as u8 & 0x1f,
        ]
    }
}

const fn ofdm(if_hz: u32, if_bw: u8, fif_offset: i8, bw_offset: i8) -> BandSetting {
    BandSetting {
        if_hz,
        if_out: 0,
        agc_sel: 0,
        mix_oll: 0x03,
        rf_gain: RF_GAIN_AUTO,
        if_bw,
        fif_offset,
        bw_offset,
    }
}

/// Cable entries match any bandwidth (0).
const BAND_SETTINGS: [(DeliverySystem, u32, BandSetting); 9] = [
    (DeliverySystem::DvbT, 6_000_000, ofdm(3_600_000, IF_BW_6MHZ, -8, -3)),
    (DeliverySystem::DvbT, 7_000_000, ofdm(4_200_000, IF_BW_7MHZ, -6, -5)),
    (DeliverySystem::DvbT, 8_000_000, ofdm(4_800_000, IF_BW_8MHZ, -4, -6)),
    (DeliverySystem::DvbT2, 1_700_000, ofdm(3_500_000, IF_BW_1_7MHZ, -10, -10)),
    (DeliverySystem::DvbT2, 5_000_000, ofdm(3_600_000, IF_BW_6MHZ, -8, -6)),
    (DeliverySystem::DvbT2, 6_000_000, ofdm(3_600_000, IF_BW_6MHZ, -8, -3)),
    (DeliverySystem::DvbT2, 7_000_000, ofdm(4_200_000, IF_BW_7MHZ, -6, -5)),
    (DeliverySystem::DvbT2, 8_000_000, ofdm(4_800_000, IF_BW_8MHZ, -4, -6)),
    (
        DeliverySystem::DvbC,
        0,
        BandSetting {
            if_hz: 4_900_000,
            if_out: 1,
            agc_sel: 1,
            mix_oll: 0x02,
            rf_gain: RF_GAIN_AUTO,
            if_bw: IF_BW_8MHZ,
            fif_offset: -6,
            bw_offset: -4,
        },
    ),
];

fn band_setting(params: &TuneParams) -> Result<BandSetting> {
    match params.system {
        DeliverySystem::DvbT | DeliverySystem::DvbT2 | DeliverySystem::DvbC => (),
        sys => return Err(HwStateError::Unsupported(sys).into()),
    }
    BAND_SETTINGS
        .iter()
        .find(|(sys, bw, _)| *sys == params.system && (*bw == 0 || *bw == params.bandwidth_hz))
        .map(|&(_, _, setting)| setting)
        .ok_or_else(|| {
            FrontendError::FrontendErr(format!(
                "unsupported bandwidth {} Hz for {:?}",
                params.bandwidth_hz, params.system
            ))
        })
}

#[derive(Debug, Clone, Copy)]
pub struct Ascot2sConfig {
    pub i2c_addr: u8,
}

impl Default for Ascot2sConfig {
    fn default() -> Self {
        Ascot2sConfig {
            i2c_addr: TUNER_INFO.i2c_addr,
        }
    }
}

#[derive(Debug)]
pub struct Ascot2s {
    config: Ascot2sConfig,
    frequency_khz: u32,
    if_hz: u32,
    active: bool,
}

impl Ascot2s {
    pub fn new(config: Ascot2sConfig) -> Ascot2s {
        Ascot2s {
            config,
            frequency_khz: 0,
            if_hz: 0,
            active: false,
        }
    }

    fn wake(&mut self, bus: &I2cBus) -> Result<()> {
        bus.write(self.config.i2c_addr, 0x14, &[0xfb, 0x0f])?;
        bus.write_reg(self.config.i2c_addr, 0x50, 0x00)?;
        self.active = true;
        Ok(())
    }

    fn standby(&mut self, bus: &I2cBus) -> Result<()> {
        bus.write(self.config.i2c_addr, 0x14, &[0x00, 0x04])?;
        bus.write_reg(self.config.i2c_addr, 0x50, 0x01)?;
        self.active = false;
        Ok(())
    }
}

impl Tuner for Ascot2s {
    fn get_info(&self) -> TunerInfo {
        TUNER_INFO
    }

    fn init(&mut self, bus: &I2cBus) -> Result<()> {
        let addr = self.config.i2c_addr;
        self.wake(bus)?;
        thread::sleep(CPU_IDLE_TIME);

        // 0x1a: CPU status, 0x1b: CPU error
        let mut cpu = [0u8; 2];
        bus.read(addr, 0x1a, &mut cpu)?;
        if cpu != [0x00, 0x00] {
            error!("ascot2s: tuner CPU busy after wake-up {:02x?}", cpu);
            return Err(HwStateError::TunerCpu {
                status: cpu[0],
                error: cpu[1],
            }
            .into());
        }

        bus.write_reg(addr, 0x4c, 0x01)?;
        bus.write_reg(addr, 0x07, 0x04)?;
        bus.write_reg(addr, 0x04, 0x00)?;
        bus.write_reg(addr, 0x03, 0xc0)?;
        info!("ascot2s initialised at {:#04x}", addr);
        self.standby(bus)
    }

    fn sleep(&mut self, bus: &I2cBus) -> Result<()> {
        self.standby(bus)
    }

    fn set_params(&mut self, bus: &I2cBus, params: &TuneParams) -> Result<()> {
        let addr = self.config.i2c_addr;
        let setting = band_setting(params)?;
        if !self.active {
            self.wake(bus)?;
        }

        let freq = (params.frequency_khz + FREQ_STEP_KHZ - 1) / FREQ_STEP_KHZ * FREQ_STEP_KHZ;
        debug!("ascot2s: {} kHz, {:?}", freq, setting);

        bus.update_bits(addr, 0x05, 0x1b, setting.output_reg())?;
        bus.update_bits(addr, 0x06, 0x07, setting.mix_oll)?;
        bus.write_reg(addr, 0x09, setting.rf_gain)?;
        bus.write(addr, 0x0d, &setting.filter_regs())?;
        bus.write(
            addr,
            0x10,
            &[freq as u8, (freq >> 8) as u8, ((freq >> 16) & 0x0f) as u8, 0xff, 0xff],
        )?;
        thread::sleep(SETTLE_TIME);
        bus.write_reg(addr, 0x04, 0x00)?;
        bus.write_reg(addr, 0x03, 0xc0)?;
        bus.update_bits(addr, 0x0c, 0x30, 0x00)?;

        self.frequency_khz = freq;
        self.if_hz = setting.if_hz;
        Ok(())
    }

    fn get_frequency(&self) -> u32 {
        self.frequency_khz
    }

    fn get_if_freq(&self) -> u32 {
        self.if_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::fake_chip::FakeChip;

    const ADDR: u8 = 0x60;

    #[test]
    fn test_band_table() {
        let t8 = TuneParams::terrestrial(DeliverySystem::DvbT, 474_000, 8_000_000);
        assert_eq!(band_setting(&t8).unwrap().if_hz, 4_800_000);
        let t7 = TuneParams::terrestrial(DeliverySystem::DvbT2, 474_000, 7_000_000);
        assert_eq!(band_setting(&t7).unwrap().if_hz, 4_200_000);
        let t2 = TuneParams::terrestrial(DeliverySystem::DvbT2, 474_000, 1_700_000);
        assert_eq!(band_setting(&t2).unwrap().if_bw, IF_BW_1_7MHZ);
        let c = TuneParams::cable(338_000, 6_900_000);
        assert_eq!(band_setting(&c).unwrap().if_hz, 4_900_000);

        // 5 MHz and 1.7 MHz exist for T2 only
        let t5 = TuneParams::terrestrial(DeliverySystem::DvbT, 474_000, 5_000_000);
        assert!(band_setting(&t5).is_err());
        let t1_7 = TuneParams::terrestrial(DeliverySystem::DvbT, 474_000, 1_700_000);
        assert!(band_setting(&t1_7).is_err());
        let s = TuneParams::satellite(DeliverySystem::DvbS2, 1_200_000, 27_500_000);
        assert!(band_setting(&s).unwrap_err().is_hw_state());
    }

    #[test]
    fn test_init_ends_in_standby() {
        let chip = FakeChip::shared();
        let bus = FakeChip::bus(&chip);
        let mut tuner = Ascot2s::new(Ascot2sConfig::default());
        tuner.init(&bus).unwrap();

        let c = chip.lock().unwrap();
        assert_eq!(c.writes_to(ADDR, 0x14), vec![0xfb, 0x00]);
        assert_eq!(c.writes_to(ADDR, 0x50), vec![0x00, 0x01]);
        assert_eq!(c.get(ADDR, 0x4c), 0x01);
        assert_eq!(c.get(ADDR, 0x03), 0xc0);
    }

    #[test]
    fn test_init_cpu_busy() {
        let chip = FakeChip::shared();
        chip.lock().unwrap().pin(ADDR, 0x1b, 0x01);
        let bus = FakeChip::bus(&chip);
        let mut tuner = Ascot2s::new(Ascot2sConfig::default());
        let err = tuner.init(&bus).unwrap_err();
        assert!(err.is_hw_state());
        match err {
            FrontendError::HwState(HwStateError::TunerCpu {
                status: 0x00,
                error: 0x01,
            }) => (),
            other => panic!("unexpected {:?}", other),
        }
        // no register setup after the failed check
        assert!(chip.lock().unwrap().writes_to(ADDR, 0x4c).is_empty());
    }

    #[test]
    fn test_set_params_rounds_up_and_wakes() {
        let chip = FakeChip::shared();
        let bus = FakeChip::bus(&chip);
        let mut tuner = Ascot2s::new(Ascot2sConfig::default());
        let params = TuneParams::terrestrial(DeliverySystem::DvbT, 474_010, 8_000_000);
        tuner.set_params(&bus, &params).unwrap();

        let c = chip.lock().unwrap();
        assert_eq!(c.writes_to(ADDR, 0x50), vec![0x00]);
        // 474025 kHz = 0x073ba9
        assert_eq!(c.get(ADDR, 0x10), 0xa9);
        assert_eq!(c.get(ADDR, 0x11), 0x3b);
        assert_eq!(c.get(ADDR, 0x12), 0x07);
        assert_eq!(c.get(ADDR, 0x05) & 0x1b, 0x00);
        // 8 MHz filter, IF -4, BW -6
        assert_eq!(c.get(ADDR, 0x0d), 0x02);
        assert_eq!(c.get(ADDR, 0x0e), 0x1c);
        assert_eq!(c.get(ADDR, 0x0f), 0x1a);
        drop(c);
        assert_eq!(tuner.get_frequency(), 474_025);
        assert_eq!(tuner.get_if_freq(), 4_800_000);
    }

    #[test]
    fn test_set_params_t2_5mhz() {
        let chip = FakeChip::shared();
        let bus = FakeChip::bus(&chip);
        let mut tuner = Ascot2s::new(Ascot2sConfig::default());
        let params = TuneParams::terrestrial(DeliverySystem::DvbT2, 506_000, 5_000_000);
        tuner.set_params(&bus, &params).unwrap();

        let c = chip.lock().unwrap();
        assert_eq!(c.get(ADDR, 0x05) & 0x1b, 0x00);
        assert_eq!(c.get(ADDR, 0x06) & 0x07, 0x03);
        assert_eq!(c.get(ADDR, 0x09), RF_GAIN_AUTO);
        assert_eq!(c.get(ADDR, 0x0d), IF_BW_6MHZ);
        // -8 and -6 in five bits
        assert_eq!(c.get(ADDR, 0x0e), 0x18);
        assert_eq!(c.get(ADDR, 0x0f), 0x1a);
        drop(c);
        assert_eq!(tuner.get_if_freq(), 3_600_000);
    }

    #[test]
    fn test_set_params_cable_uses_second_output() {
        let chip = FakeChip::shared();
        let bus = FakeChip::bus(&chip);
        let mut tuner = Ascot2s::new(Ascot2sConfig::default());
        tuner
            .set_params(&bus, &TuneParams::cable(338_000, 6_900_000))
            .unwrap();

        let c = chip.lock().unwrap();
        // IF output 2, AGC 2
        assert_eq!(c.get(ADDR, 0x05) & 0x1b, 0x09);
        assert_eq!(c.get(ADDR, 0x06) & 0x07, 0x02);
        assert_eq!(c.get(ADDR, 0x0d), IF_BW_8MHZ);
        assert_eq!(c.get(ADDR, 0x0e), 0x1a);
        assert_eq!(c.get(ADDR, 0x0f), 0x1c);
        drop(c);
        assert_eq!(tuner.get_if_freq(), 4_900_000);
    }
}
