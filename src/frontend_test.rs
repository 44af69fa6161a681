// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;
use crate::bus::fake_chip::{FakeChip, SharedChip};
use crate::error::FrontendError;
use crate::tuners::m88ts2022::TUNER_INFO;
use crate::tuners::MockTuner;

const DEMOD: u8 = 0x68;

fn satellite(chip: &SharedChip, tuner: MockTuner) -> Frontend {
    Frontend::new(
        FakeChip::bus(chip),
        Box::new(Ds3000::new(Ds3000Config::default())),
        Box::new(tuner),
    )
}

/// Tuner that lands 3 MHz above whatever it is asked for.
fn offset_tuner() -> MockTuner {
    let mut tuner = MockTuner::new();
    tuner.expect_set_params().times(1).returning(|_, _| Ok(()));
    tuner.expect_get_frequency().return_const(1_203_000_u32);
    tuner
        .expect_get_rf_strength()
        .returning(|_| Ok(Some(0x8000)));
    tuner
}

fn tuned_satellite(chip: &SharedChip) -> Frontend {
    chip.lock().unwrap().pin(DEMOD, 0xd1, 0x07);
    let mut frontend = satellite(chip, offset_tuner());
    frontend
        .tune(&TuneParams::satellite(DeliverySystem::DvbS, 1_200_000, 27_500_000))
        .unwrap();
    frontend
}

#[test]
fn test_init_opens_gate_for_tuner() {
    let chip = FakeChip::shared();
    chip.lock().unwrap().pin(DEMOD, 0x00, 0xe0);
    let mut tuner = MockTuner::new();
    tuner.expect_init().times(1).returning(|_| Ok(()));
    tuner.expect_get_info().return_const(TUNER_INFO);
    let mut frontend = satellite(&chip, tuner);
    frontend.init().unwrap();
    assert_eq!(chip.lock().unwrap().writes_to(DEMOD, 0x03), vec![0x12, 0x02]);
    assert_eq!(frontend.params(), None);
}

#[test]
fn test_init_stops_on_bad_demod() {
    let chip = FakeChip::shared();
    chip.lock().unwrap().pin(DEMOD, 0x00, 0x10);
    let mut tuner = MockTuner::new();
    tuner.expect_init().times(0);
    let mut frontend = satellite(&chip, tuner);
    assert!(frontend.init().is_err());
}

#[test]
fn test_tune_rejects_foreign_system() {
    let chip = FakeChip::shared();
    let mut tuner = MockTuner::new();
    tuner.expect_set_params().times(0);
    let mut frontend = satellite(&chip, tuner);
    match frontend.tune(&TuneParams::terrestrial(DeliverySystem::DvbT, 474_000, 8_000_000)) {
        Err(FrontendError::HwState(HwStateError::Unsupported(DeliverySystem::DvbT))) => (),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(frontend.params(), None);
}

#[test]
fn test_stats_when_idle() {
    let chip = FakeChip::shared();
    let mut tuner = MockTuner::new();
    tuner
        .expect_get_rf_strength()
        .times(1)
        .returning(|_| Ok(None));
    let mut frontend = satellite(&chip, tuner);
    let stats = frontend.read_stats().unwrap();
    assert_eq!(stats, SignalStats::default());
    assert!(frontend.read_status().is_err());
}

#[test]
fn test_stats_when_locked() {
    let chip = FakeChip::shared();
    let mut frontend = tuned_satellite(&chip);
    assert_eq!(frontend.read_status().unwrap(), LockState::Locked);

    let stats = frontend.read_stats().unwrap();
    assert_eq!(stats.lock, LockState::Locked);
    assert_eq!(stats.strength, Some(0x8000));
    assert_eq!(stats.cnr_db, Some(0.0));
    // no MER on this demodulator
    assert_eq!(stats.mer_db, None);
    assert_eq!(stats.post_bit_errors, Some(0));
    assert_eq!(stats.ucblocks, Some(0));
    assert_eq!(stats.carrier_offset_hz, Some(3_000_000));
    assert!((stats.ppm.unwrap() - 2500.0).abs() < 1e-9);
}

#[test]
fn test_stats_without_lock_skip_quality() {
    let chip = FakeChip::shared();
    let mut frontend = tuned_satellite(&chip);
    chip.lock().unwrap().pin(DEMOD, 0xd1, 0x03);

    let stats = frontend.read_stats().unwrap();
    assert_eq!(stats.lock, LockState::NoSignal);
    assert_eq!(stats.strength, Some(0x8000));
    assert_eq!(stats.cnr_db, None);
    assert_eq!(stats.carrier_offset_hz, None);
    assert_eq!(stats.ppm, None);
}

#[test]
fn test_tune_lnb_sets_voltage_and_tone() {
    let chip = FakeChip::shared();
    chip.lock().unwrap().pin(DEMOD, 0x0d, 0x8f);
    let mut tuner = MockTuner::new();
    tuner
        .expect_set_params()
        .withf(|_, params| params.frequency_khz == 1_178_000)
        .times(1)
        .returning(|_, _| Ok(()));
    tuner.expect_get_frequency().return_const(1_178_000_u32);
    let mut frontend = satellite(&chip, tuner);

    frontend
        .tune_lnb(
            &LnbConfig::default(),
            11_778_000,
            Polarization::Vertical,
            DeliverySystem::DvbS2,
            27_500_000,
        )
        .unwrap();
    let c = chip.lock().unwrap();
    // 13 V
    assert_eq!(c.get(DEMOD, 0xa2) & 0x03, 0x01);
    // continuous tone
    assert_eq!(c.get(DEMOD, 0xa1) & 0x47, 0x04);
    drop(c);
    assert_eq!(frontend.params().unwrap().frequency_khz, 1_178_000);
}

#[test]
fn test_tune_lnb_below_oscillator() {
    let chip = FakeChip::shared();
    let mut tuner = MockTuner::new();
    tuner.expect_set_params().times(0);
    let mut frontend = satellite(&chip, tuner);
    assert!(frontend
        .tune_lnb(
            &LnbConfig::default(),
            9_000_000,
            Polarization::Horizontal,
            DeliverySystem::DvbS,
            27_500_000,
        )
        .is_err());
}

#[test]
fn test_sleep_tuner_then_demod() {
    let chip = FakeChip::shared();
    let mut frontend = tuned_satellite(&chip);
    // replace the tuner to set the sleep expectation
    let mut tuner = MockTuner::new();
    tuner.expect_sleep().times(1).returning(|_| Ok(()));
    frontend.tuner = Box::new(tuner);

    frontend.sleep().unwrap();
    assert_eq!(frontend.params(), None);
    let c = chip.lock().unwrap();
    assert_eq!(c.get(DEMOD, 0x07), 0x80);
    assert_eq!(c.writes_to(DEMOD, 0x03).last(), Some(&0x02));
}

#[test]
fn test_terrestrial_rejects_satellite() {
    let chip = FakeChip::shared();
    let mut tuner = MockTuner::new();
    tuner.expect_set_params().times(0);
    let mut frontend = Frontend::new(
        FakeChip::bus(&chip),
        Box::new(Cxd2820r::new(Cxd2820rConfig::default())),
        Box::new(tuner),
    );
    assert!(frontend
        .tune(&TuneParams::satellite(DeliverySystem::DvbS2, 1_200_000, 27_500_000))
        .is_err());
    assert!(frontend.set_tone(Tone::On).is_err());
}
