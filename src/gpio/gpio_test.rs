// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use mockall::predicate::eq;
use mockall::Sequence;

use super::mock_gpio_handle::MockGpioHandle;
use super::{Direction, Gpio, PINMUX_FUNC_GPIO};

#[test]
fn test_configure_output_sets_pinmux_first() {
    let mut mock_handle = MockGpioHandle::new();
    let mut seq = Sequence::new();
    mock_handle
        .expect_set_function()
        .times(1)
        .in_sequence(&mut seq)
        .with(eq(17), eq(PINMUX_FUNC_GPIO))
        .returning(|_, _| Ok(()));
    mock_handle
        .expect_set_output()
        .times(1)
        .in_sequence(&mut seq)
        .with(eq(17), eq(true))
        .returning(|_, _| Ok(()));
    let gpio = Gpio {
        handle: mock_handle,
    };
    gpio.configure(17, Direction::Out).unwrap();
}

#[test]
fn test_pulse_returns_to_inactive_level() {
    let mut mock_handle = MockGpioHandle::new();
    let mut seq = Sequence::new();
    mock_handle
        .expect_write()
        .times(1)
        .in_sequence(&mut seq)
        .with(eq(3), eq(false))
        .returning(|_, _| Ok(()));
    mock_handle
        .expect_write()
        .times(1)
        .in_sequence(&mut seq)
        .with(eq(3), eq(true))
        .returning(|_, _| Ok(()));
    let gpio = Gpio {
        handle: mock_handle,
    };
    gpio.pulse(3, false, Duration::from_millis(1)).unwrap();
}

#[test]
fn test_input_reads_level() {
    let mut mock_handle = MockGpioHandle::new();
    mock_handle
        .expect_read()
        .with(eq(5))
        .returning(|_| Ok(true));
    let gpio = Gpio {
        handle: mock_handle,
    };
    assert!(gpio.input(5).unwrap());
}
