// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use mockall::predicate::{self, eq};

use super::mock_spi_handle::MockSpiHandle;
use super::SpiBus;

#[test]
fn test_write_sends_frame_without_rx() {
    let mut mock_handle = MockSpiHandle::new();
    mock_handle
        .expect_transfer()
        .times(1)
        .with(eq([0x7f_u8, 0x01, 0x00, 0x02]), predicate::always())
        .returning(|_, rx| {
            assert!(rx.is_empty());
            Ok(())
        });
    let bus = SpiBus {
        handle: mock_handle,
    };
    bus.write(&[0x7f, 0x01, 0x00, 0x02]).unwrap();
}

#[test]
fn test_read_clocks_fill_bytes() {
    let mut mock_handle = MockSpiHandle::new();
    mock_handle
        .expect_transfer()
        .times(1)
        .returning(|tx, rx| {
            assert_eq!(tx, [0, 0, 0]);
            rx.copy_from_slice(&[0x4c, 0x01, 0x00]);
            Ok(())
        });
    let bus = SpiBus {
        handle: mock_handle,
    };
    assert_eq!(bus.read(3).unwrap(), vec![0x4c, 0x01, 0x00]);
}
