// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use mockall::predicate::{self, eq};

use crate::bus::mock_twsi_handle::MockTwsiHandle;
use crate::bus::{I2cBus, MAX_XFER_LEN};
use crate::error::FrontendError;

const SLAVE: u8 = 0x60;

#[test]
fn test_read_reg() {
    let mut mock_handle = MockTwsiHandle::new();
    mock_handle
        .expect_read_write()
        .times(1)
        .with(
            eq(SLAVE),
            eq([0x15_u8]),
            predicate::function(|w: &[u8]| w.is_empty()),
            predicate::always(),
        )
        .returning(|_, _, _, read| {
            assert_eq!(read.len(), 1);
            read[0] = 0x40;
            Ok(1)
        });
    let bus = I2cBus {
        handle: mock_handle,
    };
    assert_eq!(bus.read_reg(SLAVE, 0x15).unwrap(), 0x40);
}

#[test]
fn test_write_reg() {
    let mut mock_handle = MockTwsiHandle::new();
    mock_handle
        .expect_read_write()
        .times(1)
        .with(eq(SLAVE), eq([0x42_u8]), eq([0x6c_u8]), predicate::always())
        .returning(|_, _, _, read| {
            assert!(read.is_empty());
            Ok(1)
        });
    let bus = I2cBus {
        handle: mock_handle,
    };
    bus.write_reg(SLAVE, 0x42, 0x6c).unwrap();
}

#[test]
fn test_update_bits_preserves_unmasked() {
    let mut mock_handle = MockTwsiHandle::new();
    let mut seq = mockall::Sequence::new();
    mock_handle
        .expect_read_write()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _, read| {
            read[0] = 0b1010_1010;
            Ok(1)
        });
    mock_handle
        .expect_read_write()
        .times(1)
        .in_sequence(&mut seq)
        .with(
            eq(SLAVE),
            eq([0x10_u8]),
            eq([0b1010_0101_u8]),
            predicate::always(),
        )
        .returning(|_, _, _, _| Ok(1));
    let bus = I2cBus {
        handle: mock_handle,
    };
    bus.update_bits(SLAVE, 0x10, 0x0f, 0x05).unwrap();
}

#[test]
fn test_long_write_is_split() {
    let data = vec![0xab_u8; MAX_XFER_LEN + 3];
    let mut mock_handle = MockTwsiHandle::new();
    let mut seq = mockall::Sequence::new();
    mock_handle
        .expect_read_write()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|_, sub, w, _| sub == [0x01] && w.len() == MAX_XFER_LEN)
        .returning(|_, _, w, _| Ok(w.len()));
    mock_handle
        .expect_read_write()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|_, sub, w, _| sub == [0x01 + MAX_XFER_LEN as u8] && w.len() == 3)
        .returning(|_, _, w, _| Ok(w.len()));
    let bus = I2cBus {
        handle: mock_handle,
    };
    assert_eq!(bus.write(SLAVE, 0x01, &data).unwrap(), MAX_XFER_LEN + 3);
}

#[test]
fn test_read_u16_be() {
    let mut mock_handle = MockTwsiHandle::new();
    mock_handle
        .expect_read_write()
        .times(1)
        .returning(|_, _, _, read| {
            read[0] = 0x12;
            read[1] = 0x34;
            Ok(2)
        });
    let bus = I2cBus {
        handle: mock_handle,
    };
    assert_eq!(bus.read_u16_be(SLAVE, 0x2c).unwrap(), 0x1234);
}

#[test]
fn test_raw_read_has_no_sub_address() {
    let mut mock_handle = MockTwsiHandle::new();
    mock_handle
        .expect_read_write()
        .times(1)
        .withf(|_, sub, w, r| sub.is_empty() && w.is_empty() && r.len() == 1)
        .returning(|_, _, _, read| {
            read[0] = 0x40;
            Ok(1)
        });
    let bus = I2cBus {
        handle: mock_handle,
    };
    let mut status = [0_u8];
    bus.read_raw(SLAVE, &mut status).unwrap();
    assert_eq!(status[0], 0x40);
}

#[test]
fn test_transport_error_propagates() {
    let mut mock_handle = MockTwsiHandle::new();
    mock_handle
        .expect_read_write()
        .times(1)
        .returning(|_, _, _, _| Err(FrontendError::Ioctl(nix::errno::Errno::EIO)));
    let bus = I2cBus {
        handle: mock_handle,
    };
    match bus.read_reg(SLAVE, 0x00) {
        Err(FrontendError::Ioctl(e)) => assert_eq!(e, nix::errno::Errno::EIO),
        other => panic!("unexpected result: {:?}", other),
    }
}
