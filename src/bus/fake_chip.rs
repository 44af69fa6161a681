//! Register-file fake behind `MockTwsiHandle`, used by the chip driver tests.
//!
//! Sub-addressed writes store bytes with auto-increment, sub-addressed
//! reads return them. Slaves marked as banked treat register 0x00 as the
//! bank select, so every other register is keyed by the current bank.
//! Transactions without a sub-address go to a per-slave raw byte stream.
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::mock_twsi_handle::MockTwsiHandle;
use super::I2cBus;

#[derive(Default)]
pub(crate) struct FakeChip {
    regs: HashMap<(u8, u8, u8), u8>,
    banked: HashSet<u8>,
    bank: HashMap<u8, u8>,
    pinned: HashMap<(u8, u8, u8), u8>,
    raw_status: HashMap<u8, u8>,
    pub(crate) writes: Vec<(u8, u8, u8)>,
    pub(crate) raw_writes: Vec<(u8, Vec<u8>)>,
}

pub(crate) type SharedChip = Arc<Mutex<FakeChip>>;

impl FakeChip {
    pub(crate) fn shared() -> SharedChip {
        Arc::new(Mutex::new(FakeChip::default()))
    }

    /// Build a bus whose every transaction lands in `chip`.
    pub(crate) fn bus(chip: &SharedChip) -> I2cBus {
        let chip = chip.clone();
        let mut handle = MockTwsiHandle::new();
        handle
            .expect_read_write()
            .returning(move |slave, sub_addr, write, read| {
                let mut chip = chip.lock().unwrap();
                chip.transact(slave, sub_addr, write, read);
                Ok(write.len() + read.len())
            });
        I2cBus { handle }
    }

    pub(crate) fn set_banked(&mut self, slave: u8) {
        self.banked.insert(slave);
    }

    pub(crate) fn set(&mut self, slave: u8, reg: u8, val: u8) {
        self.regs.insert((slave, 0, reg), val);
    }

    pub(crate) fn set_banked_reg(&mut self, slave: u8, bank: u8, reg: u8, val: u8) {
        self.regs.insert((slave, bank, reg), val);
    }

    /// Make reads of `reg` return `val` regardless of what gets written,
    /// as for ID and status registers.
    pub(crate) fn pin(&mut self, slave: u8, reg: u8, val: u8) {
        self.pinned.insert((slave, 0, reg), val);
    }

    pub(crate) fn get(&self, slave: u8, reg: u8) -> u8 {
        *self.regs.get(&(slave, 0, reg)).unwrap_or(&0)
    }

    pub(crate) fn get_banked(&self, slave: u8, bank: u8, reg: u8) -> u8 {
        *self.regs.get(&(slave, bank, reg)).unwrap_or(&0)
    }

    pub(crate) fn set_raw_status(&mut self, slave: u8, val: u8) {
        self.raw_status.insert(slave, val);
    }

    /// Every value written to `reg` on `slave`, in order.
    pub(crate) fn writes_to(&self, slave: u8, reg: u8) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|(s, r, _)| *s == slave && *r == reg)
            .map(|(_, _, v)| *v)
            .collect()
    }

    fn key(&self, slave: u8, reg: u8) -> (u8, u8, u8) {
        if self.banked.contains(&slave) && reg != 0x00 {
            (slave, *self.bank.get(&slave).unwrap_or(&0), reg)
        } else {
            (slave, 0, reg)
        }
    }

    fn transact(&mut self, slave: u8, sub_addr: &[u8], write: &[u8], read: &mut [u8]) {
        if sub_addr.is_empty() {
            if !write.is_empty() {
                self.raw_writes.push((slave, write.to_vec()));
            }
            let status = *self.raw_status.get(&slave).unwrap_or(&0);
            for b in read.iter_mut() {
                *b = status;
            }
            return;
        }
        let start = sub_addr[0];
        for (i, &val) in write.iter().enumerate() {
            let reg = start.wrapping_add(i as u8);
            if self.banked.contains(&slave) && reg == 0x00 {
                self.bank.insert(slave, val);
            }
            let key = self.key(slave, reg);
            self.regs.insert(key, val);
            self.writes.push((slave, reg, val));
        }
        for (i, b) in read.iter_mut().enumerate() {
            let key = self.key(slave, start.wrapping_add(i as u8));
            *b = match self.pinned.get(&key) {
                Some(val) => *val,
                None => *self.regs.get(&key).unwrap_or(&0),
            };
        }
    }
}
