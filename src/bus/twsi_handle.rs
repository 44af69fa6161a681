use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

use crate::error::FrontendError::FrontendErr;
use crate::error::Result;
use crate::ioctl::{twsi_read_write, twsi_set_speed, TwsiRwArgs};

use super::{MAX_SUB_ADDR_LEN, MAX_TWSI_INDEX, TWSI_DEV_PREFIX};

/// An open `/dev/twsiN` master.
#[derive(Debug)]
pub struct TwsiHandle {
    file: File,
    master: u32,
}

impl TwsiHandle {
    pub fn open(index: u8) -> Result<Self> {
        if index > MAX_TWSI_INDEX {
            return Err(FrontendErr(format!(
                "TWSI master {} out of range (0..={})",
                index, MAX_TWSI_INDEX
            )));
        }
        let path = format!("{}{}", TWSI_DEV_PREFIX, index);
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(TwsiHandle {
            file,
            master: index as u32,
        })
    }

    pub fn set_speed(&self, hz: u32) -> Result<()> {
        unsafe { twsi_set_speed(self.file.as_raw_fd(), hz as nix::sys::ioctl::ioctl_param_type) }?;
        Ok(())
    }

    /// Run one combined transaction. `sub_addr` and `write` go out first,
    /// then `read.len()` bytes come back. Returns the number of bytes moved
    /// excluding the sub-address.
    pub fn read_write(
        &self,
        slave: u8,
        sub_addr: &[u8],
        write: &[u8],
        read: &mut [u8],
    ) -> Result<usize> {
        assert!(sub_addr.len() <= MAX_SUB_ADDR_LEN);
        let mut args = TwsiRwArgs {
            master: self.master,
            slave: slave as u32,
            sub_addr: [0; MAX_SUB_ADDR_LEN],
            sub_addr_len: sub_addr.len() as u32,
            wbuf: write.as_ptr(),
            wlen: write.len() as u32,
            rbuf: read.as_mut_ptr(),
            rlen: read.len() as u32,
        };
        args.sub_addr[..sub_addr.len()].copy_from_slice(sub_addr);
        unsafe { twsi_read_write(self.file.as_raw_fd(), &mut args) }?;
        Ok(write.len() + read.len())
    }
}
