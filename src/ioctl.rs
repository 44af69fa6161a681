//! Argument layouts and request numbers for the kernel character devices.

use crate::bus::MAX_SUB_ADDR_LEN;

pub(crate) const TWSI_IOC_MAGIC: u8 = b'T';
pub(crate) const SPI_IOC_MAGIC: u8 = b'k';
pub(crate) const GPIO_IOC_MAGIC: u8 = b'G';
pub(crate) const PINMUX_IOC_MAGIC: u8 = b'P';

/// One combined transaction on a TWSI master: the sub-address and write
/// buffer are clocked out first, then `rlen` bytes are read back under a
/// repeated start.
#[repr(C)]
pub(crate) struct TwsiRwArgs {
    pub(crate) master: u32,
    pub(crate) slave: u32,
    pub(crate) sub_addr: [u8; MAX_SUB_ADDR_LEN],
    pub(crate) sub_addr_len: u32,
    pub(crate) wbuf: *const u8,
    pub(crate) wlen: u32,
    pub(crate) rbuf: *mut u8,
    pub(crate) rlen: u32,
}

/// Same layout as the kernel's `struct spi_ioc_transfer`.
#[repr(C)]
#[derive(Default)]
pub(crate) struct SpiIocTransfer {
    pub(crate) tx_buf: u64,
    pub(crate) rx_buf: u64,
    pub(crate) len: u32,
    pub(crate) speed_hz: u32,
    pub(crate) delay_usecs: u16,
    pub(crate) bits_per_word: u8,
    pub(crate) cs_change: u8,
    pub(crate) tx_nbits: u8,
    pub(crate) rx_nbits: u8,
    pub(crate) word_delay_usecs: u8,
    pub(crate) pad: u8,
}

#[repr(C)]
pub(crate) struct GpioArgs {
    pub(crate) pin: u32,
    pub(crate) value: u32,
}

#[repr(C)]
pub(crate) struct PinmuxArgs {
    pub(crate) pin: u32,
    pub(crate) function: u32,
}

nix::ioctl_write_int!(twsi_set_speed, TWSI_IOC_MAGIC, 1);
nix::ioctl_readwrite!(twsi_read_write, TWSI_IOC_MAGIC, 2, TwsiRwArgs);

nix::ioctl_write_buf!(spi_message, SPI_IOC_MAGIC, 0, SpiIocTransfer);
nix::ioctl_write_ptr!(spi_set_mode, SPI_IOC_MAGIC, 1, u8);
nix::ioctl_write_ptr!(spi_set_bits_per_word, SPI_IOC_MAGIC, 3, u8);
nix::ioctl_write_ptr!(spi_set_max_speed, SPI_IOC_MAGIC, 4, u32);

nix::ioctl_write_ptr!(gpio_set_input, GPIO_IOC_MAGIC, 1, GpioArgs);
nix::ioctl_write_ptr!(gpio_set_output, GPIO_IOC_MAGIC, 2, GpioArgs);
nix::ioctl_write_ptr!(gpio_set_value, GPIO_IOC_MAGIC, 3, GpioArgs);
nix::ioctl_readwrite!(gpio_get_value, GPIO_IOC_MAGIC, 4, GpioArgs);

nix::ioctl_write_ptr!(pinmux_set_function, PINMUX_IOC_MAGIC, 1, PinmuxArgs);
