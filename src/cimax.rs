//! CIMaX CI+ bridge. The host talks to it with framed requests on SPI:
//! `[cmd, seq, len_hi, len_lo, payload..]`, answered by a frame of the
//! same shape whose first byte is a status code.
use std::thread;
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use log::{debug, info, warn};

use crate::bus::constants::SPI_DEV;
use crate::error::{FrontendError, Result};
use crate::gpio::{Direction, Gpio};
use crate::spi::{SpiBus, SPI_MODE_0};

const HEADER_LEN: usize = 4;
const MAX_PAYLOAD: usize = 4096;

// Requests
const CMD_INIT: u8 = 0x00;
const CMD_CAM_RESET: u8 = 0x01;
const CMD_GET_CIS: u8 = 0x02;
const CMD_WRITE_COR: u8 = 0x03;
const CMD_NEGOTIATE: u8 = 0x04;
const CMD_WRITE_LPDU: u8 = 0x05;
const CMD_READ_LPDU: u8 = 0x06;
const CMD_REG_WRITE: u8 = 0x7f;
const CMD_REG_READ: u8 = 0xff;

// Responses
const RSP_CAM_RESET_OK: u8 = 0x40;
const RSP_GET_CIS_OK: u8 = 0x41;
const RSP_WRITE_COR_OK: u8 = 0x42;
const RSP_NEGOTIATE_OK: u8 = 0x43;
const RSP_WRITE_LPDU_OK: u8 = 0x44;
const RSP_READ_LPDU_OK: u8 = 0x46;
const RSP_INIT_OK: u8 = 0x4b;
const RSP_REG_READ_OK: u8 = 0x4c;
const RSP_REG_WRITE_OK: u8 = 0x4d;

pub const REG_MOD_CTRL_A: u16 = 0x0000;
pub const REG_MOD_CTRL_B: u16 = 0x0009;
pub const REG_IN_SEL: u16 = 0x0012;
pub const REG_OUT_SEL: u16 = 0x0013;
pub const REG_ROUTER_CAM_MOD: u16 = 0x0016;
pub const REG_ROUTER_CAM_CH: u16 = 0x0017;
pub const REG_CKMAN_CFG: u16 = 0x0018;
pub const REG_CKMAN_SEL: u16 = 0x0019;
pub const REG_P1_CTRL: u16 = 0x001c;
pub const REG_P2_CTRL: u16 = 0x001d;
pub const REG_POWER_CTRL: u16 = 0x001e;

/// Module-detect bit in MOD_CTRL_x.
const MOD_CTRL_DET: u8 = 0x01;

/// TS in on channel 1, routed through slot A and out on channel 1, with
/// the 72 MHz clock driving both CAM ports.
const INIT_TABLE: [(u16, u8); 9] = [
    (REG_IN_SEL, 0x01),
    (REG_OUT_SEL, 0x01),
    (REG_ROUTER_CAM_MOD, 0x81),
    (REG_ROUTER_CAM_CH, 0x80),
    (REG_CKMAN_SEL, 0x00),
    (REG_CKMAN_CFG, 0x3c),
    (REG_P1_CTRL, 0x40),
    (REG_P2_CTRL, 0x40),
    (REG_POWER_CTRL, 0x03),
];

// CIS tuples
const CISTPL_CONFIG: u8 = 0x1a;
const CISTPL_CFTABLE_ENTRY: u8 = 0x1b;
const CISTPL_END: u8 = 0xff;

const RESET_PULSE: Duration = Duration::from_millis(10);
const RESET_SETTLE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    fn flag(&self) -> u8 {
        match self {
            Slot::A => 0x00,
            Slot::B => 0x80,
        }
    }

    fn ctrl_reg(&self) -> u16 {
        match self {
            Slot::A => REG_MOD_CTRL_A,
            Slot::B => REG_MOD_CTRL_B,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CimaxConfig {
    pub spi_path: String,
    pub spi_speed_hz: u32,
    /// GPIO driving the bridge reset line, if wired
    pub reset_pin: Option<u32>,
    /// Level that holds the bridge in reset
    pub reset_active: bool,
}

impl Default for CimaxConfig {
    fn default() -> Self {
        CimaxConfig {
            spi_path: SPI_DEV.to_string(),
            spi_speed_hz: 1_000_000,
            reset_pin: None,
            reset_active: false,
        }
    }
}

/// Card configuration found in the CIS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CisConfig {
    /// Attribute-memory address of the configuration option register
    pub cor_addr: u16,
    /// Index of the first configuration table entry
    pub cor_value: u8,
}

#[derive(Debug)]
pub struct Cimax {
    spi: SpiBus,
    gpio: Option<Gpio>,
    reset_pin: Option<u32>,
    reset_active: bool,
    seq: u8,
}

impl Cimax {
    pub fn open(config: &CimaxConfig) -> Result<Cimax> {
        let spi = SpiBus::open(&config.spi_path, SPI_MODE_0, config.spi_speed_hz)?;
        let gpio = match config.reset_pin {
            Some(_) => Some(Gpio::open()?),
            None => None,
        };
        Ok(Cimax::with_bus(spi, gpio, config))
    }

    pub fn with_bus(spi: SpiBus, gpio: Option<Gpio>, config: &CimaxConfig) -> Cimax {
        Cimax {
            spi,
            gpio,
            reset_pin: config.reset_pin,
            reset_active: config.reset_active,
            seq: 0,
        }
    }

    /// Pulse the reset line (when wired), start the bridge and load the
    /// routing table.
    pub fn init(&mut self) -> Result<()> {
        if let (Some(gpio), Some(pin)) = (&self.gpio, self.reset_pin) {
            gpio.configure(pin, Direction::Out)?;
            gpio.pulse(pin, self.reset_active, RESET_PULSE)?;
            thread::sleep(RESET_SETTLE);
        }
        self.request(CMD_INIT, &[], RSP_INIT_OK)?;
        self.write_regs(&INIT_TABLE)?;
        info!("CIMaX initialised");
        Ok(())
    }

    pub fn read_reg(&mut self, addr: u16) -> Result<u8> {
        let mut payload = [0_u8; 3];
        BigEndian::write_u16(&mut payload[..2], addr);
        payload[2] = 1;
        let body = self.request(CMD_REG_READ, &payload, RSP_REG_READ_OK)?;
        match body.last() {
            Some(&val) => Ok(val),
            None => Err(FrontendError::FrontendErr(format!(
                "CIMaX register {:#06x} read returned no data",
                addr
            ))),
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) -> Result<()> {
        let mut payload = [0_u8; 4];
        BigEndian::write_u16(&mut payload[..2], addr);
        payload[2] = 1;
        payload[3] = val;
        self.request(CMD_REG_WRITE, &payload, RSP_REG_WRITE_OK)?;
        Ok(())
    }

    pub fn write_regs(&mut self, table: &[(u16, u8)]) -> Result<()> {
        for &(addr, val) in table {
            self.write_reg(addr, val)?;
        }
        Ok(())
    }

    pub fn cam_detect(&mut self, slot: Slot) -> Result<bool> {
        let ctrl = self.read_reg(slot.ctrl_reg())?;
        Ok(ctrl & MOD_CTRL_DET != 0)
    }

    pub fn cam_reset(&mut self, slot: Slot) -> Result<()> {
        self.request(CMD_CAM_RESET | slot.flag(), &[], RSP_CAM_RESET_OK)?;
        debug!("CAM {:?} reset", slot);
        Ok(())
    }

    /// Raw card information structure from attribute memory.
    pub fn get_cis(&mut self, slot: Slot) -> Result<Vec<u8>> {
        self.request(CMD_GET_CIS | slot.flag(), &[], RSP_GET_CIS_OK)
    }

    pub fn write_cor(&mut self, slot: Slot, addr: u16, val: u8) -> Result<()> {
        let mut payload = [0_u8; 3];
        BigEndian::write_u16(&mut payload[..2], addr);
        payload[2] = val;
        self.request(CMD_WRITE_COR | slot.flag(), &payload, RSP_WRITE_COR_OK)?;
        Ok(())
    }

    /// Agree a link-layer buffer size with the CAM; returns the size the
    /// CAM accepted.
    pub fn negotiate(&mut self, slot: Slot, size: u16) -> Result<u16> {
        let mut payload = [0_u8; 2];
        BigEndian::write_u16(&mut payload, size);
        let body = self.request(CMD_NEGOTIATE | slot.flag(), &payload, RSP_NEGOTIATE_OK)?;
        if body.len() < 2 {
            return Err(FrontendError::FrontendErr(format!(
                "CIMaX negotiate answer too short: {} bytes",
                body.len()
            )));
        }
        let agreed = BigEndian::read_u16(&body);
        debug!("CAM {:?} buffer size {} (asked {})", slot, agreed, size);
        Ok(agreed)
    }

    pub fn write_lpdu(&mut self, slot: Slot, lpdu: &[u8]) -> Result<()> {
        self.request(CMD_WRITE_LPDU | slot.flag(), lpdu, RSP_WRITE_LPDU_OK)?;
        Ok(())
    }

    pub fn read_lpdu(&mut self, slot: Slot) -> Result<Vec<u8>> {
        self.request(CMD_READ_LPDU | slot.flag(), &[], RSP_READ_LPDU_OK)
    }

    /// Detect, reset and configure the CAM in `slot`, then negotiate the
    /// buffer size. Returns `None` when the slot is empty.
    pub fn cam_startup(&mut self, slot: Slot, buffer_size: u16) -> Result<Option<u16>> {
        if !self.cam_detect(slot)? {
            info!("no CAM in slot {:?}", slot);
            return Ok(None);
        }
        self.cam_reset(slot)?;
        let cis = self.get_cis(slot)?;
        let config = parse_cis(&cis)?;
        self.write_cor(slot, config.cor_addr, config.cor_value)?;
        self.negotiate(slot, buffer_size).map(Some)
    }

    fn next_seq(&mut self) -> u8 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    fn request(&mut self, cmd: u8, payload: &[u8], expect: u8) -> Result<Vec<u8>> {
        if payload.len() > MAX_PAYLOAD {
            return Err(FrontendError::FrontendErr(format!(
                "CIMaX payload of {} bytes exceeds {}",
                payload.len(),
                MAX_PAYLOAD
            )));
        }
        let seq = self.next_seq();
        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
        frame.push(cmd);
        frame.push(seq);
        frame.write_u16::<BigEndian>(payload.len() as u16)?;
        frame.extend_from_slice(payload);
        self.spi.write(&frame)?;

        let header = self.spi.read(HEADER_LEN)?;
        let len = BigEndian::read_u16(&header[2..4]) as usize;
        let body = if len > 0 {
            self.spi.read(len)?
        } else {
            Vec::new()
        };
        if header[0] != expect {
            warn!(
                "CIMaX cmd {:#04x}: status {:#04x}, expected {:#04x}",
                cmd, header[0], expect
            );
            return Err(FrontendError::FrontendErr(format!(
                "CIMaX cmd {:#04x} failed with status {:#04x}",
                cmd, header[0]
            )));
        }
        if header[1] != seq {
            return Err(FrontendError::FrontendErr(format!(
                "CIMaX sequence mismatch: sent {}, got {}",
                seq, header[1]
            )));
        }
        Ok(body)
    }
}

/// Find the COR address and the first configuration index in a CIS.
pub fn parse_cis(cis: &[u8]) -> Result<CisConfig> {
    let mut cor_addr = None;
    let mut cor_value = None;
    let mut pos = 0;
    while pos + 1 < cis.len() {
        let tag = cis[pos];
        if tag == CISTPL_END {
            break;
        }
        let len = cis[pos + 1] as usize;
        let body = cis.get(pos + 2..pos + 2 + len).ok_or_else(|| {
            FrontendError::FrontendErr(format!("CIS tuple {:#04x} truncated at {}", tag, pos))
        })?;
        match tag {
            CISTPL_CONFIG if body.len() >= 3 => {
                // Low two bits of the size byte: address bytes - 1
                let rasz = (body[0] & 0x03) as usize + 1;
                let addr = body.get(2..2 + rasz).ok_or_else(|| {
                    FrontendError::FrontendErr("CISTPL_CONFIG too short".to_string())
                })?;
                let addr = addr
                    .iter()
                    .rev()
                    .fold(0_u32, |acc, &b| acc << 8 | b as u32);
                cor_addr = Some(addr as u16);
            }
            CISTPL_CFTABLE_ENTRY if cor_value.is_none() && !body.is_empty() => {
                cor_value = Some(body[0] & 0x3f);
            }
            _ => (),
        }
        pos += 2 + len;
    }
    match (cor_addr, cor_value) {
        (Some(cor_addr), Some(cor_value)) => Ok(CisConfig {
            cor_addr,
            cor_value,
        }),
        _ => Err(FrontendError::FrontendErr(
            "CIS has no configuration tuples".to_string(),
        )),
    }
}
