use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;

use crate::device::{DeviceError, Peripheral};

pub const VRAM_SIZE: usize = 0x4000;

/// Local key for the VRAM data port (even addresses in the window).
pub const VDP_PORT_DATA: u16 = 0;
/// Local key for the control/status port (addresses with bit 1 set).
pub const VDP_PORT_CONTROL: u16 = 1;

/// One NTSC field in microseconds. The frame flag is raised once per field;
/// pixel-level timing is the renderer's problem, not the bus core's.
pub const FRAME_PERIOD_US: u64 = 16_667;

const STATUS_FRAME: u8 = 0x80;
const REG1_INTERRUPT_ENABLE: u8 = 0x20;

/// TMS9918 video controller, modeled at its port interface: the CPU only
/// ever sees two ports, data and control/status. Rendering is out of scope
/// here; the VRAM and registers are public so an external renderer can draw
/// from them.
#[derive(Clone, Serialize, Deserialize)]
pub struct Tms9918 {
    #[serde(with = "BigArray")]
    pub vram: [u8; VRAM_SIZE],
    pub registers: [u8; 8],
    pub status: u8,
    pub address: u16,
    /// First byte of a two-byte control write, if one is pending.
    pub first_write: Option<u8>,
    /// Read-ahead buffer: data reads return this and then prefetch the next
    /// VRAM byte.
    pub data_pre_read: u8,
    next_frame_at: u64,
}

impl Tms9918 {
    pub fn new() -> Self {
        Self {
            vram: [0; VRAM_SIZE],
            registers: [0; 8],
            status: 0,
            address: 0,
            first_write: None,
            data_pre_read: 0,
            next_frame_at: FRAME_PERIOD_US,
        }
    }

    /// Per-tick hook: raise the frame flag at each field boundary the
    /// timestamp has crossed. The flag stays up until the status port is
    /// read, as on the real chip.
    pub fn execute(&mut self, timestamp: u64) {
        while timestamp >= self.next_frame_at {
            self.status |= STATUS_FRAME;
            self.next_frame_at += FRAME_PERIOD_US;
        }
    }

    /// True when the chip is pulling its interrupt line: frame flag set and
    /// interrupts enabled in register 1.
    pub fn interrupt_active(&self) -> bool {
        self.status & STATUS_FRAME != 0 && self.registers[1] & REG1_INTERRUPT_ENABLE != 0
    }

    fn read_data(&mut self) -> u8 {
        self.first_write = None;
        let data = self.data_pre_read;
        self.data_pre_read = self.vram[self.address as usize];
        self.address = (self.address + 1) & 0x3FFF;
        data
    }

    fn write_data(&mut self, data: u8) {
        self.vram[self.address as usize] = data;
        self.data_pre_read = data;
        self.address = (self.address + 1) & 0x3FFF;
        self.first_write = None;
    }

    fn read_status(&mut self) -> u8 {
        let status = self.status;
        self.status &= !STATUS_FRAME;
        self.first_write = None;
        status
    }

    fn write_control(&mut self, val: u8) {
        let Some(first) = self.first_write else {
            self.first_write = Some(val);
            // the low address byte takes effect immediately
            self.address = (self.address & !0xFF) | val as u16;
            return;
        };

        if val & 0x80 != 0 {
            self.write_register(val & 0x07, first);
        } else {
            self.address = (((val & 0x3F) as u16) << 8) | first as u16;
            if val & 0x40 == 0 {
                // read setup primes the read-ahead buffer
                self.data_pre_read = self.vram[self.address as usize];
                self.address = (self.address + 1) & 0x3FFF;
            }
        }
        self.first_write = None;
    }

    fn write_register(&mut self, reg: u8, value: u8) {
        tracing::trace!("[VDP] R{} = {:02X}", reg, value);
        self.registers[reg as usize] = value;
    }
}

impl Default for Tms9918 {
    fn default() -> Self {
        Self::new()
    }
}

impl Peripheral for Tms9918 {
    fn init(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn reset(&mut self) {
        self.vram = [0; VRAM_SIZE];
        self.registers = [0; 8];
        self.status = 0;
        self.address = 0;
        self.first_write = None;
        self.data_pre_read = 0;
        self.next_frame_at = FRAME_PERIOD_US;
    }

    fn read(&mut self, key: u16) -> u8 {
        match key {
            VDP_PORT_DATA => self.read_data(),
            VDP_PORT_CONTROL => self.read_status(),
            _ => {
                tracing::error!("[VDP] invalid port key {}", key);
                0xFF
            }
        }
    }

    fn write(&mut self, key: u16, value: u8) {
        match key {
            VDP_PORT_DATA => self.write_data(value),
            VDP_PORT_CONTROL => self.write_control(value),
            _ => tracing::error!("[VDP] invalid port key {} = {:02X}", key, value),
        }
    }
}
