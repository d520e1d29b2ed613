use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    bus::{AddressSpace, Bus},
    grom::Grom,
    keyboard::MatrixKeyboard,
    rom::SystemRom,
    scratchpad::Scratchpad,
    vdp::Tms9918,
};

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("image is {got} bytes, larger than the {max} byte device")]
    ImageTooLarge { got: usize, max: usize },
}

/// Capability every bus-attachable device implements. `read` takes `&mut
/// self` because port reads have side effects on real hardware (the VDP
/// read-ahead buffer, the GROM prefetch, the status-flag clears).
pub trait Peripheral {
    fn init(&mut self) -> Result<(), DeviceError>;
    fn reset(&mut self);
    fn read(&mut self, key: u16) -> u8;
    fn write(&mut self, key: u16, value: u8);
}

/// The fixed set of bus-addressable devices. The CPU is deliberately absent:
/// nothing on this machine decodes an address back to the CPU, and keeping it
/// out of the set lets the CPU borrow the rest of the machine during its own
/// execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceId {
    Rom,
    Scratchpad,
    Vdp,
    Grom,
    Keyboard,
}

/// Every bus-addressable device, exclusively owned. Dispatch entries index
/// into this set by `DeviceId` rather than holding references, so a torn-down
/// table can never dangle.
pub struct Devices {
    pub rom: SystemRom,
    pub scratchpad: Scratchpad,
    pub vdp: Tms9918,
    pub grom: Grom,
    pub keyboard: MatrixKeyboard,
}

impl Devices {
    pub fn init_all(&mut self) -> Result<(), DeviceError> {
        self.rom.init()?;
        self.scratchpad.init()?;
        self.vdp.init()?;
        self.grom.init()?;
        self.keyboard.init()?;
        Ok(())
    }

    pub fn reset_all(&mut self) {
        self.rom.reset();
        self.scratchpad.reset();
        self.vdp.reset();
        self.grom.reset();
        self.keyboard.reset();
    }

    pub fn read(&mut self, id: DeviceId, key: u16) -> u8 {
        match id {
            DeviceId::Rom => self.rom.read(key),
            DeviceId::Scratchpad => self.scratchpad.read(key),
            DeviceId::Vdp => self.vdp.read(key),
            DeviceId::Grom => self.grom.read(key),
            DeviceId::Keyboard => self.keyboard.read(key),
        }
    }

    pub fn write(&mut self, id: DeviceId, key: u16, value: u8) {
        match id {
            DeviceId::Rom => self.rom.write(key, value),
            DeviceId::Scratchpad => self.scratchpad.write(key, value),
            DeviceId::Vdp => self.vdp.write(key, value),
            DeviceId::Grom => self.grom.write(key, value),
            DeviceId::Keyboard => self.keyboard.write(key, value),
        }
    }
}

/// A live view of the bus: dispatch tables plus the device set behind them.
/// This is what the CPU sees while it runs, and what the machine's debug
/// accessors go through, so every access takes the same resolve-then-dispatch
/// path.
pub struct BusView<'a> {
    pub bus: &'a Bus,
    pub devices: &'a mut Devices,
}

impl BusView<'_> {
    pub fn read(&mut self, space: AddressSpace, addr: usize) -> u8 {
        match self.bus.resolve(space, addr) {
            Some((device, key)) => self.devices.read(device, key),
            None => {
                tracing::trace!("[BUS] open-bus read {:?} {:#06X}", space, addr);
                space.open_bus()
            }
        }
    }

    pub fn write(&mut self, space: AddressSpace, addr: usize, value: u8) {
        match self.bus.resolve(space, addr) {
            Some((device, key)) => self.devices.write(device, key, value),
            None => {
                tracing::trace!(
                    "[BUS] dropped write {:?} {:#06X} = {:02X}",
                    space,
                    addr,
                    value
                );
            }
        }
    }

    pub fn read_mem(&mut self, addr: u16) -> u8 {
        self.read(AddressSpace::MemRead, addr as usize)
    }

    pub fn write_mem(&mut self, addr: u16, value: u8) {
        self.write(AddressSpace::MemWrite, addr as usize, value);
    }

    pub fn read_io(&mut self, addr: u16) -> u8 {
        self.read(AddressSpace::IoRead, addr as usize)
    }

    pub fn write_io(&mut self, addr: u16, value: u8) {
        self.write(AddressSpace::IoWrite, addr as usize, value);
    }

    /// 16-bit read, big-endian as the TMS9900 sees memory.
    pub fn read_mem_word(&mut self, addr: u16) -> u16 {
        let high = self.read_mem(addr) as u16;
        let low = self.read_mem(addr.wrapping_add(1)) as u16;
        (high << 8) | low
    }
}
