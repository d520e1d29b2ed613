use serde::{Deserialize, Serialize};

use crate::device::DeviceId;

/// CPU-visible memory bus, 64k bytes.
pub const MEM_SIZE: usize = 64 * 1024;
/// CRU bit-serial IO bus, 4k addressable bits.
pub const IO_SIZE: usize = 4 * 1024;

/// The four independently decoded address spaces of the machine. Read and
/// write decoding differ on real hardware (the VDP and GROM ports live at
/// different addresses for read and write), so each direction gets its own
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressSpace {
    MemRead,
    MemWrite,
    IoRead,
    IoWrite,
}

impl AddressSpace {
    pub fn size(&self) -> usize {
        match self {
            AddressSpace::MemRead | AddressSpace::MemWrite => MEM_SIZE,
            AddressSpace::IoRead | AddressSpace::IoWrite => IO_SIZE,
        }
    }

    /// Value observed when reading an address nothing decodes. The data bus
    /// floats high; CRU input lines idle high as well.
    pub fn open_bus(&self) -> u8 {
        match self {
            AddressSpace::MemRead | AddressSpace::MemWrite => 0xFF,
            AddressSpace::IoRead | AddressSpace::IoWrite => 1,
        }
    }
}

/// One address unit's binding: the owning device plus the device-local key
/// handed to its read/write handler in place of the raw bus address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEntry {
    pub device: Option<DeviceId>,
    pub key: u16,
}

/// The four dispatch tables. Claims are only made during machine bring-up;
/// at runtime every bus access is a single table lookup.
pub struct Bus {
    mem_read: Vec<DispatchEntry>,
    mem_write: Vec<DispatchEntry>,
    io_read: Vec<DispatchEntry>,
    io_write: Vec<DispatchEntry>,
}

impl Bus {
    pub fn new() -> Self {
        Self {
            mem_read: vec![DispatchEntry::default(); MEM_SIZE],
            mem_write: vec![DispatchEntry::default(); MEM_SIZE],
            io_read: vec![DispatchEntry::default(); IO_SIZE],
            io_write: vec![DispatchEntry::default(); IO_SIZE],
        }
    }

    fn table(&self, space: AddressSpace) -> &[DispatchEntry] {
        match space {
            AddressSpace::MemRead => &self.mem_read,
            AddressSpace::MemWrite => &self.mem_write,
            AddressSpace::IoRead => &self.io_read,
            AddressSpace::IoWrite => &self.io_write,
        }
    }

    fn table_mut(&mut self, space: AddressSpace) -> &mut [DispatchEntry] {
        match space {
            AddressSpace::MemRead => &mut self.mem_read,
            AddressSpace::MemWrite => &mut self.mem_write,
            AddressSpace::IoRead => &mut self.io_read,
            AddressSpace::IoWrite => &mut self.io_write,
        }
    }

    /// Bind one address to a device and a device-local key. Claiming an
    /// already-claimed address silently replaces the prior binding: the last
    /// claim wins. That is intentional; overlapping claims express
    /// address-line aliasing and variant overrides.
    ///
    /// An address outside the space is a caller bug, not a modeled hardware
    /// fault, and panics.
    pub fn claim(&mut self, space: AddressSpace, addr: usize, device: DeviceId, key: u16) {
        assert!(
            addr < space.size(),
            "claim outside {:?} space: {:#06X}",
            space,
            addr
        );
        self.table_mut(space)[addr] = DispatchEntry {
            device: Some(device),
            key,
        };
    }

    /// Apply `claim` across `start..end` with the given stride, deriving each
    /// local key from the address. This is how hardware address decoding that
    /// only looks at some address lines is expressed (ports repeating every 4
    /// bytes, RAM aliased every 256 bytes, and so on).
    pub fn claim_range<F>(
        &mut self,
        space: AddressSpace,
        start: usize,
        end: usize,
        step: usize,
        device: DeviceId,
        key_fn: F,
    ) where
        F: Fn(usize) -> u16,
    {
        for addr in (start..end).step_by(step) {
            self.claim(space, addr, device, key_fn(addr));
        }
    }

    /// Resolve a bus address to its owning device and local key, or `None`
    /// for an unmapped address (the caller applies the open-bus default).
    pub fn resolve(&self, space: AddressSpace, addr: usize) -> Option<(DeviceId, u16)> {
        assert!(
            addr < space.size(),
            "resolve outside {:?} space: {:#06X}",
            space,
            addr
        );
        let entry = self.table(space)[addr];
        entry.device.map(|device| (device, entry.key))
    }

    /// Unmap every entry in every space. Used on teardown and before a
    /// variant rebuilds its claim set; entries are rebuilt wholesale, never
    /// patched incrementally.
    pub fn clear(&mut self) {
        for table in [
            &mut self.mem_read,
            &mut self.mem_write,
            &mut self.io_read,
            &mut self.io_write,
        ] {
            table.fill(DispatchEntry::default());
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
