use serde::{Deserialize, Serialize};

use crate::device::{DeviceError, Peripheral};

/// Largest image the 16-bit GROM address register can cover.
pub const GROM_MAX_SIZE: usize = 0x10000;

/// Local-key flag: the access targets the address register, not data.
pub const GROM_MODE_ADDRESS: u16 = 0x01;
/// Local-key flag: the access is a write.
pub const GROM_MODE_WRITE: u16 = 0x02;

/// Graphics ROM controller. Unlike linear memory, GROM is reached through a
/// small port interface: a 16-bit auto-incrementing address register written
/// high byte first, and a data port with a one-byte prefetch. The bus encodes
/// which port is being hit into the local key via the mode flags above.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grom {
    data: Vec<u8>,
    pub address: u16,
    read_ahead: u8,
    /// Set after the first (high) byte of an address write; any data access
    /// resets it, as the hardware flip-flop does.
    second_address_byte: bool,
    /// GRAM variants accept data writes; plain GROM ignores them.
    writable: bool,
}

impl Grom {
    pub fn new(image: &[u8], writable: bool) -> Result<Self, DeviceError> {
        if image.len() > GROM_MAX_SIZE {
            return Err(DeviceError::ImageTooLarge {
                got: image.len(),
                max: GROM_MAX_SIZE,
            });
        }
        Ok(Self {
            data: image.to_vec(),
            address: 0,
            read_ahead: 0,
            second_address_byte: false,
            writable,
        })
    }

    fn fetch(&mut self) -> u8 {
        let value = if self.data.is_empty() {
            0xFF
        } else {
            self.data[self.address as usize % self.data.len()]
        };
        self.address = self.address.wrapping_add(1);
        value
    }

    fn read_data(&mut self) -> u8 {
        self.second_address_byte = false;
        let value = self.read_ahead;
        self.read_ahead = self.fetch();
        value
    }

    fn read_address(&mut self) -> u8 {
        // readback returns the address high byte, then the low byte
        let value = if self.second_address_byte {
            (self.address & 0xFF) as u8
        } else {
            (self.address >> 8) as u8
        };
        self.second_address_byte = !self.second_address_byte;
        value
    }

    fn write_address(&mut self, value: u8) {
        self.address = (self.address << 8) | value as u16;
        if self.second_address_byte {
            // second byte completes the address and triggers the prefetch
            self.read_ahead = self.fetch();
        }
        self.second_address_byte = !self.second_address_byte;
    }

    fn write_data(&mut self, value: u8) {
        self.second_address_byte = false;
        if !self.writable {
            tracing::trace!(
                "[GROM] ignored write at {:#06X} = {:02X}",
                self.address,
                value
            );
            return;
        }
        if !self.data.is_empty() {
            // the prefetch has already advanced the counter past the target
            let index = self.address.wrapping_sub(1) as usize % self.data.len();
            self.data[index] = value;
        }
        self.address = self.address.wrapping_add(1);
    }
}

impl Peripheral for Grom {
    fn init(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn reset(&mut self) {
        self.address = 0;
        self.read_ahead = 0;
        self.second_address_byte = false;
    }

    fn read(&mut self, key: u16) -> u8 {
        if key & GROM_MODE_ADDRESS != 0 {
            self.read_address()
        } else {
            self.read_data()
        }
    }

    fn write(&mut self, key: u16, value: u8) {
        if key & GROM_MODE_ADDRESS != 0 {
            self.write_address(value);
        } else {
            self.write_data(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRITE: u16 = GROM_MODE_WRITE;
    const ADDRESS_WRITE: u16 = GROM_MODE_ADDRESS | GROM_MODE_WRITE;

    fn grom_with(image: &[u8]) -> Grom {
        Grom::new(image, false).unwrap()
    }

    #[test]
    fn test_sequential_reads_after_address_setup() {
        let mut grom = grom_with(&[0x10, 0x20, 0x30]);
        grom.write(ADDRESS_WRITE, 0x00);
        grom.write(ADDRESS_WRITE, 0x00);
        assert_eq!(grom.read(0), 0x10);
        assert_eq!(grom.read(0), 0x20);
        assert_eq!(grom.read(0), 0x30);
    }

    #[test]
    fn test_address_setup_high_byte_first() {
        let mut grom = Grom::new(&[0u8; 0x400], false).unwrap();
        grom.write(ADDRESS_WRITE, 0x01);
        grom.write(ADDRESS_WRITE, 0x23);
        // prefetch has already advanced the register past 0x0123
        assert_eq!(grom.address, 0x0124);
    }

    #[test]
    fn test_address_readback() {
        let mut grom = Grom::new(&[0u8; 0x400], false).unwrap();
        grom.write(ADDRESS_WRITE, 0x01);
        grom.write(ADDRESS_WRITE, 0x23);
        assert_eq!(grom.read(GROM_MODE_ADDRESS), 0x01);
        assert_eq!(grom.read(GROM_MODE_ADDRESS), 0x24);
    }

    #[test]
    fn test_data_writes_ignored_when_not_writable() {
        let mut grom = grom_with(&[0xAA]);
        grom.write(ADDRESS_WRITE, 0x00);
        grom.write(ADDRESS_WRITE, 0x00);
        grom.write(WRITE, 0x55);
        grom.write(ADDRESS_WRITE, 0x00);
        grom.write(ADDRESS_WRITE, 0x00);
        assert_eq!(grom.read(0), 0xAA);
    }

    #[test]
    fn test_data_writes_land_when_writable() {
        let mut grom = Grom::new(&[0x00, 0x00], true).unwrap();
        grom.write(ADDRESS_WRITE, 0x00);
        grom.write(ADDRESS_WRITE, 0x00);
        grom.write(WRITE, 0x55);
        grom.write(ADDRESS_WRITE, 0x00);
        grom.write(ADDRESS_WRITE, 0x00);
        assert_eq!(grom.read(0), 0x55);
    }

    #[test]
    fn test_empty_image_reads_high() {
        let mut grom = grom_with(&[]);
        grom.write(ADDRESS_WRITE, 0x00);
        grom.write(ADDRESS_WRITE, 0x00);
        assert_eq!(grom.read(0), 0xFF);
    }
}
