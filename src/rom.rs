use serde::{Deserialize, Serialize};

use crate::device::{DeviceError, Peripheral};

/// 8k console ROM at the bottom of the memory map.
pub const ROM_SIZE: usize = 0x2000;

/// System ROM. Contents come from the host (the bit layout of the image is
/// not this crate's concern); an absent image reads as 0xFF like an unsoldered
/// chip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemRom {
    data: Vec<u8>,
}

impl SystemRom {
    pub fn new(image: &[u8]) -> Result<Self, DeviceError> {
        if image.len() > ROM_SIZE {
            return Err(DeviceError::ImageTooLarge {
                got: image.len(),
                max: ROM_SIZE,
            });
        }
        let mut data = vec![0xFF; ROM_SIZE];
        data[..image.len()].copy_from_slice(image);
        Ok(Self { data })
    }
}

impl Peripheral for SystemRom {
    fn init(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn reset(&mut self) {}

    fn read(&mut self, key: u16) -> u8 {
        self.data[key as usize & (ROM_SIZE - 1)]
    }

    fn write(&mut self, key: u16, value: u8) {
        tracing::trace!("[ROM] ignored write {:#06X} = {:02X}", key, value);
    }
}
