use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;

use crate::device::{DeviceError, Peripheral};

/// The console's only fast RAM: 256 bytes on the CPU's 16-bit bus. The bus
/// claims a 1k window for it with the local key masked to 8 bits, so the
/// chip repeats four times across the window.
pub const SCRATCHPAD_SIZE: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scratchpad {
    #[serde(with = "BigArray")]
    data: [u8; SCRATCHPAD_SIZE],
}

impl Scratchpad {
    pub fn new() -> Self {
        Self {
            data: [0; SCRATCHPAD_SIZE],
        }
    }
}

impl Default for Scratchpad {
    fn default() -> Self {
        Self::new()
    }
}

impl Peripheral for Scratchpad {
    fn init(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn reset(&mut self) {
        self.data = [0; SCRATCHPAD_SIZE];
    }

    fn read(&mut self, key: u16) -> u8 {
        self.data[key as usize & 0xFF]
    }

    fn write(&mut self, key: u16, value: u8) {
        self.data[key as usize & 0xFF] = value;
    }
}
