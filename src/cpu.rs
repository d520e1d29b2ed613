use serde::{Deserialize, Serialize};

use crate::device::{BusView, DeviceError};

/// TMS9900 processing core, modeled at its bus boundary. Instruction decode
/// and execution timing belong to the interpreter crate layered on top of
/// this core; what matters here is that the CPU owns the architectural
/// registers, probes the live bus for its reset vector, and gets the first
/// execution slot of every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tms9900 {
    /// Program counter.
    pub pc: u16,
    /// Workspace pointer (the 9900 keeps its registers in RAM).
    pub wp: u16,
    /// Status register; the low nibble is the interrupt mask.
    pub st: u16,
    last_timestamp: u64,
}

impl Tms9900 {
    pub fn new() -> Self {
        Self {
            pc: 0,
            wp: 0,
            st: 0,
            last_timestamp: 0,
        }
    }

    /// Fetch the reset vector: workspace pointer at 0x0000, entry point at
    /// 0x0002. This is why the CPU is built last, after the claim set is
    /// live.
    pub fn init(&mut self, bus: &mut BusView) -> Result<(), DeviceError> {
        self.wp = bus.read_mem_word(0x0000);
        self.pc = bus.read_mem_word(0x0002);
        self.st = 0;
        tracing::info!("[CPU] reset vector WP={:04X} PC={:04X}", self.wp, self.pc);
        Ok(())
    }

    /// Per-tick execution slot. The scheduler guarantees this runs before
    /// the video controller is polled, so an interrupt raised by video
    /// activity within the tick lands on the next tick's CPU step.
    pub fn execute(&mut self, timestamp: u64, _bus: &mut BusView) {
        self.last_timestamp = timestamp;
    }

    /// Interrupt mask from the status register low nibble; a nonzero mask
    /// means at least level-1 interrupts are taken.
    pub fn interrupts_enabled(&self) -> bool {
        self.st & 0x000F != 0
    }
}

impl Default for Tms9900 {
    fn default() -> Self {
        Self::new()
    }
}
