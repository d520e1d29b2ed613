pub mod bus;
pub mod cpu;
pub mod device;
pub mod grom;
pub mod interesting;
pub mod keyboard;
pub mod machine;
pub mod rom;
pub mod scratchpad;
pub mod utils;
pub mod vdp;

pub use bus::{AddressSpace, Bus, DispatchEntry, IO_SIZE, MEM_SIZE};
pub use cpu::Tms9900;
pub use device::{BusView, DeviceError, DeviceId, Devices, Peripheral};
pub use interesting::{DataKey, IndirectKey, InterestingData};
pub use keyboard::{KeyboardLayout, MatrixKeyboard};
pub use machine::{Machine, MachineBuilder, MachineError, Variant};
pub use utils::{hexdump, partial_hexdump};
pub use vdp::Tms9918;

/// Assemble a console from raw ROM and GROM images, ready for `init`.
pub fn get_machine(variant: Variant, rom: &[u8], grom: &[u8]) -> Machine {
    MachineBuilder::new()
        .variant(variant)
        .rom(rom)
        .grom(grom)
        .build()
}
