use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    bus::{AddressSpace, Bus, IO_SIZE},
    cpu::Tms9900,
    device::{BusView, DeviceError, DeviceId, Devices},
    grom::{Grom, GROM_MODE_ADDRESS, GROM_MODE_WRITE},
    interesting::{DataKey, IndirectKey, InterestingData},
    keyboard::{KeyboardLayout, MatrixKeyboard, KEY_ALPHA_LOCK},
    rom::SystemRom,
    scratchpad::Scratchpad,
    utils::hexdump,
    vdp::{Tms9918, VDP_PORT_CONTROL, VDP_PORT_DATA},
};

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("machine has not been initialized")]
    NotInitialized,
    #[error("machine is already initialized")]
    AlreadyInitialized,
    #[error("tick quantum must be greater than zero")]
    ZeroQuantum,
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Machine model. Successive console revisions differ only in which concrete
/// devices are wired in and which extra lines they decode, so a variant is
/// plain data: a device recipe plus extra claims, not a subclass chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Variant {
    #[default]
    Ti994,
    Ti994a,
}

impl Variant {
    fn keyboard_layout(self) -> KeyboardLayout {
        match self {
            Variant::Ti994 => KeyboardLayout::Ti994,
            Variant::Ti994a => KeyboardLayout::Ti994a,
        }
    }
}

/// One emulated console: exclusive owner of the dispatch tables, every
/// peripheral, the monotonic timestamp and the introspection registry.
///
/// Lifecycle is Uninitialized -> `init` -> Active -> `deinit` ->
/// Uninitialized, and a machine may be re-initialized. The device set can
/// only change while Uninitialized; there is deliberately no way to swap a
/// device under a live claim set.
pub struct Machine {
    variant: Variant,
    rom_image: Vec<u8>,
    grom_image: Vec<u8>,

    bus: Option<Bus>,
    devices: Option<Devices>,
    cpu: Option<Tms9900>,

    current_timestamp: u64,
    interrupt_line: bool,
    pub interesting: InterestingData,
}

impl Machine {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            rom_image: Vec::new(),
            grom_image: Vec::new(),
            bus: None,
            devices: None,
            cpu: None,
            current_timestamp: 0,
            interrupt_line: false,
            interesting: InterestingData::default(),
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn is_active(&self) -> bool {
        self.bus.is_some()
    }

    /// Bring the machine up: tables, devices, claims, then the CPU.
    /// On any failure the machine stays Uninitialized.
    pub fn init(&mut self) -> Result<(), MachineError> {
        if self.is_active() {
            return Err(MachineError::AlreadyInitialized);
        }
        tracing::info!("Initializing {:?} machine", self.variant);

        // dispatch tables first, every entry unmapped
        let mut bus = Bus::new();

        // device selection is the variant hook: same capability set, the
        // variant picks the concrete keyboard and graphics ROM contents
        let mut devices = Devices {
            rom: SystemRom::new(&self.rom_image)?,
            scratchpad: Scratchpad::new(),
            vdp: Tms9918::new(),
            grom: Grom::new(&self.grom_image, false)?,
            keyboard: MatrixKeyboard::new(self.variant.keyboard_layout()),
        };
        devices.init_all()?;

        Self::populate_common_claims(&mut bus);
        self.populate_variant_claims(&mut bus);

        // the CPU is built last: its init probes the now-live bus
        let mut cpu = Tms9900::new();
        cpu.init(&mut BusView {
            bus: &bus,
            devices: &mut devices,
        })?;

        // the introspection registry is rebuilt on every init so a variant
        // swap can never leave a stale association behind
        self.interesting.clear();
        self.interesting
            .set_indirect(IndirectKey::MainCpuPc, DataKey::Tms9900Pc);
        self.interesting.set_indirect(
            IndirectKey::MainCpuInterruptsEnabled,
            DataKey::Tms9900InterruptsEnabled,
        );
        self.interesting.set(DataKey::Tms9900Pc, cpu.pc as u32);
        self.interesting.set(
            DataKey::Tms9900InterruptsEnabled,
            cpu.interrupts_enabled() as u32,
        );

        self.bus = Some(bus);
        self.devices = Some(devices);
        self.cpu = Some(cpu);
        self.current_timestamp = 0;
        self.interrupt_line = false;
        Ok(())
    }

    /// Tear the machine down in reverse order of acquisition: unmap and drop
    /// the tables first so no dispatch entry can outlive a device, then the
    /// devices, then the CPU.
    pub fn deinit(&mut self) -> Result<(), MachineError> {
        if !self.is_active() {
            return Err(MachineError::NotInitialized);
        }
        if let Some(bus) = self.bus.as_mut() {
            bus.clear();
        }
        self.bus = None;
        self.devices = None;
        self.cpu = None;
        self.interrupt_line = false;
        self.interesting.clear();
        tracing::info!("Machine deinitialized");
        Ok(())
    }

    /// Advance the machine by `quantum_us` microseconds of emulated time.
    ///
    /// Order is a design invariant: timestamp, then the CPU slot, then the
    /// video controller, then the interrupt sample. The CPU's view of a tick
    /// is complete before the VDP is asked whether it wants to interrupt, so
    /// a frame flag raised within the tick reaches the CPU on the next one.
    pub fn tick(&mut self, quantum_us: u32) -> Result<(), MachineError> {
        if quantum_us == 0 {
            return Err(MachineError::ZeroQuantum);
        }
        let (Some(bus), Some(devices), Some(cpu)) = (
            self.bus.as_ref(),
            self.devices.as_mut(),
            self.cpu.as_mut(),
        ) else {
            return Err(MachineError::NotInitialized);
        };

        self.current_timestamp += quantum_us as u64;

        cpu.execute(
            self.current_timestamp,
            &mut BusView {
                bus,
                devices: &mut *devices,
            },
        );

        // ROM, GROM, scratchpad and keyboard have no timing behavior; they
        // only change state when the CPU touches them through the bus
        devices.vdp.execute(self.current_timestamp);
        self.interrupt_line = devices.vdp.interrupt_active();

        self.interesting.set(DataKey::Tms9900Pc, cpu.pc as u32);
        self.interesting.set(
            DataKey::Tms9900InterruptsEnabled,
            cpu.interrupts_enabled() as u32,
        );
        Ok(())
    }

    /// Reset every device in place and re-probe the CPU reset vector,
    /// without rebuilding the claim set.
    pub fn reset(&mut self) -> Result<(), MachineError> {
        let (Some(bus), Some(devices), Some(cpu)) = (
            self.bus.as_ref(),
            self.devices.as_mut(),
            self.cpu.as_mut(),
        ) else {
            return Err(MachineError::NotInitialized);
        };
        devices.reset_all();
        cpu.init(&mut BusView {
            bus,
            devices: &mut *devices,
        })?;
        self.interrupt_line = false;
        Ok(())
    }

    pub fn current_timestamp(&self) -> u64 {
        self.current_timestamp
    }

    /// State of the single aggregated interrupt line after the last tick.
    pub fn interrupt_asserted(&self) -> bool {
        self.interrupt_line
    }

    pub fn bus(&self) -> Option<&Bus> {
        self.bus.as_ref()
    }

    pub fn cpu(&self) -> Option<&Tms9900> {
        self.cpu.as_ref()
    }

    pub fn devices(&self) -> Option<&Devices> {
        self.devices.as_ref()
    }

    pub fn key_down(&mut self, name: &str) {
        if let Some(devices) = self.devices.as_mut() {
            devices.keyboard.key_down(name);
        }
    }

    pub fn key_up(&mut self, name: &str) {
        if let Some(devices) = self.devices.as_mut() {
            devices.keyboard.key_up(name);
        }
    }

    fn view(&mut self) -> Result<BusView<'_>, MachineError> {
        let (Some(bus), Some(devices)) = (self.bus.as_ref(), self.devices.as_mut()) else {
            return Err(MachineError::NotInitialized);
        };
        Ok(BusView { bus, devices })
    }

    /// Debug reads and writes take the same resolve-then-dispatch path the
    /// CPU does, side effects included.
    pub fn read_mem(&mut self, addr: u16) -> Result<u8, MachineError> {
        Ok(self.view()?.read_mem(addr))
    }

    pub fn write_mem(&mut self, addr: u16, value: u8) -> Result<(), MachineError> {
        self.view()?.write_mem(addr, value);
        Ok(())
    }

    pub fn read_io(&mut self, addr: u16) -> Result<u8, MachineError> {
        Ok(self.view()?.read_io(addr))
    }

    pub fn write_io(&mut self, addr: u16, value: u8) -> Result<(), MachineError> {
        self.view()?.write_io(addr, value);
        Ok(())
    }

    pub fn memory_dump(&mut self, start: u16, end: u16) -> Result<String, MachineError> {
        let mut view = self.view()?;
        let buffer: Vec<u8> = (start..end).map(|addr| view.read_mem(addr)).collect();
        Ok(hexdump(&buffer, start))
    }

    fn populate_common_claims(bus: &mut Bus) {
        use AddressSpace::{IoRead, IoWrite, MemRead, MemWrite};

        // console ROM, read only
        bus.claim_range(MemRead, 0x0000, 0x2000, 1, DeviceId::Rom, |addr| addr as u16);

        // scratchpad RAM, aliased every 256 bytes across its 1k window
        bus.claim_range(MemRead, 0x8000, 0x8400, 1, DeviceId::Scratchpad, |addr| {
            (addr & 0xFF) as u16
        });
        bus.claim_range(MemWrite, 0x8000, 0x8400, 1, DeviceId::Scratchpad, |addr| {
            (addr & 0xFF) as u16
        });

        // VDP ports: even addresses only, address bit 1 picks data vs control
        bus.claim_range(MemRead, 0x8800, 0x8C00, 2, DeviceId::Vdp, vdp_port_key);
        bus.claim_range(MemWrite, 0x8C00, 0x9000, 2, DeviceId::Vdp, vdp_port_key);

        // GROM ports: bit 1 selects the address register, the write windows
        // carry the write flag on top
        bus.claim_range(MemRead, 0x9800, 0x9C00, 2, DeviceId::Grom, |addr| {
            if addr & 2 != 0 {
                GROM_MODE_ADDRESS
            } else {
                0
            }
        });
        bus.claim_range(MemWrite, 0x9C00, 0xA000, 2, DeviceId::Grom, |addr| {
            if addr & 2 != 0 {
                GROM_MODE_ADDRESS | GROM_MODE_WRITE
            } else {
                GROM_MODE_WRITE
            }
        });

        // keyboard matrix over the CRU; the partial decode repeats the same
        // lines every 20 bits across the whole IO space
        let mut base = 0;
        while base < IO_SIZE {
            for off in 3..=10 {
                if base + off < IO_SIZE {
                    bus.claim(IoRead, base + off, DeviceId::Keyboard, off as u16);
                }
            }
            for off in 18..=21 {
                if base + off < IO_SIZE {
                    bus.claim(IoWrite, base + off, DeviceId::Keyboard, off as u16);
                }
            }
            base += 20;
        }
    }

    fn populate_variant_claims(&self, bus: &mut Bus) {
        match self.variant {
            Variant::Ti994 => {}
            Variant::Ti994a => {
                // re-claim the alpha lock sense line onto the 99/4A keyboard;
                // a no-op over the common set today, but it is the seam where
                // a revision extends the decode (last claim wins)
                let mut base = 0;
                while base < IO_SIZE {
                    if base + (KEY_ALPHA_LOCK as usize) < IO_SIZE {
                        bus.claim(
                            AddressSpace::IoWrite,
                            base + KEY_ALPHA_LOCK as usize,
                            DeviceId::Keyboard,
                            KEY_ALPHA_LOCK,
                        );
                    }
                    base += 20;
                }
            }
        }
    }
}

fn vdp_port_key(addr: usize) -> u16 {
    if addr & 2 != 0 {
        VDP_PORT_CONTROL
    } else {
        VDP_PORT_DATA
    }
}

/// Builder mirroring how a console gets assembled: pick a variant, socket
/// the ROM and GROM images, then build.
#[derive(Default)]
pub struct MachineBuilder {
    variant: Variant,
    rom: Vec<u8>,
    grom: Vec<u8>,
}

impl MachineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variant(&mut self, variant: Variant) -> &mut Self {
        self.variant = variant;
        self
    }

    pub fn rom(&mut self, data: &[u8]) -> &mut Self {
        self.rom = data.to_vec();
        self
    }

    pub fn grom(&mut self, data: &[u8]) -> &mut Self {
        self.grom = data.to_vec();
        self
    }

    pub fn rom_file(&mut self, path: impl AsRef<Path>) -> anyhow::Result<&mut Self> {
        let path = path.as_ref();
        self.rom = std::fs::read(path).with_context(|| format!("reading ROM image {:?}", path))?;
        Ok(self)
    }

    pub fn grom_file(&mut self, path: impl AsRef<Path>) -> anyhow::Result<&mut Self> {
        let path = path.as_ref();
        self.grom =
            std::fs::read(path).with_context(|| format!("reading GROM image {:?}", path))?;
        Ok(self)
    }

    /// Build an Uninitialized machine; call `init` to bring it up.
    pub fn build(&self) -> Machine {
        let mut machine = Machine::new(self.variant);
        machine.rom_image = self.rom.clone();
        machine.grom_image = self.grom.clone();
        machine
    }
}
