use ti994::{
    bus::IO_SIZE, get_machine, AddressSpace, DataKey, DeviceId, IndirectKey, Machine,
    MachineBuilder, MachineError, Variant,
};
use tracing_subscriber::fmt;

#[cfg(test)]
#[ctor::ctor]
fn init() {
    let fmt_subscriber = fmt::Subscriber::builder()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(fmt_subscriber)
        .expect("Unable to set global tracing subscriber");
}

// ROM image with a reset vector: WP = 0x83E0, PC = 0x0024.
fn test_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x2000];
    rom[0] = 0x83;
    rom[1] = 0xE0;
    rom[2] = 0x00;
    rom[3] = 0x24;
    rom
}

fn active_machine(variant: Variant) -> Machine {
    let mut machine = get_machine(variant, &test_rom(), &[0x10, 0x20, 0x30]);
    machine.init().unwrap();
    machine
}

#[test]
fn test_rom_is_mapped_read_only() {
    let machine = active_machine(Variant::Ti994);
    let bus = machine.bus().unwrap();
    for addr in [0x0000, 0x0001, 0x1FFF] {
        assert_eq!(
            bus.resolve(AddressSpace::MemRead, addr),
            Some((DeviceId::Rom, addr as u16))
        );
        assert_eq!(bus.resolve(AddressSpace::MemWrite, addr), None);
    }
    assert_eq!(bus.resolve(AddressSpace::MemRead, 0x2000), None);
}

#[test]
fn test_rom_write_is_dropped() {
    let mut machine = active_machine(Variant::Ti994);
    machine.write_mem(0x0000, 0x00).unwrap();
    assert_eq!(machine.read_mem(0x0000).unwrap(), 0x83);
}

#[test]
fn test_unmapped_memory_reads_open_bus() {
    let mut machine = active_machine(Variant::Ti994);
    assert_eq!(machine.read_mem(0x4000).unwrap(), 0xFF);
    machine.write_mem(0x4000, 0x12).unwrap();
    assert_eq!(machine.read_mem(0x4000).unwrap(), 0xFF);
}

#[test]
fn test_scratchpad_aliases_every_256_bytes() {
    let mut machine = active_machine(Variant::Ti994);
    {
        let bus = machine.bus().unwrap();
        assert_eq!(
            bus.resolve(AddressSpace::MemRead, 0x8000),
            Some((DeviceId::Scratchpad, 0x00))
        );
        assert_eq!(
            bus.resolve(AddressSpace::MemRead, 0x8100),
            Some((DeviceId::Scratchpad, 0x00))
        );
        assert_eq!(
            bus.resolve(AddressSpace::MemWrite, 0x83FF),
            Some((DeviceId::Scratchpad, 0xFF))
        );
    }
    machine.write_mem(0x8000, 0x42).unwrap();
    assert_eq!(machine.read_mem(0x8100).unwrap(), 0x42);
    assert_eq!(machine.read_mem(0x8300).unwrap(), 0x42);
}

#[test]
fn test_keyboard_cru_decode_repeats_every_20_bits() {
    let machine = active_machine(Variant::Ti994);
    let bus = machine.bus().unwrap();
    let mut base = 0;
    while base < IO_SIZE {
        for off in 18..=21 {
            if base + off < IO_SIZE {
                assert_eq!(
                    bus.resolve(AddressSpace::IoWrite, base + off),
                    Some((DeviceId::Keyboard, off as u16)),
                    "write decode at base {:#05X} offset {}",
                    base,
                    off
                );
            }
        }
        for off in 3..=10 {
            if base + off < IO_SIZE {
                assert_eq!(
                    bus.resolve(AddressSpace::IoRead, base + off),
                    Some((DeviceId::Keyboard, off as u16))
                );
            }
        }
        // offsets 20 and 21 wrap into the next stride's 0 and 1, so the
        // true write-decode gap in each stride is 2..=17
        assert_eq!(bus.resolve(AddressSpace::IoWrite, base + 2), None);
        assert_eq!(bus.resolve(AddressSpace::IoWrite, base + 17), None);
        base += 20;
    }
}

#[test]
fn test_keyboard_scan_through_the_bus() {
    let mut machine = active_machine(Variant::Ti994a);
    machine.key_down("a"); // column 5, row 5
    for bit in 0..3u16 {
        machine.write_io(18 + bit, (5 >> bit) & 1).unwrap();
    }
    assert_eq!(machine.read_io(3 + 5).unwrap(), 0);
    assert_eq!(machine.read_io(3 + 4).unwrap(), 1);
    machine.key_up("a");
    assert_eq!(machine.read_io(3 + 5).unwrap(), 1);
}

#[test]
fn test_unmapped_cru_reads_high() {
    let mut machine = active_machine(Variant::Ti994);
    assert_eq!(machine.read_io(0).unwrap(), 1);
}

#[test]
fn test_vdp_vram_via_ports() {
    let mut machine = active_machine(Variant::Ti994);
    // write setup to VRAM 0x0000 on the control port, then two data bytes
    machine.write_mem(0x8C02, 0x00).unwrap();
    machine.write_mem(0x8C02, 0x40).unwrap();
    machine.write_mem(0x8C00, 0xAA).unwrap();
    machine.write_mem(0x8C00, 0xBB).unwrap();
    // read setup, then read back through the read window
    machine.write_mem(0x8C02, 0x00).unwrap();
    machine.write_mem(0x8C02, 0x00).unwrap();
    assert_eq!(machine.read_mem(0x8800).unwrap(), 0xAA);
    assert_eq!(machine.read_mem(0x8800).unwrap(), 0xBB);
}

#[test]
fn test_grom_readout_via_ports() {
    let mut machine = active_machine(Variant::Ti994);
    // set the GROM address to zero, high byte first
    machine.write_mem(0x9C02, 0x00).unwrap();
    machine.write_mem(0x9C02, 0x00).unwrap();
    assert_eq!(machine.read_mem(0x9800).unwrap(), 0x10);
    assert_eq!(machine.read_mem(0x9800).unwrap(), 0x20);
    assert_eq!(machine.read_mem(0x9800).unwrap(), 0x30);
}

#[test]
fn test_tick_advances_timestamp_additively() {
    let mut machine = active_machine(Variant::Ti994);
    assert_eq!(machine.current_timestamp(), 0);
    machine.tick(100).unwrap();
    assert_eq!(machine.current_timestamp(), 100);
    machine.tick(250).unwrap();
    assert_eq!(machine.current_timestamp(), 350);

    let mut other = active_machine(Variant::Ti994);
    other.tick(350).unwrap();
    assert_eq!(other.current_timestamp(), machine.current_timestamp());
}

#[test]
fn test_tick_rejects_zero_quantum() {
    let mut machine = active_machine(Variant::Ti994);
    assert!(matches!(machine.tick(0), Err(MachineError::ZeroQuantum)));
    assert_eq!(machine.current_timestamp(), 0);
}

#[test]
fn test_lifecycle_contract_violations() {
    let mut machine = get_machine(Variant::Ti994, &test_rom(), &[]);
    assert!(matches!(machine.tick(10), Err(MachineError::NotInitialized)));
    assert!(matches!(machine.deinit(), Err(MachineError::NotInitialized)));
    machine.init().unwrap();
    assert!(matches!(
        machine.init(),
        Err(MachineError::AlreadyInitialized)
    ));
}

#[test]
fn test_interrupt_line_follows_vdp_frame_flag() {
    let mut machine = active_machine(Variant::Ti994);
    // enable VDP interrupts through R1 on the control port
    machine.write_mem(0x8C02, 0x20).unwrap();
    machine.write_mem(0x8C02, 0x81).unwrap();

    machine.tick(1000).unwrap();
    assert!(!machine.interrupt_asserted());

    // cross one NTSC field boundary
    machine.tick(17_000).unwrap();
    assert!(machine.interrupt_asserted());

    // stays asserted until the status read clears the frame flag
    machine.tick(10).unwrap();
    assert!(machine.interrupt_asserted());
    let status = machine.read_mem(0x8802).unwrap();
    assert_ne!(status & 0x80, 0);
    machine.tick(10).unwrap();
    assert!(!machine.interrupt_asserted());
}

#[test]
fn test_cpu_probes_reset_vector_on_init() {
    let machine = active_machine(Variant::Ti994);
    let cpu = machine.cpu().unwrap();
    assert_eq!(cpu.wp, 0x83E0);
    assert_eq!(cpu.pc, 0x0024);
}

#[test]
fn test_interesting_data_tracks_the_cpu() {
    let mut machine = active_machine(Variant::Ti994);
    assert_eq!(
        machine.interesting.get_indirect(IndirectKey::MainCpuPc),
        Some(0x0024)
    );
    assert_eq!(
        machine.interesting.get(DataKey::Tms9900InterruptsEnabled),
        Some(0)
    );
    machine.tick(100).unwrap();
    assert_eq!(
        machine.interesting.get_indirect(IndirectKey::MainCpuPc),
        Some(0x0024)
    );
}

#[test]
fn test_reinit_rebuilds_an_equivalent_claim_set() {
    let mut machine = active_machine(Variant::Ti994);
    machine.write_mem(0x8000, 0x55).unwrap();
    machine.tick(500).unwrap();

    machine.deinit().unwrap();
    assert!(!machine.is_active());
    assert_eq!(machine.interesting.get(DataKey::Tms9900Pc), None);

    machine.init().unwrap();
    let bus = machine.bus().unwrap();
    assert_eq!(
        bus.resolve(AddressSpace::MemRead, 0x0000),
        Some((DeviceId::Rom, 0x0000))
    );
    assert_eq!(
        bus.resolve(AddressSpace::MemRead, 0x8100),
        Some((DeviceId::Scratchpad, 0x00))
    );
    // timestamp only resets on a full re-init
    assert_eq!(machine.current_timestamp(), 0);
    // devices were rebuilt, not carried over
    assert_eq!(machine.read_mem(0x8000).unwrap(), 0x00);
}

#[test]
fn test_variant_overrides_keyboard_and_grom_but_not_rom() {
    let mut base = MachineBuilder::new();
    base.variant(Variant::Ti994).rom(&test_rom()).grom(&[0x10]);
    let mut base = base.build();
    base.init().unwrap();

    let mut revised = MachineBuilder::new();
    revised
        .variant(Variant::Ti994a)
        .rom(&test_rom())
        .grom(&[0x99]);
    let mut revised = revised.build();
    revised.init().unwrap();

    // program ROM claims are identical across variants
    for addr in [0x0000, 0x1FFF] {
        assert_eq!(
            base.bus().unwrap().resolve(AddressSpace::MemRead, addr),
            revised.bus().unwrap().resolve(AddressSpace::MemRead, addr)
        );
    }

    // GROM ports resolve to the variant's own device contents
    for machine in [&mut base, &mut revised] {
        machine.write_mem(0x9C02, 0x00).unwrap();
        machine.write_mem(0x9C02, 0x00).unwrap();
    }
    assert_eq!(base.read_mem(0x9800).unwrap(), 0x10);
    assert_eq!(revised.read_mem(0x9800).unwrap(), 0x99);

    // only the 99/4A keyboard latches the alpha lock line
    base.write_io(21, 0).unwrap();
    revised.write_io(21, 0).unwrap();
    assert!(!base.devices().unwrap().keyboard.alpha_lock());
    assert!(revised.devices().unwrap().keyboard.alpha_lock());
}

#[test]
fn test_reset_clears_devices_and_reprobes_the_vector() {
    let mut machine = active_machine(Variant::Ti994);
    machine.write_mem(0x8000, 0x55).unwrap();
    machine.reset().unwrap();
    assert_eq!(machine.read_mem(0x8000).unwrap(), 0x00);
    assert_eq!(machine.cpu().unwrap().pc, 0x0024);
}

#[test]
fn test_memory_dump() {
    let mut machine = active_machine(Variant::Ti994);
    let dump = machine.memory_dump(0x0000, 0x0010).unwrap();
    assert!(dump.starts_with("0000: 83 e0 00 24"));
}
