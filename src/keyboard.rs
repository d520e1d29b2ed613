use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::device::{DeviceError, Peripheral};

/// First CRU key that reads a matrix row.
pub const KEY_ROW_BASE: u16 = 3;
/// CRU keys 18..=20 drive the three column-select lines.
pub const KEY_COLUMN_BASE: u16 = 18;
/// CRU key for the alpha-lock sense line (99/4A keyboards only).
pub const KEY_ALPHA_LOCK: u16 = 21;

/// Which physical keyboard is wired in. The 99/4 shipped a 41-key chiclet
/// board; the 99/4A added full alpha keys and the alpha-lock line. Variant
/// differences are data (a mapping table and one extra line), not types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyboardLayout {
    Ti994,
    Ti994a,
}

#[derive(Debug, Clone, Copy)]
struct Mapping {
    name: &'static str,
    column: u8,
    row: u8,
}

const fn m(name: &'static str, column: u8, row: u8) -> Mapping {
    Mapping { name, column, row }
}

// Exact scan tables are outside this crate's scope; these cover the keys the
// console ROMs poll during startup and typing.
const TI994A_MAPPINGS: &[Mapping] = &[
    m("=", 0, 0),
    m(" ", 0, 1),
    m("Enter", 0, 2),
    m("Fctn", 0, 4),
    m("Shift", 0, 5),
    m("Ctrl", 0, 6),
    m(".", 1, 0),
    m("l", 1, 1),
    m("o", 1, 2),
    m("9", 1, 3),
    m("2", 1, 4),
    m("s", 1, 5),
    m("w", 1, 6),
    m("x", 1, 7),
    m(",", 2, 0),
    m("k", 2, 1),
    m("i", 2, 2),
    m("8", 2, 3),
    m("3", 2, 4),
    m("d", 2, 5),
    m("e", 2, 6),
    m("c", 2, 7),
    m("m", 3, 0),
    m("j", 3, 1),
    m("u", 3, 2),
    m("7", 3, 3),
    m("4", 3, 4),
    m("f", 3, 5),
    m("r", 3, 6),
    m("v", 3, 7),
    m("n", 4, 0),
    m("h", 4, 1),
    m("y", 4, 2),
    m("6", 4, 3),
    m("5", 4, 4),
    m("g", 4, 5),
    m("t", 4, 6),
    m("b", 4, 7),
    m("/", 5, 0),
    m(";", 5, 1),
    m("p", 5, 2),
    m("0", 5, 3),
    m("1", 5, 4),
    m("a", 5, 5),
    m("q", 5, 6),
    m("z", 5, 7),
];

// The 99/4 board has no Fctn/Ctrl and moves the space bar.
const TI994_MAPPINGS: &[Mapping] = &[
    m("=", 0, 0),
    m("Enter", 0, 2),
    m("Shift", 0, 5),
    m(" ", 5, 0),
    m(".", 1, 0),
    m("l", 1, 1),
    m("o", 1, 2),
    m("9", 1, 3),
    m("2", 1, 4),
    m("s", 1, 5),
    m("w", 1, 6),
    m("x", 1, 7),
    m(",", 2, 0),
    m("k", 2, 1),
    m("i", 2, 2),
    m("8", 2, 3),
    m("3", 2, 4),
    m("d", 2, 5),
    m("e", 2, 6),
    m("c", 2, 7),
    m("m", 3, 0),
    m("j", 3, 1),
    m("u", 3, 2),
    m("7", 3, 3),
    m("4", 3, 4),
    m("f", 3, 5),
    m("r", 3, 6),
    m("v", 3, 7),
    m("n", 4, 0),
    m("h", 4, 1),
    m("y", 4, 2),
    m("6", 4, 3),
    m("5", 4, 4),
    m("g", 4, 5),
    m("t", 4, 6),
    m("b", 4, 7),
    m(";", 5, 1),
    m("p", 5, 2),
    m("0", 5, 3),
    m("1", 5, 4),
    m("a", 5, 5),
    m("q", 5, 6),
    m("z", 5, 7),
];

fn layout_mappings(layout: KeyboardLayout) -> &'static [Mapping] {
    match layout {
        KeyboardLayout::Ti994 => TI994_MAPPINGS,
        KeyboardLayout::Ti994a => TI994A_MAPPINGS,
    }
}

/// Keyboard matrix controller. The CPU scans it over the CRU: it writes the
/// three column-select lines, then reads the eight row lines of the selected
/// column. Everything is active low.
#[derive(Debug, Clone)]
pub struct MatrixKeyboard {
    layout: KeyboardLayout,
    pressed: HashSet<(u8, u8)>,
    column: u8,
    alpha_lock: bool,
}

impl MatrixKeyboard {
    pub fn new(layout: KeyboardLayout) -> Self {
        Self {
            layout,
            pressed: HashSet::new(),
            column: 0,
            alpha_lock: false,
        }
    }

    pub fn layout(&self) -> KeyboardLayout {
        self.layout
    }

    pub fn alpha_lock(&self) -> bool {
        self.alpha_lock
    }

    pub fn key_down(&mut self, name: &str) {
        if let Some(mapping) = layout_mappings(self.layout)
            .iter()
            .find(|mapping| mapping.name == name)
        {
            self.pressed.insert((mapping.column, mapping.row));
        } else {
            tracing::trace!("[KEY] no mapping for {:?}", name);
        }
    }

    pub fn key_up(&mut self, name: &str) {
        if let Some(mapping) = layout_mappings(self.layout)
            .iter()
            .find(|mapping| mapping.name == name)
        {
            self.pressed.remove(&(mapping.column, mapping.row));
        }
    }
}

impl Peripheral for MatrixKeyboard {
    fn init(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn reset(&mut self) {
        self.pressed.clear();
        self.column = 0;
        self.alpha_lock = false;
    }

    fn read(&mut self, key: u16) -> u8 {
        let row = match key.checked_sub(KEY_ROW_BASE) {
            Some(row) if row < 8 => row as u8,
            _ => {
                tracing::trace!("[KEY] read of unwired line {}", key);
                return 1;
            }
        };
        if self.pressed.contains(&(self.column, row)) {
            0
        } else {
            1
        }
    }

    fn write(&mut self, key: u16, value: u8) {
        match key {
            18..=20 => {
                let bit = (key - KEY_COLUMN_BASE) as u8;
                if value & 1 != 0 {
                    self.column |= 1 << bit;
                } else {
                    self.column &= !(1 << bit);
                }
            }
            KEY_ALPHA_LOCK => {
                if self.layout == KeyboardLayout::Ti994a {
                    self.alpha_lock = value & 1 == 0;
                } else {
                    tracing::trace!("[KEY] alpha lock line not wired on this keyboard");
                }
            }
            _ => tracing::trace!("[KEY] write to unwired line {} = {:02X}", key, value),
        }
    }
}
