use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Concrete data a device publishes for external introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKey {
    Tms9900Pc,
    Tms9900InterruptsEnabled,
}

/// Stable logical roles a debugger asks about, independent of which concrete
/// device currently fills them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndirectKey {
    MainCpuPc,
    MainCpuInterruptsEnabled,
}

/// Per-machine introspection registry. Scoped to one machine instance and
/// rebuilt on every init, so two machines under test never interfere and a
/// variant swap can never leave a stale association behind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterestingData {
    values: HashMap<DataKey, u32>,
    indirect: HashMap<IndirectKey, DataKey>,
}

impl InterestingData {
    pub fn set(&mut self, key: DataKey, value: u32) {
        self.values.insert(key, value);
    }

    pub fn get(&self, key: DataKey) -> Option<u32> {
        self.values.get(&key).copied()
    }

    /// Associate a logical role with the concrete data key that currently
    /// backs it.
    pub fn set_indirect(&mut self, key: IndirectKey, target: DataKey) {
        self.indirect.insert(key, target);
    }

    pub fn get_indirect(&self, key: IndirectKey) -> Option<u32> {
        self.indirect.get(&key).and_then(|target| self.get(*target))
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.indirect.clear();
    }
}
