//! Flat key/value persistence for user-tunable settings.
//!
//! The bridge persists the selected codec id and transmission duration per
//! controller, and the minimum brightness per light. Keys are FNV-1 hashes
//! of the owning entity name; hosts plug in a durable store, tests and
//! simple setups use the in-memory one.

use std::collections::HashMap;

pub trait ConfigStore {
    fn load_str(&self, key: u32) -> Option<String>;
    fn save_str(&mut self, key: u32, value: &str);
    fn load_f32(&self, key: u32) -> Option<f32>;
    fn save_f32(&mut self, key: u32, value: f32);
}

#[derive(Default)]
pub struct MemoryStore {
    strings: HashMap<u32, String>,
    floats: HashMap<u32, f32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn load_str(&self, key: u32) -> Option<String> {
        self.strings.get(&key).cloned()
    }

    fn save_str(&mut self, key: u32, value: &str) {
        self.strings.insert(key, value.to_owned());
    }

    fn load_f32(&self, key: u32) -> Option<f32> {
        self.floats.get(&key).copied()
    }

    fn save_f32(&mut self, key: u32, value: f32) {
        self.floats.insert(key, value);
    }
}
