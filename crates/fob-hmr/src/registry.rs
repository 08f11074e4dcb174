//! Port-keyed registries of running servers and update channels.
//!
//! A registry entry is the only record of "something is running on this
//! port". The reporter never caches that fact elsewhere.

use rustc_hash::FxHashMap;

/// Instances keyed by the network port they are bound to.
#[derive(Debug)]
pub struct Registry<T> {
    entries: FxHashMap<u16, T>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    /// Absent means "not running", not an error.
    pub fn get(&self, port: u16) -> Option<&T> {
        self.entries.get(&port)
    }

    /// Register an instance, returning whatever was there before.
    pub fn insert(&mut self, port: u16, instance: T) -> Option<T> {
        self.entries.insert(port, instance)
    }

    pub fn remove(&mut self, port: u16) -> Option<T> {
        self.entries.remove(&port)
    }

    pub fn contains(&self, port: u16) -> bool {
        self.entries.contains_key(&port)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered ports in ascending order.
    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.entries.keys().copied().collect();
        ports.sort_unstable();
        ports
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
