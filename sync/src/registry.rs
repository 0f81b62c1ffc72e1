//! Keyed ownership of live visual handles.
//!
//! One generic container serves every category. The registry is the single
//! record of what currently exists in the scene; the host never decides that.

use crate::error::RegistryError;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

/// Maps a stable entity key to the handle of the visual it owns.
#[derive(Debug, Clone)]
pub struct EntityRegistry<K, H> {
    entries: HashMap<K, H>,
}

impl<K, H> Default for EntityRegistry<K, H> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, H> EntityRegistry<K, H>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<&H> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Record a freshly created visual. An occupied key is an invariant breach.
    pub fn insert(&mut self, key: K, handle: H) -> Result<(), RegistryError> {
        if self.entries.contains_key(&key) {
            return Err(RegistryError::KeyOccupied(format!("{key:?}")));
        }
        self.entries.insert(key, handle);
        Ok(())
    }

    /// Drain every handle for the caller to destroy.
    pub fn remove_all(&mut self) -> Vec<H> {
        self.entries.drain().map(|(_, handle)| handle).collect()
    }

    /// Evict and return handles whose key is absent from `seen`.
    ///
    /// Linear in registry size: one scan with O(1) membership checks.
    pub fn remove_missing(&mut self, seen: &HashSet<K>) -> Vec<H> {
        let stale: Vec<K> = self
            .entries
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();
        stale
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &H)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
