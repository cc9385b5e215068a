//! In-memory dictionary storage with per-dictionary capacity accounting.
//!
//! A [`Store`] holds an ordered list of named dictionaries; index 0 is the
//! default a new session binds to. Each dictionary tracks the bytes its
//! entries occupy (key length plus value length) against a fixed capacity.
//! A `set` that would exceed the capacity is refused; there is no eviction
//! and no expiry, matching the constrained backing stores these servers
//! front for.

use std::collections::HashMap;
use tracing::{debug, trace};

/// A single named dictionary.
pub struct Dictionary {
    name: String,
    data: HashMap<Vec<u8>, Vec<u8>>,
    memory_used: usize,
    max_memory: usize,
}

impl Dictionary {
    fn new(name: String, max_memory: usize) -> Self {
        Dictionary {
            name,
            data: HashMap::new(),
            memory_used: 0,
            max_memory,
        }
    }

    fn entry_size(key: &[u8], value: &[u8]) -> usize {
        key.len() + value.len()
    }
}

/// Storage operation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The dictionary cannot fit the entry.
    Full,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Full => write!(f, "storage overflow"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Ordered collection of dictionaries addressed by index.
pub struct Store {
    dicts: Vec<Dictionary>,
}

impl Store {
    /// Create a store with a single dictionary named `main`.
    pub fn new(max_memory: usize) -> Self {
        Store::with_dictionaries(vec![("main".to_string(), max_memory)])
    }

    /// Create a store from `(name, capacity)` pairs; the first entry is the
    /// default dictionary.
    pub fn with_dictionaries(specs: Vec<(String, usize)>) -> Self {
        debug_assert!(!specs.is_empty(), "a store needs at least one dictionary");
        let dicts = specs
            .into_iter()
            .map(|(name, max_memory)| {
                debug!(dictionary = %name, max_memory, "Initializing dictionary");
                Dictionary::new(name, max_memory)
            })
            .collect();
        Store { dicts }
    }

    /// Resolve a dictionary name to its index, ASCII case-insensitively.
    pub fn find(&self, name: &[u8]) -> Option<usize> {
        self.dicts
            .iter()
            .position(|dict| dict.name.as_bytes().eq_ignore_ascii_case(name))
    }

    /// Name of the dictionary at `dict`.
    pub fn name(&self, dict: usize) -> &str {
        &self.dicts[dict].name
    }

    /// Look up a key in the given dictionary.
    pub fn get(&self, dict: usize, key: &[u8]) -> Option<&[u8]> {
        self.dicts[dict].data.get(key).map(Vec::as_slice)
    }

    /// Insert or replace a key. Replacing releases the old entry's
    /// accounting first; on refusal the old entry is untouched.
    pub fn set(&mut self, dict: usize, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let d = &mut self.dicts[dict];
        let new_size = Dictionary::entry_size(key, value);
        let old_size = d
            .data
            .get(key)
            .map(|old| Dictionary::entry_size(key, old))
            .unwrap_or(0);

        if d.memory_used - old_size + new_size > d.max_memory {
            debug!(
                dictionary = %d.name,
                key = %String::from_utf8_lossy(key),
                needed = new_size,
                available = d.max_memory - d.memory_used + old_size,
                "Refusing set: dictionary full"
            );
            return Err(StoreError::Full);
        }

        d.data.insert(key.to_vec(), value.to_vec());
        d.memory_used = d.memory_used - old_size + new_size;
        trace!(
            dictionary = %d.name,
            key = %String::from_utf8_lossy(key),
            memory_used = d.memory_used,
            "Entry stored"
        );
        Ok(())
    }

    /// Remove a key; returns whether it existed.
    pub fn del(&mut self, dict: usize, key: &[u8]) -> bool {
        let d = &mut self.dicts[dict];
        if let Some(value) = d.data.remove(key) {
            d.memory_used -= Dictionary::entry_size(key, &value);
            trace!(
                dictionary = %d.name,
                key = %String::from_utf8_lossy(key),
                memory_used = d.memory_used,
                "Entry deleted"
            );
            true
        } else {
            false
        }
    }

    /// Keys of the given dictionary, in no particular order.
    pub fn keys(&self, dict: usize) -> impl Iterator<Item = &[u8]> {
        self.dicts[dict].data.keys().map(Vec::as_slice)
    }

    /// Per-dictionary usage snapshot.
    pub fn stats(&self, dict: usize) -> StoreStats {
        let d = &self.dicts[dict];
        StoreStats {
            entry_count: d.data.len(),
            memory_used: d.memory_used,
            max_memory: d.max_memory,
        }
    }
}

/// Usage snapshot for one dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub entry_count: usize,
    pub memory_used: usize,
    pub max_memory: usize,
}
