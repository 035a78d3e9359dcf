//! In-memory byte store used by tests.
//!
//! Locks are unwrapped: a poisoned lock means a writer panicked mid-insert, and the
//! store is not usable after that.

use eoflow_core::error::{EoflowError, Result};
use eoflow_core::ports::ByteStore;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

/// In-memory implementation of ByteStore. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    dirs: Arc<RwLock<BTreeSet<String>>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths of all blobs under a prefix, sorted
    pub fn list(&self, prefix: &str) -> Vec<String> {
        let blobs = self.blobs.read().unwrap();
        blobs.keys().filter(|k| k.starts_with(prefix)).cloned().collect()
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn normalize(path: &str) -> String {
        path.trim_end_matches('/').to_string()
    }
}

impl ByteStore for MemoryStore {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let blobs = self.blobs.read().unwrap();
        blobs.get(&Self::normalize(path)).cloned().ok_or_else(|| EoflowError::Storage {
            path: path.to_string(),
            reason: "no such blob".to_string(),
        })
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let mut blobs = self.blobs.write().unwrap();
        blobs.insert(Self::normalize(path), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let key = Self::normalize(path);
        if self.blobs.read().unwrap().contains_key(&key) {
            return Ok(true);
        }
        Ok(self.dirs.read().unwrap().contains(&key))
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        let mut dirs = self.dirs.write().unwrap();
        dirs.insert(Self::normalize(path));
        Ok(())
    }
}
