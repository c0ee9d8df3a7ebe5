// =============================================================================
// Matrixon Character Profiles - Memory KV Module
// =============================================================================
//
// Project: Matrixon - Character Profiles
// Author: arkSong (arksong2018@gmail.com) - Founder of Matrixon Innovation Project
// Contributors: Matrixon Development Team
// Date: 2024-12-11
// Version: 0.11.0-alpha
// License: Apache 2.0 / MIT
//
// Description:
//   In-process key-value engine backing the in-memory host, the CLI snapshot
//   and the tests.
//
// Features:
//   • BTreeMap storage for ordered key listing
//   • Atomic compare-and-swap under a write lock
//   • Snapshot export and import
//
// =============================================================================

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::KvStore;
use crate::{Error, Result};

/// Key-value store held in memory
#[derive(Debug, Default)]
pub struct MemoryKv {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(data: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Copy of every entry, for persisting
    pub fn snapshot(&self) -> Result<BTreeMap<String, Vec<u8>>> {
        Ok(self.read()?.clone())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.data
            .read()
            .map_err(|_| Error::Database("memory store lock poisoned".to_owned()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.data
            .write()
            .map_err(|_| Error::Database("memory store lock poisoned".to_owned()))
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.write()?.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.write()?.remove(key);
        Ok(())
    }

    fn compare_and_swap(&self, key: &str, expected: Option<&[u8]>, new: &[u8]) -> Result<bool> {
        let mut data = self.write()?;
        if data.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        data.insert(key.to_owned(), new.to_vec());
        Ok(true)
    }

    fn list_keys(&self, page: usize, per_page: usize) -> Result<Vec<String>> {
        Ok(self
            .read()?
            .keys()
            .skip(page.saturating_mul(per_page))
            .take(per_page)
            .cloned()
            .collect())
    }
}
