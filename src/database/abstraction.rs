// =============================================================================
// Matrixon Character Profiles - Abstraction Module
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
//   Key-value store contract required from the chat host. Only per-key
//   atomicity is assumed; every multi-key structure is built on
//   compare-and-swap.
//
// Features:
//   • Scalar get/set/delete
//   • Compare-and-swap against an expected previous value
//   • Paginated key enumeration
//
// =============================================================================

use crate::Result;

pub mod memory;

pub trait KvStore: Send + Sync {
    /// Retrieves the value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns a `Database` error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `key`, unconditionally
    ///
    /// # Errors
    ///
    /// Returns a `Database` error if the write fails.
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns a `Database` error if the write fails.
    fn delete(&self, key: &str) -> Result<()>;

    /// Writes `new` only if the current value equals `expected`, where
    /// `None` means the key must be absent. Returns whether the write
    /// happened.
    ///
    /// # Errors
    ///
    /// Returns a `Database` error if the backend fails. Losing the race is
    /// not an error.
    fn compare_and_swap(&self, key: &str, expected: Option<&[u8]>, new: &[u8]) -> Result<bool>;

    /// Returns one page of keys in ascending order
    ///
    /// # Errors
    ///
    /// Returns a `Database` error if the enumeration fails.
    fn list_keys(&self, page: usize, per_page: usize) -> Result<Vec<String>>;

    /// Collects every key starting with `prefix`, walking pages until a short
    /// page is returned.
    fn keys_with_prefix(&self, prefix: &str, per_page: usize) -> Result<Vec<String>> {
        let per_page = per_page.max(1);
        let mut keys = Vec::new();
        for page in 0.. {
            let batch = self.list_keys(page, per_page)?;
            let last_page = batch.len() < per_page;
            keys.extend(batch.into_iter().filter(|key| key.starts_with(prefix)));
            if last_page {
                break;
            }
        }
        Ok(keys)
    }
}
