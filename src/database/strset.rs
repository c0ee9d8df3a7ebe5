// =============================================================================
// Matrixon Character Profiles - Strset Module
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
//   A named set of strings stored as one sorted JSON array under a single key.
//   Mutations are optimistic read-modify-write cycles on compare-and-swap.
//
// Features:
//   • Binary search membership
//   • Bounded retry with exponential backoff on lost races
//   • Conflict error once the retry budget is exhausted
//
// =============================================================================

use std::thread;
use std::time::Instant;

use matrixon_characters_core::CasConfig;
use tracing::{debug, instrument, warn};

use super::KvStore;
use crate::{Error, Result};

/// Sorted string set at a single key
///
/// The stored value is a JSON array of strings in ascending order. An absent
/// key is the empty set.
#[derive(Clone, Copy)]
pub struct Strset<'a> {
    kv: &'a dyn KvStore,
    cas: &'a CasConfig,
}

#[derive(Clone, Copy, Debug)]
enum Mutation {
    Insert,
    Remove,
}

impl<'a> Strset<'a> {
    pub fn new(kv: &'a dyn KvStore, cas: &'a CasConfig) -> Self {
        Self { kv, cas }
    }

    /// Elements of the set at `key`, sorted ascending
    pub fn get(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.read(key)?.0)
    }

    pub fn has(&self, key: &str, element: &str) -> Result<bool> {
        let (contents, _) = self.read(key)?;
        Ok(position(&contents, element).is_ok())
    }

    /// Adds `element`; a no-op when it is already present
    #[instrument(level = "debug", skip(self))]
    pub fn insert(&self, key: &str, element: &str) -> Result<()> {
        self.mutate(key, element, Mutation::Insert)
    }

    /// Removes `element`; a no-op when it is absent
    #[instrument(level = "debug", skip(self))]
    pub fn remove(&self, key: &str, element: &str) -> Result<()> {
        self.mutate(key, element, Mutation::Remove)
    }

    fn read(&self, key: &str) -> Result<(Vec<String>, Option<Vec<u8>>)> {
        let Some(raw) = self.kv.get(key)? else {
            return Ok((Vec::new(), None));
        };
        let contents: Vec<String> = serde_json::from_slice(&raw).map_err(|e| {
            Error::Serialization(format!("string set `{key}` is not a JSON string array: {e}"))
        })?;
        Ok((contents, Some(raw)))
    }

    fn mutate(&self, key: &str, element: &str, mutation: Mutation) -> Result<()> {
        let start = Instant::now();
        let attempts = self.cas.attempts();
        let mut backoff = self.cas.initial_backoff();

        for attempt in 1..=attempts {
            let (mut contents, previous) = self.read(key)?;
            let changed = match (mutation, position(&contents, element)) {
                (Mutation::Insert, Err(index)) => {
                    contents.insert(index, element.to_owned());
                    true
                }
                (Mutation::Remove, Ok(index)) => {
                    contents.remove(index);
                    true
                }
                _ => false,
            };
            if !changed {
                return Ok(());
            }

            let encoded = serde_json::to_vec(&contents)?;
            if self.kv.compare_and_swap(key, previous.as_deref(), &encoded)? {
                debug!(
                    "✅ {:?} `{}` in string set `{}` after {} attempt(s) in {:?}",
                    mutation,
                    element,
                    key,
                    attempt,
                    start.elapsed()
                );
                return Ok(());
            }

            metrics::counter!("characters_strset_cas_conflicts_total").increment(1);
            warn!(
                "⚠️ Lost compare-and-swap race on string set `{}` (attempt {}/{})",
                key, attempt, attempts
            );
            if attempt < attempts {
                thread::sleep(backoff);
                backoff = (backoff * 2).min(self.cas.max_backoff());
            }
        }

        Err(Error::Conflict {
            key: key.to_owned(),
            attempts,
        })
    }
}

fn position(contents: &[String], element: &str) -> std::result::Result<usize, usize> {
    contents.binary_search_by(|probe| probe.as_str().cmp(element))
}
