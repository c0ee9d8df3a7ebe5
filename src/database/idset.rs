// =============================================================================
// Matrixon Character Profiles - Idset Module
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
//   Scalable set of 26-character host ids, sharded by two-character prefix
//   over string sets so no single stored value grows unbounded.
//
// Features:
//   • Prefix index at idp_<key>, shards at id_<key>_<pp>
//   • Ordered, resumable iteration with a limit
//   • Early termination through the visitor's error
//
// =============================================================================

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use super::Strset;
use crate::{Error, Result};

static ID_FORMAT: Lazy<Regex> = Lazy::new(|| Regex::new("^[a-z0-9]{26}$").expect("valid regex"));

const PREFIX_LEN: usize = 2;

/// Set of host ids sharded by prefix
///
/// Layout for logical key `K`: a string set at `idp_K` listing the
/// two-character prefixes in use, and for each prefix `pp` a string set at
/// `id_K_pp` with the member ids.
///
/// The prefix index is a superset of the populated shards. Inserts record
/// the prefix before the id, and removals never shrink the index, so a
/// prefix can be stale (empty shard) but never missing.
#[derive(Clone, Copy)]
pub struct Idset<'a> {
    sets: Strset<'a>,
}

impl<'a> Idset<'a> {
    pub fn new(sets: Strset<'a>) -> Self {
        Self { sets }
    }

    #[instrument(level = "debug", skip(self))]
    pub fn insert(&self, key: &str, id: &str) -> Result<()> {
        let prefix = checked_prefix(id)?;
        self.sets.insert(&prefix_index_key(key), prefix)?;
        self.sets.insert(&shard_key(key, prefix), id)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn remove(&self, key: &str, id: &str) -> Result<()> {
        let prefix = checked_prefix(id)?;
        self.sets.remove(&shard_key(key, prefix), id)
    }

    pub fn has(&self, key: &str, id: &str) -> Result<bool> {
        let prefix = checked_prefix(id)?;
        self.sets.has(&shard_key(key, prefix), id)
    }

    /// Visits members in ascending order, starting strictly after
    /// `begin_after` (empty for the beginning) and stopping after
    /// `max_count` visits (0 for no limit). An error returned by `visit`
    /// stops the iteration and is returned as is.
    pub fn iterate<F>(&self, key: &str, begin_after: &str, max_count: usize, mut visit: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>,
    {
        let first_prefix = if begin_after.is_empty() {
            ""
        } else {
            checked_prefix(begin_after)?
        };
        let mut remaining = max_count;

        for prefix in self.sets.get(&prefix_index_key(key))? {
            if prefix.as_str() < first_prefix {
                continue;
            }
            for id in self.sets.get(&shard_key(key, &prefix))? {
                if id.as_str() <= begin_after {
                    continue;
                }
                visit(&id)?;
                if max_count > 0 {
                    remaining -= 1;
                    if remaining == 0 {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

    /// Every member, in ascending order
    pub fn get(&self, key: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        self.iterate(key, "", 0, |id| {
            ids.push(id.to_owned());
            Ok(())
        })?;
        debug!("📋 Id set `{}` holds {} member(s)", key, ids.len());
        Ok(ids)
    }
}

/// True for a 26-character lowercase alphanumeric host id
pub fn is_valid_id(id: &str) -> bool {
    ID_FORMAT.is_match(id)
}

fn checked_prefix(id: &str) -> Result<&str> {
    if !is_valid_id(id) {
        return Err(Error::InvalidId(id.to_owned()));
    }
    Ok(&id[..PREFIX_LEN])
}

fn prefix_index_key(key: &str) -> String {
    format!("idp_{key}")
}

fn shard_key(key: &str, prefix: &str) -> String {
    format!("id_{key}_{prefix}")
}
