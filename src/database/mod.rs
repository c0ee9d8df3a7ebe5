// =============================================================================
// Matrixon Character Profiles - Database Module
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
//   Storage layer of the character profile store: the key-value abstraction
//   and the two set structures built on its compare-and-swap.
//
// Features:
//   • KvStore trait with an in-memory engine
//   • Sorted string sets stored as one JSON array per key
//   • Prefix-sharded id sets for large backlink indexes
//
// =============================================================================

pub mod abstraction;
pub mod idset;
pub mod strset;

pub use abstraction::{memory::MemoryKv, KvStore};
pub use idset::Idset;
pub use strset::Strset;
