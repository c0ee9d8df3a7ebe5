// =============================================================================
// Matrixon Character Profiles - Common Crate
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
//   Shared error type for the character profile store, the message rewrite
//   engine and the host glue.
//
// Features:
//   • Single error enum with String payloads
//   • Backend / user error classification
//
// =============================================================================

//! Common definitions shared by every Matrixon Character Profiles crate.

pub mod error;

pub use error::{Error, Result};

/// Tag prepended to every error shown to a chat user.
pub const PLUGIN_TAG: &str = "Character Profiles";
