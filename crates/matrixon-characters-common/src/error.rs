// =============================================================================
// Matrixon Character Profiles - Error Module
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
//   Error types for character profiles. Payloads are plain strings so errors
//   can be cloned into profile status values and compared in tests.
//
// Features:
//   • Validation, not-found and corruption kinds
//   • Context wrapping with a readable cause chain
//   • Backend fault detection through wrappers
//
// =============================================================================

//! Error types for Matrixon Character Profiles
//!
//! Every fallible operation returns [`Result`]. User mistakes surface as
//! [`Error::BadRequest`] or [`Error::NotFound`], stored records that fail to
//! decode or validate as [`Error::Corrupt`], and collaborator failures as one
//! of the backend variants.

use thiserror::Error;

/// Character profile error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed input or an operation that does not apply to the target
    #[error("{0}")]
    BadRequest(String),

    /// Requested entity does not exist
    #[error("{0}")]
    NotFound(String),

    /// Stored profile failed to decode or validate
    #[error("Profile `{identifier}` is corrupt and needs to be recreated: {cause}")]
    Corrupt { identifier: String, cause: Box<Error> },

    /// Error annotated by the call site
    #[error("{context}: {source}")]
    Context { context: String, source: Box<Error> },

    /// Identifier that is not a 26-character lowercase alphanumeric token
    #[error("Expected a 26-character alphanumeric string, got \"{0}\"")]
    InvalidId(String),

    /// Compare-and-swap kept losing against concurrent writers
    #[error("Concurrent modification of `{key}` did not settle after {attempts} attempts")]
    Conflict { key: String, attempts: u32 },

    /// Key-value store failure
    #[error("Database error: {0}")]
    Database(String),

    /// Chat host API failure
    #[error("Host error: {0}")]
    Host(String),

    /// IO failure
    #[error("IO error: {0}")]
    Io(String),

    /// Encoding or decoding failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for character profile operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Wraps `self` so that it displays as `<context>: <self>`.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True for failures of the storage or host collaborators, looking
    /// through any context wrappers.
    pub fn is_backend(&self) -> bool {
        match self {
            Self::Database(_) | Self::Host(_) | Self::Io(_) | Self::Conflict { .. } => true,
            Self::Context { source, .. } => source.is_backend(),
            _ => false,
        }
    }

    /// True when the innermost error is [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Context { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Message shown to chat users.
    pub fn user_message(&self) -> String {
        format!("{}: {}", crate::PLUGIN_TAG, self)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
