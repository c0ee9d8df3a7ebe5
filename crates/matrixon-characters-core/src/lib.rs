// =============================================================================
// Matrixon Character Profiles - Core Crate
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
//   Entity types exchanged with the chat host and the plugin configuration.
//
// =============================================================================

//! Core types for Matrixon Character Profiles

pub mod config;
pub mod types;

pub use config::{CasConfig, PluginConfig};
pub use types::{Channel, ChannelMember, ChannelType, FileInfo, Post, Team, User};
