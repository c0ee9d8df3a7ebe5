// =============================================================================
// Matrixon Character Profiles - Library Root
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
//   Character profiles for chat: users post under alternate names and pictures,
//   with every message kept in sync as profiles change.
//
// Features:
//   • Key-value backed profile store and backlink index
//   • Message hooks, slash command and HTTP surface
//
// =============================================================================

pub mod api;
pub mod database;
pub mod plugin;
pub mod service;
pub mod test_utils;

pub use matrixon_characters_common::{Error, Result, PLUGIN_TAG};
pub use matrixon_characters_core::{
    types, CasConfig, Channel, ChannelMember, ChannelType, FileInfo, PluginConfig, Post, Team,
    User,
};
pub use plugin::Plugin;
