// =============================================================================
// Matrixon Character Profiles - Host Module
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
//   Chat host API the character profile core depends on: message, file,
//   user, team and channel access plus the key-value store.
//
// Features:
//   • Host trait covering the collaborator capabilities
//   • Backend trait joining the host and its key-value store
//   • Missing-post normalization
//
// =============================================================================

mod memory;

pub use memory::{EphemeralPost, HostDirectory, MemoryHost};

use matrixon_characters_core::{Channel, ChannelMember, FileInfo, Post, Team, User};

use crate::database::KvStore;
use crate::Result;

/// Chat host operations used by the plugin
///
/// Lookups of entities that do not exist fail with `Error::NotFound`; every
/// other failure is a backend error.
pub trait Host: Send + Sync {
    /// Fresh 26-character lowercase alphanumeric id
    fn new_id(&self) -> String;

    /// Public base URL of the chat site, without a trailing slash
    fn site_url(&self) -> Result<String>;

    /// Fetches a live post. Deleted posts are reported as not found.
    fn get_post(&self, post_id: &str) -> Result<Post>;

    /// Replaces a post and returns the stored version
    fn update_post(&self, post: &Post) -> Result<Post>;

    fn get_file_info(&self, file_id: &str) -> Result<FileInfo>;

    /// Raw bytes of a stored file
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    fn get_user(&self, user_id: &str) -> Result<User>;

    fn get_team(&self, team_id: &str) -> Result<Team>;

    fn get_channel(&self, channel_id: &str) -> Result<Channel>;

    fn get_channel_members(&self, channel_id: &str, page: usize, per_page: usize) -> Result<Vec<ChannelMember>>;

    /// Channels of `team_id` the user belongs to, including direct and
    /// group messages
    fn get_channels_for_team_for_user(&self, team_id: &str, user_id: &str) -> Result<Vec<Channel>>;

    /// Replaces an ephemeral post shown only to `user_id`
    fn update_ephemeral_post(&self, user_id: &str, post: &Post) -> Result<()>;
}

/// Everything the plugin needs from its environment
pub trait Backend: KvStore + Host {
    fn kv(&self) -> &dyn KvStore;

    fn host(&self) -> &dyn Host;
}

impl<T: KvStore + Host> Backend for T {
    fn kv(&self) -> &dyn KvStore {
        self
    }

    fn host(&self) -> &dyn Host {
        self
    }
}

/// Like [`Host::get_post`], with a missing or deleted post as `None`
pub fn get_post_if_exists(host: &dyn Host, post_id: &str) -> Result<Option<Post>> {
    match host.get_post(post_id) {
        Ok(post) => Ok(Some(post)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}
