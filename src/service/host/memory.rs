// =============================================================================
// Matrixon Character Profiles - Memory Host Module
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
//   Self-contained chat host used by the command line tool and the tests.
//   Holds the directory (users, teams, channels), posts, files and a
//   key-value store, and persists them as one JSON snapshot.
//
// Features:
//   • Builder-style directory seeding
//   • Post creation with file attachment bookkeeping
//   • Ephemeral post recording for inspection
//
// =============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use matrixon_characters_core::{Channel, ChannelMember, FileInfo, Post, Team, User};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Host;
use crate::database::{KvStore, MemoryKv};
use crate::{Error, Result};

const ID_ALPHABET: &[u8] = b"abcdefghijkmnopqrstuwxyz13456789";

/// Ephemeral post as delivered to one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemeralPost {
    pub user_id: String,
    pub post: Post,
}

/// Everything the memory host knows apart from the key-value store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostDirectory {
    pub site_url: String,
    pub users: BTreeMap<String, User>,
    pub teams: BTreeMap<String, Team>,
    pub channels: BTreeMap<String, Channel>,
    pub members: Vec<ChannelMember>,
    pub posts: BTreeMap<String, Post>,
    pub files: BTreeMap<String, FileInfo>,
    pub file_contents: BTreeMap<String, Vec<u8>>,
    pub ephemeral_posts: Vec<EphemeralPost>,
}

impl HostDirectory {
    pub fn new(site_url: &str) -> Self {
        Self {
            site_url: site_url.trim_end_matches('/').to_owned(),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.insert(user.id.clone(), user);
        self
    }

    pub fn with_team(mut self, team: Team) -> Self {
        self.teams.insert(team.id.clone(), team);
        self
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.insert(channel.id.clone(), channel);
        self
    }

    pub fn with_member(mut self, channel_id: &str, user_id: &str) -> Self {
        self.members.push(ChannelMember {
            channel_id: channel_id.to_owned(),
            user_id: user_id.to_owned(),
        });
        self
    }

    /// Registers an uploaded file and its contents at `file.path`
    pub fn with_file(mut self, file: FileInfo, contents: Vec<u8>) -> Self {
        self.file_contents.insert(file.path.clone(), contents);
        self.files.insert(file.id.clone(), file);
        self
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    #[serde(flatten)]
    directory: HostDirectory,
    #[serde(default)]
    kv: BTreeMap<String, Vec<u8>>,
}

/// In-memory chat host
#[derive(Debug)]
pub struct MemoryHost {
    kv: MemoryKv,
    directory: RwLock<HostDirectory>,
}

impl MemoryHost {
    pub fn new(directory: HostDirectory) -> Self {
        Self {
            kv: MemoryKv::new(),
            directory: RwLock::new(directory),
        }
    }

    /// Restores a host saved with [`MemoryHost::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path)?;
        let snapshot: Snapshot = serde_json::from_slice(&raw)?;
        info!(
            "📂 Loaded host snapshot {:?} with {} post(s) and {} key(s)",
            path,
            snapshot.directory.posts.len(),
            snapshot.kv.len()
        );
        Ok(Self {
            kv: MemoryKv::from_snapshot(snapshot.kv),
            directory: RwLock::new(snapshot.directory),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = Snapshot {
            directory: self.read()?.clone(),
            kv: self.kv.snapshot()?,
        };
        fs::write(path, serde_json::to_vec_pretty(&snapshot)?)?;
        debug!("💾 Saved host snapshot to {:?}", path);
        Ok(())
    }

    /// Stores a new post, assigning an id when it has none, and attaches
    /// its files to it
    pub fn create_post(&self, mut post: Post) -> Result<Post> {
        if post.id.is_empty() {
            post.id = self.new_id();
        }
        let mut directory = self.write()?;
        if !directory.channels.contains_key(&post.channel_id) {
            return Err(Error::not_found(format!(
                "Channel `{}` does not exist.",
                post.channel_id
            )));
        }
        for file_id in &post.file_ids {
            let file = directory
                .files
                .get_mut(file_id)
                .ok_or_else(|| Error::not_found(format!("File `{file_id}` does not exist.")))?;
            file.post_id = post.id.clone();
        }
        directory.posts.insert(post.id.clone(), post.clone());
        Ok(post)
    }

    /// Marks a post deleted
    pub fn delete_post(&self, post_id: &str) -> Result<()> {
        let mut directory = self.write()?;
        let post = directory
            .posts
            .get_mut(post_id)
            .ok_or_else(|| Error::not_found(format!("Post `{post_id}` does not exist.")))?;
        post.delete_at = chrono::Utc::now().timestamp_millis().max(1);
        Ok(())
    }

    /// Stored post regardless of its deletion state
    pub fn raw_post(&self, post_id: &str) -> Result<Option<Post>> {
        Ok(self.read()?.posts.get(post_id).cloned())
    }

    pub fn set_site_url(&self, site_url: &str) -> Result<()> {
        self.write()?.site_url = site_url.trim_end_matches('/').to_owned();
        Ok(())
    }

    pub fn add_file(&self, file: FileInfo, contents: Vec<u8>) -> Result<()> {
        let mut directory = self.write()?;
        directory.file_contents.insert(file.path.clone(), contents);
        directory.files.insert(file.id.clone(), file);
        Ok(())
    }

    pub fn ephemeral_posts(&self) -> Result<Vec<EphemeralPost>> {
        Ok(self.read()?.ephemeral_posts.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HostDirectory>> {
        self.directory
            .read()
            .map_err(|_| Error::Host("memory host lock poisoned".to_owned()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HostDirectory>> {
        self.directory
            .write()
            .map_err(|_| Error::Host("memory host lock poisoned".to_owned()))
    }
}

impl KvStore for MemoryHost {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.kv.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.kv.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.kv.delete(key)
    }

    fn compare_and_swap(&self, key: &str, expected: Option<&[u8]>, new: &[u8]) -> Result<bool> {
        self.kv.compare_and_swap(key, expected, new)
    }

    fn list_keys(&self, page: usize, per_page: usize) -> Result<Vec<String>> {
        self.kv.list_keys(page, per_page)
    }
}

impl Host for MemoryHost {
    fn new_id(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..26)
            .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
            .collect()
    }

    fn site_url(&self) -> Result<String> {
        Ok(self.read()?.site_url.clone())
    }

    fn get_post(&self, post_id: &str) -> Result<Post> {
        self.read()?
            .posts
            .get(post_id)
            .filter(|post| !post.is_deleted())
            .cloned()
            .ok_or_else(|| Error::not_found(format!("Post `{post_id}` does not exist.")))
    }

    fn update_post(&self, post: &Post) -> Result<Post> {
        let mut directory = self.write()?;
        match directory.posts.get_mut(&post.id) {
            Some(stored) if !stored.is_deleted() => {
                *stored = post.clone();
                Ok(post.clone())
            }
            _ => Err(Error::not_found(format!("Post `{}` does not exist.", post.id))),
        }
    }

    fn get_file_info(&self, file_id: &str) -> Result<FileInfo> {
        self.read()?
            .files
            .get(file_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("File `{file_id}` does not exist.")))
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.read()?
            .file_contents
            .get(path)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("No file stored at `{path}`.")))
    }

    fn get_user(&self, user_id: &str) -> Result<User> {
        self.read()?
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("User `{user_id}` does not exist.")))
    }

    fn get_team(&self, team_id: &str) -> Result<Team> {
        self.read()?
            .teams
            .get(team_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("Team `{team_id}` does not exist.")))
    }

    fn get_channel(&self, channel_id: &str) -> Result<Channel> {
        self.read()?
            .channels
            .get(channel_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("Channel `{channel_id}` does not exist.")))
    }

    fn get_channel_members(&self, channel_id: &str, page: usize, per_page: usize) -> Result<Vec<ChannelMember>> {
        Ok(self
            .read()?
            .members
            .iter()
            .filter(|member| member.channel_id == channel_id)
            .skip(page.saturating_mul(per_page))
            .take(per_page)
            .cloned()
            .collect())
    }

    fn get_channels_for_team_for_user(&self, team_id: &str, user_id: &str) -> Result<Vec<Channel>> {
        let directory = self.read()?;
        Ok(directory
            .members
            .iter()
            .filter(|member| member.user_id == user_id)
            .filter_map(|member| directory.channels.get(&member.channel_id))
            .filter(|channel| channel.delete_at == 0)
            .filter(|channel| channel.team_id == team_id || channel.team_id.is_empty())
            .cloned()
            .collect())
    }

    fn update_ephemeral_post(&self, user_id: &str, post: &Post) -> Result<()> {
        self.write()?.ephemeral_posts.push(EphemeralPost {
            user_id: user_id.to_owned(),
            post: post.clone(),
        });
        Ok(())
    }
}
