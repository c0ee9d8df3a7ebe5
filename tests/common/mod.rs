// =============================================================================
// Matrixon Character Profiles - Integration Test Fixture
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
//   A small chat world on the in-memory host: three users, a team with two
//   channels, a direct message and a group chat, driven through the plugin.
//
// Features:
//   • Command, post and edit helpers that run the plugin hooks
//   • Picture uploads for profile pictures
//
// =============================================================================

#![allow(dead_code)]

use std::sync::Arc;

use matrixon_characters::service::commands::{CommandArgs, CommandResponse};
use matrixon_characters::service::host::{Host, HostDirectory, MemoryHost};
use matrixon_characters::types::PROP_OVERRIDE_USERNAME;
use matrixon_characters::{
    Channel, ChannelType, FileInfo, Plugin, PluginConfig, Post, Result, Team, User,
};

pub const SITE_URL: &str = "https://chat.example.com";
pub const USER1: &str = "user1aaaaaaaaaaaaaaaaaaaaa";
pub const USER2: &str = "user2bbbbbbbbbbbbbbbbbbbbb";
pub const USER3: &str = "user3ccccccccccccccccccccc";
pub const TEAM: &str = "teamaaaaaaaaaaaaaaaaaaaaaa";
pub const TOWN_SQUARE: &str = "townsquareaaaaaaaaaaaaaaaa";
pub const OFF_TOPIC: &str = "offtopicaaaaaaaaaaaaaaaaaa";
pub const DIRECT: &str = "directaaaaaaaaaaaaaaaaaaaa";
pub const GROUP: &str = "groupaaaaaaaaaaaaaaaaaaaaa";

pub struct World {
    pub host: Arc<MemoryHost>,
    pub plugin: Plugin,
}

fn user(id: &str, username: &str) -> User {
    User {
        id: id.to_owned(),
        username: username.to_owned(),
        ..Default::default()
    }
}

fn channel(id: &str, name: &str, channel_type: ChannelType) -> Channel {
    Channel {
        id: id.to_owned(),
        team_id: TEAM.to_owned(),
        name: name.to_owned(),
        channel_type,
        ..Default::default()
    }
}

impl World {
    pub fn new() -> Self {
        Self::with_config(PluginConfig::default())
    }

    pub fn with_config(config: PluginConfig) -> Self {
        let directory = HostDirectory::new(SITE_URL)
            .with_user(user(USER1, "user-number-one"))
            .with_user(user(USER2, "archibald"))
            .with_user(user(USER3, "tintin"))
            .with_team(Team {
                id: TEAM.to_owned(),
                name: "marlinspike".to_owned(),
            })
            .with_channel(channel(TOWN_SQUARE, "town-square", ChannelType::Open))
            .with_channel(channel(OFF_TOPIC, "off-topic", ChannelType::Private))
            .with_channel(channel(DIRECT, "user1__user2", ChannelType::Direct))
            .with_channel(channel(GROUP, "groupchat", ChannelType::Group))
            .with_member(TOWN_SQUARE, USER1)
            .with_member(OFF_TOPIC, USER1)
            .with_member(DIRECT, USER1)
            .with_member(DIRECT, USER2)
            .with_member(GROUP, USER1)
            .with_member(GROUP, USER2)
            .with_member(GROUP, USER3);
        let host = Arc::new(MemoryHost::new(directory));
        let plugin = Plugin::new(host.clone(), config);
        Self { host, plugin }
    }

    pub fn run(&self, channel_id: &str, root_id: &str, command: &str, confirmed: bool) -> Result<CommandResponse> {
        self.plugin.execute_command(
            &CommandArgs {
                command: command.to_owned(),
                user_id: USER1.to_owned(),
                channel_id: channel_id.to_owned(),
                team_id: TEAM.to_owned(),
                root_id: root_id.to_owned(),
            },
            confirmed,
        )
    }

    /// Runs a command in town square, answering yes to any prompt
    pub fn exec(&self, command: &str) -> CommandResponse {
        self.run(TOWN_SQUARE, "", command, true)
            .unwrap_or_else(|err| panic!("{command} failed: {err}"))
    }

    /// Runs a command in town square and returns its error message
    pub fn exec_err(&self, command: &str) -> String {
        match self.run(TOWN_SQUARE, "", command, true) {
            Ok(response) => panic!("{command} unexpectedly succeeded: {response:?}"),
            Err(err) => err.to_string(),
        }
    }

    /// Posts as user one through the hooks
    pub fn post(&self, channel_id: &str, message: &str) -> Post {
        let post = Post::new(USER1, channel_id, message);
        let post = self
            .plugin
            .message_will_be_posted(&post)
            .unwrap()
            .unwrap_or(post);
        let post = self.host.create_post(post).unwrap();
        self.plugin.message_has_been_posted(&post);
        post
    }

    /// Edits a post through the hooks
    pub fn edit(&self, post_id: &str, message: &str) -> Post {
        let mut post = self.host.get_post(post_id).unwrap();
        post.message = message.to_owned();
        let post = self
            .plugin
            .message_will_be_updated(&post)
            .unwrap()
            .unwrap_or(post);
        let post = self.host.update_post(&post).unwrap();
        self.plugin.message_has_been_updated(&post);
        post
    }

    /// Uploads a PNG in a new town square post and returns that post
    pub fn picture_post(&self, name: &str) -> Post {
        let file_id = self.host.new_id();
        let path = format!("data/{file_id}/{name}");
        self.host
            .add_file(
                FileInfo {
                    id: file_id.clone(),
                    name: name.to_owned(),
                    extension: "png".to_owned(),
                    mime_type: "image/png".to_owned(),
                    path: path.clone(),
                    thumbnail_path: path,
                    update_at: 1_700_000_000_000,
                    ..Default::default()
                },
                format!("picture {name}").into_bytes(),
            )
            .unwrap();
        let mut post = Post::new(USER1, TOWN_SQUARE, "");
        post.file_ids.push(file_id);
        self.host.create_post(post).unwrap()
    }

    pub fn count(&self, identifier: &str) -> usize {
        self.plugin
            .services()
            .posts()
            .count_posts_for_profile(USER1, identifier)
            .unwrap()
    }

    pub fn get(&self, post_id: &str) -> Post {
        self.host.get_post(post_id).unwrap()
    }
}

/// Name a post is displayed under, `None` for the real profile
pub fn shown_as(post: &Post) -> Option<(String, String)> {
    let identifier = post.profile_identifier()?;
    let name = post.prop_str(PROP_OVERRIDE_USERNAME).unwrap_or_default();
    Some((identifier.to_owned(), name.to_owned()))
}
