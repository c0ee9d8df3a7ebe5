// =============================================================================
// Matrixon Character Profiles - Test Utilities
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
//   Shared fixtures for unit tests: tracing setup and a seeded in-memory host.
//
// Features:
//   • One user with a real profile, a team and a channel
//   • Pictures attached to posts, ready to become profile pictures
//
// =============================================================================

#![cfg(any(test, feature = "testing"))]

use std::sync::Once;

use matrixon_characters_core::{Channel, FileInfo, Post, Team, User};

use crate::service::host::{HostDirectory, MemoryHost};
use crate::Result;

static INIT: Once = Once::new();

pub const SITE_URL: &str = "https://chat.example.com";
pub const TEST_USER: &str = "uuuuuuuuuuuuuuuuuuuuuuuuuu";
pub const TEST_USERNAME: &str = "user-number-one";
pub const TEST_TEAM: &str = "tttttttttttttttttttttttttt";
pub const TEST_CHANNEL: &str = "cccccccccccccccccccccccccc";

pub fn init_test_environment() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("debug")
            .try_init();
    });
}

/// Host with one user who is a member of one channel
pub fn seeded_host() -> MemoryHost {
    init_test_environment();
    MemoryHost::new(
        HostDirectory::new(SITE_URL)
            .with_user(User {
                id: TEST_USER.to_owned(),
                username: TEST_USERNAME.to_owned(),
                ..Default::default()
            })
            .with_team(Team {
                id: TEST_TEAM.to_owned(),
                name: "matrixon".to_owned(),
            })
            .with_channel(Channel {
                id: TEST_CHANNEL.to_owned(),
                team_id: TEST_TEAM.to_owned(),
                name: "town-square".to_owned(),
                ..Default::default()
            })
            .with_member(TEST_CHANNEL, TEST_USER),
    )
}

/// Uploads a PNG and posts it, returning the post holding it
pub fn picture_post(host: &MemoryHost, name: &str) -> Result<Post> {
    use crate::service::host::Host;

    let file_id = host.new_id();
    let path = format!("data/{file_id}/{name}");
    host.add_file(
        FileInfo {
            id: file_id.clone(),
            name: name.to_owned(),
            extension: "png".to_owned(),
            mime_type: "image/png".to_owned(),
            path: path.clone(),
            thumbnail_path: path.clone(),
            update_at: 1_700_000_000_000,
            ..Default::default()
        },
        format!("picture {name}").into_bytes(),
    )?;
    let mut post = Post::new(TEST_USER, TEST_CHANNEL, "");
    post.file_ids.push(file_id);
    host.create_post(post)
}
