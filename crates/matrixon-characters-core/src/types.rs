// =============================================================================
// Matrixon Character Profiles - Types Module
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
//   Host-owned entities as seen by the character profile core: posts,
//   file metadata, users, teams and channels.
//
// Features:
//   • Serde models used by the in-memory host snapshot
//   • Post prop helpers for the display override fields
//   • Picture eligibility checks on file metadata
//
// =============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Post prop naming the character profile a post is displayed under.
pub const PROP_PROFILE_IDENTIFIER: &str = "profile_identifier";
/// Post prop overriding the author name.
pub const PROP_OVERRIDE_USERNAME: &str = "override_username";
/// Post prop overriding the author picture.
pub const PROP_OVERRIDE_ICON_URL: &str = "override_icon_url";
/// Post prop the host requires before it honours the two overrides.
pub const PROP_FROM_WEBHOOK: &str = "from_webhook";

/// All props stamped onto a post by a character profile.
pub const PROFILE_PROPS: [&str; 4] = [
    PROP_PROFILE_IDENTIFIER,
    PROP_OVERRIDE_USERNAME,
    PROP_OVERRIDE_ICON_URL,
    PROP_FROM_WEBHOOK,
];

/// A chat message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub root_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub post_type: String,
    #[serde(default)]
    pub file_ids: Vec<String>,
    /// Deletion timestamp in milliseconds, 0 while the post is live
    #[serde(default)]
    pub delete_at: i64,
    #[serde(default)]
    pub props: Map<String, Value>,
}

impl Post {
    pub fn new(user_id: &str, channel_id: &str, message: &str) -> Self {
        Self {
            user_id: user_id.to_owned(),
            channel_id: channel_id.to_owned(),
            message: message.to_owned(),
            ..Default::default()
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.delete_at != 0
    }

    pub fn is_system_message(&self) -> bool {
        self.post_type.starts_with("system_")
    }

    /// String value of a prop. Missing, null and non-string props yield `None`.
    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_str)
    }

    pub fn set_prop(&mut self, key: &str, value: impl Into<Value>) {
        self.props.insert(key.to_owned(), value.into());
    }

    pub fn remove_prop(&mut self, key: &str) {
        self.props.remove(key);
    }

    /// Profile identifier carried by the post, if any.
    pub fn profile_identifier(&self) -> Option<&str> {
        self.prop_str(PROP_PROFILE_IDENTIFIER).filter(|id| !id.is_empty())
    }
}

/// Metadata of an uploaded file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: String,
    #[serde(default)]
    pub post_id: String,
    pub name: String,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub mime_type: String,
    pub path: String,
    #[serde(default)]
    pub thumbnail_path: String,
    #[serde(default)]
    pub update_at: i64,
}

impl FileInfo {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Only pictures the host can thumbnail are usable as profile pictures.
    pub fn has_picture_extension(&self) -> bool {
        matches!(
            self.extension.to_ascii_lowercase().as_str(),
            "jpg" | "jpeg" | "png"
        )
    }
}

/// A chat account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub nickname: String,
}

impl User {
    /// Full name when one is set, otherwise the username.
    pub fn display_name(&self) -> String {
        let full_name = format!("{} {}", self.first_name, self.last_name);
        let full_name = full_name.trim();
        if full_name.is_empty() {
            self.username.clone()
        } else {
            full_name.to_owned()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    #[default]
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "P")]
    Private,
    #[serde(rename = "D")]
    Direct,
    #[serde(rename = "G")]
    Group,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub team_id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(rename = "type", default)]
    pub channel_type: ChannelType,
    #[serde(default)]
    pub delete_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMember {
    pub channel_id: String,
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_display_name_falls_back_to_username() {
        let mut user = User {
            id: "u".to_owned(),
            username: "user-number-one".to_owned(),
            ..Default::default()
        };
        assert_eq!(user.display_name(), "user-number-one");
        user.first_name = "Archibald".to_owned();
        user.last_name = "Haddock".to_owned();
        assert_eq!(user.display_name(), "Archibald Haddock");
    }

    #[test]
    fn test_picture_extension_is_case_insensitive() {
        let mut file = FileInfo {
            extension: "JPEG".to_owned(),
            mime_type: "image/jpeg".to_owned(),
            ..Default::default()
        };
        assert!(file.is_image() && file.has_picture_extension());
        file.extension = "gif".to_owned();
        assert!(!file.has_picture_extension());
    }

    #[test]
    fn test_profile_identifier_ignores_null_and_empty() {
        let mut post = Post::new("u", "c", "hi");
        assert_eq!(post.profile_identifier(), None);
        post.set_prop(PROP_PROFILE_IDENTIFIER, Value::Null);
        assert_eq!(post.profile_identifier(), None);
        post.set_prop(PROP_PROFILE_IDENTIFIER, "");
        assert_eq!(post.profile_identifier(), None);
        post.set_prop(PROP_PROFILE_IDENTIFIER, "haddock");
        assert_eq!(post.profile_identifier(), Some("haddock"));
    }

    #[test]
    fn test_channel_type_wire_names() {
        let channel: Channel = serde_json::from_str(
            r#"{"id":"c","name":"town-square","type":"G"}"#,
        )
        .unwrap();
        assert_eq!(channel.channel_type, ChannelType::Group);
        assert_eq!(channel.team_id, "");
    }
}
