// =============================================================================
// Matrixon Character Profiles - Profile Model Module
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
//   Character profile record, the resolved status returned by lookups and
//   the validation rules a stored record must pass.
//
// Features:
//   • Serde record with stable stored field names
//   • Sum type over CHARACTER, ME, CORRUPT and NONEXISTENT
//   • Caller-declared set of accepted statuses
//
// =============================================================================

use std::fmt;
use std::ops::BitOr;

use matrixon_characters_core::{FileInfo, Post};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

static IDENTIFIER_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-z]{1,60}$").expect("valid regex"));

static NAME_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^-*|`>#_.~\[\]]{1,200}$").expect("valid regex"));

/// Identifiers that stand for the user's real account
pub const ME_IDENTIFIERS: [&str; 3] = ["", "me", "myself"];

pub fn is_me(identifier: &str) -> bool {
    ME_IDENTIFIERS.contains(&identifier)
}

pub fn is_valid_identifier(identifier: &str) -> bool {
    IDENTIFIER_FORMAT.is_match(identifier)
}

pub fn is_valid_name(name: &str) -> bool {
    NAME_FORMAT.is_match(name)
}

/// A character profile
///
/// Only the name, picture reference and request key are stored; the owner
/// and identifier live in the storage key, the rest is resolved on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(skip)]
    pub user_id: String,

    #[serde(skip)]
    pub identifier: String,

    #[serde(rename = "displayName", default)]
    pub name: String,

    #[serde(rename = "pictureFile", default)]
    pub picture_file_id: String,

    /// Rotated with every picture change; authorizes and cache-busts
    /// picture URLs
    #[serde(rename = "requestKey", default, skip_serializing_if = "String::is_empty")]
    pub request_key: String,

    #[serde(skip)]
    pub picture: Option<FileInfo>,

    #[serde(skip)]
    pub picture_post: Option<Post>,
}

impl Profile {
    pub fn new(user_id: &str, identifier: &str, name: &str) -> Self {
        Self {
            user_id: user_id.to_owned(),
            identifier: identifier.to_owned(),
            name: name.to_owned(),
            ..Default::default()
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(user_id: &str, identifier: &str, raw: &[u8]) -> Result<Self> {
        let mut profile: Profile = serde_json::from_slice(raw)
            .map_err(|e| Error::from(e).context("Failed to decode profile"))?;
        profile.user_id = user_id.to_owned();
        profile.identifier = identifier.to_owned();
        Ok(profile)
    }

    pub fn has_picture(&self) -> bool {
        !self.picture_file_id.is_empty()
    }

    /// Drops resolved picture data, e.g. before pointing at another file
    pub fn clear_picture(&mut self) {
        self.picture_file_id.clear();
        self.request_key.clear();
        self.picture = None;
        self.picture_post = None;
    }

    /// Checks a populated character profile stored under `identifier`
    pub fn validate(&self, identifier: &str) -> Result<()> {
        self.check(identifier)
            .map_err(|e| e.context(format!("Failed validating profile `{identifier}`")))
    }

    fn check(&self, identifier: &str) -> Result<()> {
        if self.identifier != identifier {
            return Err(Error::bad_request("Identifier mismatch."));
        }
        if is_me(identifier) {
            return Err(Error::bad_request(
                "Identifier indicates the real profile, which is never stored.",
            ));
        }
        if !is_valid_identifier(identifier) {
            return Err(Error::bad_request(
                "Identifier must be 1-60 lowercase letters a-z.",
            ));
        }
        if !is_valid_name(&self.name) {
            return Err(Error::bad_request(
                "Display name must be 1-200 characters and must not contain format control characters.",
            ));
        }
        if !self.has_picture() {
            if self.picture.is_some() || self.picture_post.is_some() {
                return Err(Error::bad_request(
                    "Picture data is present despite no picture file.",
                ));
            }
            return Ok(());
        }

        let file = self
            .picture
            .as_ref()
            .ok_or_else(|| Error::bad_request("The picture file has not been resolved."))?;
        if file.id != self.picture_file_id {
            return Err(Error::bad_request("The resolved picture file is not the expected one."));
        }
        if !file.is_image() {
            return Err(Error::bad_request(format!(
                "The file \"{}\" is not recognized as an image file.",
                file.name
            )));
        }
        if !file.has_picture_extension() {
            return Err(Error::bad_request(format!(
                "The file extension \"{}\" is not valid for a profile picture. Only .JPG, .JPEG and .PNG are acceptable.",
                file.extension
            )));
        }
        if file.path.is_empty() {
            return Err(Error::bad_request(format!(
                "The file \"{}\" has no stored contents.",
                file.name
            )));
        }
        if self.request_key.is_empty() {
            return Err(Error::bad_request("The profile picture has no request key."));
        }

        let post = self.picture_post.as_ref().ok_or_else(|| {
            Error::bad_request("The post supposedly holding the profile picture has not been resolved.")
        })?;
        if post.is_deleted() {
            return Err(Error::bad_request(
                "The post supposedly holding the profile picture is deleted.",
            ));
        }
        if post.file_ids.len() != 1 {
            return Err(Error::bad_request(
                "The post supposedly holding the profile picture does not have exactly 1 file.",
            ));
        }
        if post.file_ids[0] != self.picture_file_id {
            return Err(Error::bad_request(
                "The post supposedly holding the profile picture does not hold the expected file.",
            ));
        }
        Ok(())
    }
}

/// Status of a profile as observed at read time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileStatus {
    Character,
    Me,
    Corrupt,
    Nonexistent,
}

impl fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProfileStatus::Character => "character",
            ProfileStatus::Me => "real",
            ProfileStatus::Corrupt => "corrupt",
            ProfileStatus::Nonexistent => "nonexistent",
        };
        f.write_str(name)
    }
}

/// Outcome of a profile lookup
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedProfile {
    /// Stored, decodable and valid
    Character(Profile),
    /// The user's real account, synthesized from the host
    Me(Profile),
    /// Stored but undecodable or invalid; the profile holds what could be read
    Corrupt(Profile, Error),
    /// No record; the profile only carries owner and identifier
    Nonexistent(Profile, Error),
}

impl ResolvedProfile {
    pub fn status(&self) -> ProfileStatus {
        match self {
            ResolvedProfile::Character(_) => ProfileStatus::Character,
            ResolvedProfile::Me(_) => ProfileStatus::Me,
            ResolvedProfile::Corrupt(..) => ProfileStatus::Corrupt,
            ResolvedProfile::Nonexistent(..) => ProfileStatus::Nonexistent,
        }
    }

    pub fn profile(&self) -> &Profile {
        match self {
            ResolvedProfile::Character(profile)
            | ResolvedProfile::Me(profile)
            | ResolvedProfile::Corrupt(profile, _)
            | ResolvedProfile::Nonexistent(profile, _) => profile,
        }
    }

    pub fn into_profile(self) -> Profile {
        match self {
            ResolvedProfile::Character(profile)
            | ResolvedProfile::Me(profile)
            | ResolvedProfile::Corrupt(profile, _)
            | ResolvedProfile::Nonexistent(profile, _) => profile,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.profile().identifier
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            ResolvedProfile::Corrupt(_, err) | ResolvedProfile::Nonexistent(_, err) => Some(err),
            _ => None,
        }
    }

    /// True for profiles a post can be displayed under
    pub fn is_usable(&self) -> bool {
        matches!(self, ResolvedProfile::Character(_) | ResolvedProfile::Me(_))
    }
}

/// Statuses a caller is prepared to receive from a lookup. Any other
/// status turns into an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Accept {
    character: bool,
    me: bool,
    corrupt: bool,
    nonexistent: bool,
}

impl Accept {
    pub const NONE: Accept = Accept {
        character: false,
        me: false,
        corrupt: false,
        nonexistent: false,
    };
    pub const CHARACTER: Accept = Accept {
        character: true,
        ..Accept::NONE
    };
    pub const ME: Accept = Accept {
        me: true,
        ..Accept::NONE
    };
    pub const CORRUPT: Accept = Accept {
        corrupt: true,
        ..Accept::NONE
    };
    pub const NONEXISTENT: Accept = Accept {
        nonexistent: true,
        ..Accept::NONE
    };
    pub const ALL: Accept = Accept {
        character: true,
        me: true,
        corrupt: true,
        nonexistent: true,
    };

    pub const fn allows(self, status: ProfileStatus) -> bool {
        match status {
            ProfileStatus::Character => self.character,
            ProfileStatus::Me => self.me,
            ProfileStatus::Corrupt => self.corrupt,
            ProfileStatus::Nonexistent => self.nonexistent,
        }
    }
}

impl BitOr for Accept {
    type Output = Accept;

    fn bitor(self, rhs: Accept) -> Accept {
        Accept {
            character: self.character || rhs.character,
            me: self.me || rhs.me,
            corrupt: self.corrupt || rhs.corrupt,
            nonexistent: self.nonexistent || rhs.nonexistent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn pictured() -> Profile {
        let file = FileInfo {
            id: "f".repeat(26),
            post_id: "p".repeat(26),
            name: "haddock.png".to_owned(),
            extension: "png".to_owned(),
            mime_type: "image/png".to_owned(),
            path: "data/haddock.png".to_owned(),
            ..Default::default()
        };
        let post = Post {
            id: "p".repeat(26),
            file_ids: vec![file.id.clone()],
            ..Default::default()
        };
        Profile {
            picture_file_id: file.id.clone(),
            request_key: "k".repeat(26),
            picture: Some(file),
            picture_post: Some(post),
            ..Profile::new("u", "haddock", "Captain Haddock")
        }
    }

    #[test]
    fn test_me_identifiers() {
        assert!(is_me("") && is_me("me") && is_me("myself"));
        assert!(!is_me("haddock"));
    }

    #[test]
    fn test_name_rules() {
        assert!(is_valid_name("Captain Haddock"));
        assert!(is_valid_name("Tintin's dog, Milou!"));
        assert!(is_valid_name(&"x".repeat(200)));
        assert!(!is_valid_name(&"x".repeat(201)));
        assert!(!is_valid_name(""));
        for forbidden in ["-", "*", "|", "`", ">", "#", "_", ".", "~", "[", "]"] {
            assert!(!is_valid_name(&format!("a{forbidden}b")), "{forbidden}");
        }
    }

    #[test]
    fn test_stored_field_names() {
        let profile = Profile::new("u", "haddock", "Captain Haddock");
        let encoded = String::from_utf8(profile.encode().unwrap()).unwrap();
        assert_eq!(encoded, r#"{"displayName":"Captain Haddock","pictureFile":""}"#);

        let decoded = Profile::decode("u", "haddock", encoded.as_bytes()).unwrap();
        assert_eq!(decoded, profile);
    }

    #[test]
    fn test_decode_failure_is_described() {
        let err = Profile::decode("u", "x", b"{broken").unwrap_err();
        assert!(err.to_string().starts_with("Failed to decode profile: "));
    }

    #[test]
    fn test_validate_plain_and_pictured() {
        Profile::new("u", "haddock", "Captain Haddock").validate("haddock").unwrap();
        pictured().validate("haddock").unwrap();
    }

    #[test]
    fn test_validate_failures() {
        let err = Profile::new("u", "haddock", "Captain_Haddock")
            .validate("haddock")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed validating profile `haddock`: Display name must be 1-200 characters and must not contain format control characters."
        );

        assert!(Profile::new("u", "haddock", "A").validate("milou").is_err());
        assert!(Profile::new("u", "me", "A").validate("me").is_err());
        assert!(Profile::new("u", "Haddock", "A").validate("Haddock").is_err());

        let mut deleted = pictured();
        if let Some(post) = deleted.picture_post.as_mut() {
            post.delete_at = 1;
        }
        assert!(deleted.validate("haddock").is_err());

        let mut keyless = pictured();
        keyless.request_key.clear();
        assert!(keyless.validate("haddock").is_err());

        let mut gif = pictured();
        if let Some(file) = gif.picture.as_mut() {
            file.extension = "gif".to_owned();
        }
        let err = gif.validate("haddock").unwrap_err();
        assert!(err.to_string().contains("Only .JPG, .JPEG and .PNG are acceptable."));

        let mut crowded = pictured();
        if let Some(post) = crowded.picture_post.as_mut() {
            post.file_ids.push("o".repeat(26));
        }
        assert!(crowded.validate("haddock").is_err());
    }

    #[test]
    fn test_accept_sets() {
        let accept = Accept::CHARACTER | Accept::CORRUPT;
        assert!(accept.allows(ProfileStatus::Character));
        assert!(accept.allows(ProfileStatus::Corrupt));
        assert!(!accept.allows(ProfileStatus::Me));
        assert!(!accept.allows(ProfileStatus::Nonexistent));
        assert_eq!(
            Accept::CHARACTER | Accept::ME | Accept::CORRUPT | Accept::NONEXISTENT,
            Accept::ALL
        );
        assert!(!Accept::NONE.allows(ProfileStatus::Character));
    }
}
