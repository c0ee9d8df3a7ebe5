// =============================================================================
// Matrixon Character Profiles - Profiles Module
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
//   Profile store: lookup with corruption detection, persistence, listing,
//   channel default bindings and picture URLs.
//
// Features:
//   • Status-filtered lookups
//   • Validate-then-persist-then-list write ordering
//   • Identifier list repair from the key space
//
// =============================================================================

mod model;

pub use model::{
    is_me, is_valid_identifier, is_valid_name, Accept, Profile, ProfileStatus, ResolvedProfile,
    ME_IDENTIFIERS,
};

use std::time::Instant;

use matrixon_characters_core::PluginConfig;
use tracing::{debug, info, instrument, warn};

use crate::database::Strset;
use crate::service::host::{get_post_if_exists, Backend};
use crate::{Error, Result};

pub fn profile_key(user_id: &str, identifier: &str) -> String {
    format!("profile_{user_id}_{identifier}")
}

pub fn profile_list_key(user_id: &str) -> String {
    format!("profilelist_{user_id}")
}

pub fn default_profile_key(user_id: &str, channel_id: &str) -> String {
    format!("defaultprofile_{user_id}_{channel_id}")
}

#[derive(Clone, Copy)]
pub struct Service<'a> {
    backend: &'a dyn Backend,
    config: &'a PluginConfig,
}

impl<'a> Service<'a> {
    pub fn new(backend: &'a dyn Backend, config: &'a PluginConfig) -> Self {
        Self { backend, config }
    }

    fn sets(&self) -> Strset<'a> {
        Strset::new(self.backend.kv(), &self.config.cas)
    }

    /// Looks up a profile, turning any status outside `accept` into an error
    #[instrument(level = "debug", skip(self))]
    pub fn get_profile(&self, user_id: &str, identifier: &str, accept: Accept) -> Result<ResolvedProfile> {
        let resolved = self.resolve(user_id, identifier)?;
        if accept.allows(resolved.status()) {
            return Ok(resolved);
        }
        Err(match resolved {
            ResolvedProfile::Character(_) => Error::bad_request(format!(
                "Profile identifier `{identifier}` refers to a character profile."
            )),
            ResolvedProfile::Me(_) => Error::bad_request(format!(
                "Profile identifier `{identifier}` refers to the real profile."
            )),
            ResolvedProfile::Corrupt(_, err) | ResolvedProfile::Nonexistent(_, err) => err,
        })
    }

    fn resolve(&self, user_id: &str, identifier: &str) -> Result<ResolvedProfile> {
        if is_me(identifier) {
            let user = self
                .backend
                .get_user(user_id)
                .map_err(|e| e.context("Could not fetch user"))?;
            return Ok(ResolvedProfile::Me(Profile::new(
                user_id,
                identifier,
                &user.display_name(),
            )));
        }
        if !is_valid_identifier(identifier) {
            return Err(Error::bad_request(format!(
                "`{identifier}` is not a valid profile identifier. Identifiers must be 1-60 lowercase letters a-z."
            )));
        }

        let Some(raw) = self.backend.get(&profile_key(user_id, identifier))? else {
            return Ok(ResolvedProfile::Nonexistent(
                Profile::new(user_id, identifier, ""),
                Error::not_found(format!("Profile `{identifier}` does not exist.")),
            ));
        };

        let mut profile = match Profile::decode(user_id, identifier, &raw) {
            Ok(profile) => profile,
            Err(cause) => {
                return Ok(corrupt(Profile::new(user_id, identifier, ""), cause));
            }
        };
        if let Err(cause) = self.populate(&mut profile) {
            if cause.is_backend() {
                return Err(cause);
            }
            return Ok(corrupt(profile, cause));
        }
        if let Err(cause) = profile.validate(identifier) {
            return Ok(corrupt(profile, cause));
        }
        Ok(ResolvedProfile::Character(profile))
    }

    /// Resolves the picture file and the post holding it
    fn populate(&self, profile: &mut Profile) -> Result<()> {
        if !profile.has_picture() {
            return Ok(());
        }
        let context = format!("Failed to populate profile `{}`", profile.identifier);
        if profile.picture.is_none() {
            let file = self
                .backend
                .get_file_info(&profile.picture_file_id)
                .map_err(|e| e.context(context.clone()))?;
            profile.picture = Some(file);
        }
        if profile.picture_post.is_none() {
            let post_id = profile
                .picture
                .as_ref()
                .map(|file| file.post_id.clone())
                .unwrap_or_default();
            let post = get_post_if_exists(self.backend.host(), &post_id)
                .map_err(|e| e.context(context.clone()))?
                .ok_or_else(|| {
                    Error::not_found(
                        "The post supposedly holding the profile picture could not be found, perhaps it's deleted.",
                    )
                    .context(context.clone())
                })?;
            profile.picture_post = Some(post);
        }
        Ok(())
    }

    /// Validates and stores a character profile, then lists its identifier
    #[instrument(level = "debug", skip(self, profile), fields(identifier = %profile.identifier))]
    pub fn set_profile(&self, profile: &mut Profile) -> Result<()> {
        let start = Instant::now();
        self.populate(profile)?;
        profile.validate(&profile.identifier)?;
        self.backend
            .set(&profile_key(&profile.user_id, &profile.identifier), &profile.encode()?)?;
        self.sets()
            .insert(&profile_list_key(&profile.user_id), &profile.identifier)?;
        info!(
            "✅ Stored character profile `{}` for {} in {:?}",
            profile.identifier,
            profile.user_id,
            start.elapsed()
        );
        Ok(())
    }

    /// Removes the record and the listing entry. Backlinks are kept.
    #[instrument(level = "debug", skip(self))]
    pub fn delete_profile(&self, user_id: &str, identifier: &str) -> Result<()> {
        if is_me(identifier) {
            return Err(Error::bad_request(format!(
                "Profile identifier `{identifier}` refers to the real profile."
            )));
        }
        self.backend.delete(&profile_key(user_id, identifier))?;
        self.sets().remove(&profile_list_key(user_id), identifier)?;
        info!("🗑️ Deleted character profile `{}` for {}", identifier, user_id);
        Ok(())
    }

    pub fn profile_exists(&self, user_id: &str, identifier: &str) -> Result<bool> {
        Ok(self.backend.get(&profile_key(user_id, identifier))?.is_some())
    }

    /// Every listed character profile, corrupt ones included, followed by
    /// the real profile
    #[instrument(level = "debug", skip(self))]
    pub fn list_profiles(&self, user_id: &str) -> Result<Vec<ResolvedProfile>> {
        let mut profiles = Vec::new();
        for identifier in self.sets().get(&profile_list_key(user_id))? {
            match self.get_profile(
                user_id,
                &identifier,
                Accept::CHARACTER | Accept::CORRUPT | Accept::NONEXISTENT,
            ) {
                Ok(ResolvedProfile::Nonexistent(..)) => {
                    warn!("⚠️ Profile list of {} names missing profile `{}`", user_id, identifier);
                }
                Ok(profile) => profiles.push(profile),
                Err(err) if err.is_backend() => return Err(err),
                Err(err) => warn!("⚠️ Skipping listed profile `{}`: {}", identifier, err),
            }
        }
        profiles.push(self.get_profile(user_id, "", Accept::ME)?);
        sort_profiles(&mut profiles);
        Ok(profiles)
    }

    /// Rebuilds the identifier list of a user from the stored records and
    /// returns the resulting identifiers
    #[instrument(level = "debug", skip(self))]
    pub fn reindex(&self, user_id: &str) -> Result<Vec<String>> {
        let prefix = profile_key(user_id, "");
        let stored: Vec<String> = self
            .backend
            .keys_with_prefix(&prefix, self.config.kv_list_page_size)?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_owned))
            .collect();
        let list_key = profile_list_key(user_id);
        let sets = self.sets();
        for identifier in sets.get(&list_key)? {
            if !stored.contains(&identifier) {
                sets.remove(&list_key, &identifier)?;
            }
        }
        for identifier in &stored {
            sets.insert(&list_key, identifier)?;
        }
        debug!("📋 Reindexed {} profile(s) for {}", stored.len(), user_id);
        sets.get(&list_key)
    }

    /// Identifier bound to the channel, empty for the real profile
    pub fn get_default_profile(&self, user_id: &str, channel_id: &str) -> Result<String> {
        let raw = self.backend.get(&default_profile_key(user_id, channel_id))?;
        Ok(raw
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default())
    }

    /// Binds a character profile to the channel
    pub fn set_default_profile(&self, user_id: &str, channel_id: &str, identifier: &str) -> Result<Profile> {
        let profile = self
            .get_profile(user_id, identifier, Accept::CHARACTER)?
            .into_profile();
        self.backend
            .set(&default_profile_key(user_id, channel_id), identifier.as_bytes())?;
        Ok(profile)
    }

    pub fn remove_default_profile(&self, user_id: &str, channel_id: &str) -> Result<()> {
        self.backend.delete(&default_profile_key(user_id, channel_id))
    }

    /// Picture URL for a resolved profile
    pub fn icon_url(&self, resolved: &ResolvedProfile, thumbnail: bool) -> Result<String> {
        let site_url = self.backend.site_url()?;
        let plugin_url = self.config.plugin_url(&site_url);
        let suffix = if thumbnail { "/thumbnail" } else { "" };
        let profile = resolved.profile();
        Ok(match resolved {
            ResolvedProfile::Character(_) if profile.has_picture() => format!(
                "{plugin_url}/profile/{}/{}{suffix}?rk={}",
                profile.user_id, profile.identifier, profile.request_key
            ),
            ResolvedProfile::Character(_) => {
                format!("{plugin_url}/static/defaultprofilepicture{suffix}")
            }
            ResolvedProfile::Me(_) => format!(
                "{}/api/v4/users/{}/image",
                site_url.trim_end_matches('/'),
                profile.user_id
            ),
            ResolvedProfile::Corrupt(..) | ResolvedProfile::Nonexistent(..) => {
                format!("{plugin_url}/static/corruptedprofilepicture{suffix}")
            }
        })
    }

    /// Fresh request key for a changed picture
    pub fn new_request_key(&self) -> String {
        self.backend.new_id()
    }
}

fn corrupt(profile: Profile, cause: Error) -> ResolvedProfile {
    let err = Error::Corrupt {
        identifier: profile.identifier.clone(),
        cause: Box::new(cause),
    };
    debug!("🔍 {}", err);
    ResolvedProfile::Corrupt(profile, err)
}

/// Orders by identifier with the real profile last
pub fn sort_profiles(profiles: &mut [ResolvedProfile]) {
    profiles.sort_by(|a, b| {
        let a_me = a.status() == ProfileStatus::Me;
        let b_me = b.status() == ProfileStatus::Me;
        a_me.cmp(&b_me).then_with(|| a.identifier().cmp(b.identifier()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::KvStore;
    use crate::service::host::{HostDirectory, MemoryHost};
    use matrixon_characters_core::{Channel, FileInfo, Post, User};
    use test_log::test;

    const USER: &str = "uuuuuuuuuuuuuuuuuuuuuuuuuu";

    fn host() -> MemoryHost {
        MemoryHost::new(
            HostDirectory::new("https://chat.example.com")
                .with_user(User {
                    id: USER.to_owned(),
                    username: "user-number-one".to_owned(),
                    ..Default::default()
                })
                .with_channel(Channel {
                    id: "channel".to_owned(),
                    name: "town-square".to_owned(),
                    ..Default::default()
                })
                .with_file(
                    FileInfo {
                        id: "ffffffffffffffffffffffffff".to_owned(),
                        name: "milou.jpg".to_owned(),
                        extension: "jpg".to_owned(),
                        mime_type: "image/jpeg".to_owned(),
                        path: "data/milou.jpg".to_owned(),
                        ..Default::default()
                    },
                    b"jpeg".to_vec(),
                ),
        )
    }

    fn picture_post(host: &MemoryHost) -> Post {
        let mut post = Post::new(USER, "channel", "");
        post.file_ids = vec!["ffffffffffffffffffffffffff".to_owned()];
        host.create_post(post).unwrap()
    }

    fn pictured(service: &Service<'_>, name: &str) -> Profile {
        Profile {
            picture_file_id: "ffffffffffffffffffffffffff".to_owned(),
            request_key: service.new_request_key(),
            ..Profile::new(USER, "milou", name)
        }
    }

    #[test]
    fn test_nonexistent_only_when_accepted() {
        let host = host();
        let config = PluginConfig::default();
        let profiles = Service::new(&host, &config);

        let err = profiles.get_profile(USER, "haddock", Accept::CHARACTER).unwrap_err();
        assert_eq!(err, Error::not_found("Profile `haddock` does not exist."));

        let resolved = profiles
            .get_profile(USER, "haddock", Accept::NONEXISTENT)
            .unwrap();
        assert_eq!(resolved.status(), ProfileStatus::Nonexistent);
        assert_eq!(resolved.identifier(), "haddock");
    }

    #[test]
    fn test_me_is_synthesized_from_user() {
        let host = host();
        let config = PluginConfig::default();
        let profiles = Service::new(&host, &config);

        for identifier in ME_IDENTIFIERS {
            let resolved = profiles.get_profile(USER, identifier, Accept::ALL).unwrap();
            assert_eq!(resolved.status(), ProfileStatus::Me);
            assert_eq!(resolved.profile().name, "user-number-one");
        }
        let err = profiles.get_profile(USER, "me", Accept::CHARACTER).unwrap_err();
        assert_eq!(err.to_string(), "Profile identifier `me` refers to the real profile.");
    }

    #[test]
    fn test_character_rejected_when_not_accepted() {
        let host = host();
        let config = PluginConfig::default();
        let profiles = Service::new(&host, &config);
        profiles
            .set_profile(&mut Profile::new(USER, "haddock", "Captain Haddock"))
            .unwrap();

        let err = profiles.get_profile(USER, "haddock", Accept::NONEXISTENT).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Profile identifier `haddock` refers to a character profile."
        );
    }

    #[test]
    fn test_create_corrupt_repair() {
        let host = host();
        let config = PluginConfig::default();
        let profiles = Service::new(&host, &config);
        let post = picture_post(&host);

        profiles.set_profile(&mut pictured(&profiles, "Milou")).unwrap();
        let resolved = profiles.get_profile(USER, "milou", Accept::CHARACTER).unwrap();
        assert_eq!(resolved.profile().picture_post.as_ref().unwrap().id, post.id);

        host.delete_post(&post.id).unwrap();
        let resolved = profiles
            .get_profile(USER, "milou", Accept::CHARACTER | Accept::CORRUPT)
            .unwrap();
        assert_eq!(resolved.status(), ProfileStatus::Corrupt);
        assert_eq!(
            resolved.error().unwrap().to_string(),
            "Profile `milou` is corrupt and needs to be recreated: Failed to populate profile \
             `milou`: The post supposedly holding the profile picture could not be found, \
             perhaps it's deleted."
        );
        assert!(matches!(
            profiles.get_profile(USER, "milou", Accept::CHARACTER),
            Err(Error::Corrupt { .. })
        ));

        // A fresh post with the same picture repairs it
        picture_post(&host);
        profiles.set_profile(&mut pictured(&profiles, "Milou")).unwrap();
        let resolved = profiles.get_profile(USER, "milou", Accept::CHARACTER).unwrap();
        assert_eq!(resolved.status(), ProfileStatus::Character);
    }

    #[test]
    fn test_undecodable_record_is_corrupt() {
        let host = host();
        let config = PluginConfig::default();
        let profiles = Service::new(&host, &config);
        host.set(&profile_key(USER, "haddock"), b"{\"displayName\":").unwrap();

        let resolved = profiles.get_profile(USER, "haddock", Accept::CORRUPT).unwrap();
        assert_eq!(resolved.status(), ProfileStatus::Corrupt);
        assert!(resolved
            .error()
            .unwrap()
            .to_string()
            .starts_with("Profile `haddock` is corrupt and needs to be recreated: Failed to decode profile"));
    }

    #[test]
    fn test_set_profile_rejects_invalid_before_storing() {
        let host = host();
        let config = PluginConfig::default();
        let profiles = Service::new(&host, &config);

        let err = profiles
            .set_profile(&mut Profile::new(USER, "haddock", "Captain *Haddock*"))
            .unwrap_err();
        assert!(err.to_string().starts_with("Failed validating profile `haddock`"));
        assert!(!profiles.profile_exists(USER, "haddock").unwrap());
        assert!(host.get(&profile_list_key(USER)).unwrap().is_none());
    }

    #[test]
    fn test_list_sorted_with_me_last() {
        let host = host();
        let config = PluginConfig::default();
        let profiles = Service::new(&host, &config);
        for (identifier, name) in [("milou", "Milou"), ("haddock", "Captain Haddock")] {
            profiles
                .set_profile(&mut Profile::new(USER, identifier, name))
                .unwrap();
        }
        host.set(&profile_key(USER, "broken"), b"nope").unwrap();
        Strset::new(&host, &config.cas)
            .insert(&profile_list_key(USER), "broken")
            .unwrap();
        Strset::new(&host, &config.cas)
            .insert(&profile_list_key(USER), "ghost")
            .unwrap();

        let listed: Vec<(String, ProfileStatus)> = profiles
            .list_profiles(USER)
            .unwrap()
            .iter()
            .map(|p| (p.identifier().to_owned(), p.status()))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("broken".to_owned(), ProfileStatus::Corrupt),
                ("haddock".to_owned(), ProfileStatus::Character),
                ("milou".to_owned(), ProfileStatus::Character),
                ("".to_owned(), ProfileStatus::Me),
            ]
        );
    }

    #[test]
    fn test_delete_and_reindex() {
        let host = host();
        let config = PluginConfig::default();
        let profiles = Service::new(&host, &config);
        profiles
            .set_profile(&mut Profile::new(USER, "haddock", "Captain Haddock"))
            .unwrap();
        profiles
            .set_profile(&mut Profile::new(USER, "milou", "Milou"))
            .unwrap();

        profiles.delete_profile(USER, "milou").unwrap();
        assert!(!profiles.profile_exists(USER, "milou").unwrap());
        assert!(profiles.delete_profile(USER, "me").is_err());

        // Simulate a listing that lost writes
        host.set(&profile_list_key(USER), br#"["ghost"]"#).unwrap();
        assert_eq!(profiles.reindex(USER).unwrap(), vec!["haddock"]);
    }

    #[test]
    fn test_default_binding() {
        let host = host();
        let config = PluginConfig::default();
        let profiles = Service::new(&host, &config);
        assert_eq!(profiles.get_default_profile(USER, "channel").unwrap(), "");
        assert!(profiles.set_default_profile(USER, "channel", "haddock").is_err());

        profiles
            .set_profile(&mut Profile::new(USER, "haddock", "Captain Haddock"))
            .unwrap();
        let bound = profiles.set_default_profile(USER, "channel", "haddock").unwrap();
        assert_eq!(bound.name, "Captain Haddock");
        assert_eq!(profiles.get_default_profile(USER, "channel").unwrap(), "haddock");

        profiles.remove_default_profile(USER, "channel").unwrap();
        assert_eq!(profiles.get_default_profile(USER, "channel").unwrap(), "");
    }

    #[test]
    fn test_icon_urls() {
        let host = host();
        let config = PluginConfig::default();
        let profiles = Service::new(&host, &config);
        let plugin = "https://chat.example.com/plugins/com.matrixon.character-profiles";

        let plain = ResolvedProfile::Character(Profile::new(USER, "haddock", "Haddock"));
        assert_eq!(
            profiles.icon_url(&plain, false).unwrap(),
            format!("{plugin}/static/defaultprofilepicture")
        );

        let mut with_picture = Profile::new(USER, "milou", "Milou");
        with_picture.picture_file_id = "f".repeat(26);
        with_picture.request_key = "key".to_owned();
        assert_eq!(
            profiles
                .icon_url(&ResolvedProfile::Character(with_picture), true)
                .unwrap(),
            format!("{plugin}/profile/{USER}/milou/thumbnail?rk=key")
        );

        let me = profiles.get_profile(USER, "me", Accept::ME).unwrap();
        assert_eq!(
            profiles.icon_url(&me, true).unwrap(),
            format!("https://chat.example.com/api/v4/users/{USER}/image")
        );

        let missing = profiles.get_profile(USER, "nobody", Accept::NONEXISTENT).unwrap();
        assert_eq!(
            profiles.icon_url(&missing, true).unwrap(),
            format!("{plugin}/static/corruptedprofilepicture/thumbnail")
        );
    }
}
