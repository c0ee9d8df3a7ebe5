// =============================================================================
// Matrixon Character Profiles - Posts Module
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
//   Backlink index from (user, profile) to the posts displayed under it, the
//   per-post profile resolution run on every create and edit, and the bulk
//   rewrite that keeps historical posts in line with profile changes.
//
// Features:
//   • One-off, sticky and channel default profile resolution
//   • Prop stamping for display overrides
//   • Skip-detecting bulk rewrite and message counting
//
// =============================================================================

use std::time::Instant;

use matrixon_characters_core::types::{
    PROFILE_PROPS, PROP_FROM_WEBHOOK, PROP_OVERRIDE_ICON_URL, PROP_OVERRIDE_USERNAME,
    PROP_PROFILE_IDENTIFIER,
};
use matrixon_characters_core::{PluginConfig, Post};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::database::{Idset, Strset};
use crate::service::host::{get_post_if_exists, Backend};
use crate::service::profiles::{self, is_me, Accept, ResolvedProfile};
use crate::{Error, Result};

static ONE_OFF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^([a-z]+):[ \n](.*)$").expect("valid regex"));

/// Logical id set key of the posts a profile is displayed on
pub fn backlink_key(user_id: &str, identifier: &str) -> String {
    format!("profiledpost_{user_id}_{identifier}")
}

/// Outcome of a bulk rewrite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Backlinked ids looked at
    pub visited: usize,
    /// Posts written back with new props
    pub rewritten: usize,
    /// Posts gone or no longer carrying the old identifier
    pub skipped: usize,
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

    fn profiles(&self) -> profiles::Service<'a> {
        profiles::Service::new(self.backend, self.config)
    }

    fn backlinks(&self) -> Idset<'a> {
        Idset::new(Strset::new(self.backend.kv(), &self.config.cas))
    }

    /// Records the post in the backlink set of the profile it carries
    #[instrument(level = "debug", skip(self, post), fields(post_id = %post.id))]
    pub fn register_post(&self, post: &Post) -> Result<()> {
        let Some(identifier) = post.profile_identifier() else {
            return Ok(());
        };
        self.backlinks()
            .insert(&backlink_key(&post.user_id, identifier), &post.id)
    }

    /// Copy of `post` displayed under `profile`
    pub fn apply_profile(&self, post: &Post, profile: &ResolvedProfile) -> Result<Post> {
        let mut updated = post.clone();
        match profile {
            ResolvedProfile::Character(character) => {
                updated.set_prop(PROP_PROFILE_IDENTIFIER, character.identifier.as_str());
                updated.set_prop(PROP_OVERRIDE_USERNAME, character.name.as_str());
                updated.set_prop(PROP_OVERRIDE_ICON_URL, self.profiles().icon_url(profile, false)?);
                updated.set_prop(PROP_FROM_WEBHOOK, "true");
            }
            ResolvedProfile::Me(_) => {
                for prop in PROFILE_PROPS {
                    updated.remove_prop(prop);
                }
            }
            ResolvedProfile::Corrupt(..) | ResolvedProfile::Nonexistent(..) => {
                return Err(Error::bad_request(format!(
                    "Cannot display a message under {} profile `{}`.",
                    profile.status(),
                    profile.identifier()
                )));
            }
        }
        Ok(updated)
    }

    /// Decides which profile a new or edited post is displayed under and
    /// returns the post with it applied, or `None` when nothing changes
    #[instrument(level = "debug", skip(self, post), fields(post_id = %post.id))]
    pub fn profiled_post(&self, post: &Post, is_edit: bool) -> Result<Option<Post>> {
        if post.is_system_message() || post.user_id.is_empty() {
            return Ok(None);
        }
        let user_id = post.user_id.as_str();

        if let Some(captures) = ONE_OFF.captures(&post.message) {
            let identifier = captures.get(1).map_or("", |m| m.as_str());
            let rest = captures.get(2).map_or("", |m| m.as_str());
            if let Some(profile) = self.lookup(user_id, identifier, Accept::CHARACTER | Accept::ME)? {
                let mut updated = self.apply_profile(post, &profile)?;
                updated.message = rest.to_owned();
                debug!("🎭 One-off message under `{}`", identifier);
                return Ok(Some(updated));
            }
        }

        if let Some(identifier) = post.profile_identifier() {
            if let Some(profile) = self.lookup(user_id, identifier, Accept::CHARACTER)? {
                return Ok(changed(post, self.apply_profile(post, &profile)?));
            }
        }

        if is_edit {
            return Ok(None);
        }

        let identifier = self.profiles().get_default_profile(user_id, &post.channel_id)?;
        if let Some(profile) = self.lookup(user_id, &identifier, Accept::CHARACTER | Accept::ME)? {
            return Ok(changed(post, self.apply_profile(post, &profile)?));
        }
        Ok(None)
    }

    /// Profile lookup where anything but a backend failure means "no profile"
    fn lookup(&self, user_id: &str, identifier: &str, accept: Accept) -> Result<Option<ResolvedProfile>> {
        match self.profiles().get_profile(user_id, identifier, accept) {
            Ok(profile) => Ok(Some(profile)),
            Err(err) if err.is_backend() => Err(err),
            Err(err) => {
                debug!("🔍 `{}` does not resolve: {}", identifier, err);
                Ok(None)
            }
        }
    }

    /// Re-displays every post backlinked to `old_identifier` under
    /// `new_identifier`. Passing the same identifier twice refreshes posts
    /// after a profile edit.
    #[instrument(level = "debug", skip(self))]
    pub fn rewrite_posts_for_profile(
        &self,
        user_id: &str,
        old_identifier: &str,
        new_identifier: &str,
    ) -> Result<RewriteSummary> {
        let start = Instant::now();
        let context = format!("Failed to update messages of profile `{old_identifier}`");
        if is_me(old_identifier) {
            return Err(Error::bad_request(
                "Messages shown under the real profile are not tracked.",
            )
            .context(context));
        }
        let target = self
            .profiles()
            .get_profile(user_id, new_identifier, Accept::CHARACTER | Accept::ME)
            .map_err(|e| e.context(context.clone()))?;

        let key = backlink_key(user_id, old_identifier);
        let backlinks = self.backlinks();
        let mut summary = RewriteSummary::default();
        backlinks
            .iterate(&key, "", 0, |post_id| {
                summary.visited += 1;
                let Some(post) = get_post_if_exists(self.backend.host(), post_id)? else {
                    summary.skipped += 1;
                    return Ok(());
                };
                if post.user_id != user_id {
                    return Err(Error::bad_request(format!(
                        "Found message `{post_id}` by user `{}` but expected `{user_id}`",
                        post.user_id
                    )));
                }
                if post.profile_identifier() != Some(old_identifier) {
                    summary.skipped += 1;
                    return Ok(());
                }

                let updated = self.apply_profile(&post, &target)?;
                if updated == post {
                    return Ok(());
                }
                let stored = match self.backend.update_post(&updated) {
                    Ok(stored) => stored,
                    Err(err) if err.is_not_found() => {
                        debug!("🔍 Message {} vanished during rewrite", post_id);
                        summary.skipped += 1;
                        return Ok(());
                    }
                    Err(err) => return Err(err),
                };
                self.register_post(&stored)?;
                if stored.profile_identifier() != Some(old_identifier) {
                    backlinks.remove(&key, post_id)?;
                }
                summary.rewritten += 1;
                Ok(())
            })
            .map_err(|e| e.context(context))?;

        metrics::counter!("characters_posts_rewritten_total").increment(summary.rewritten as u64);
        if summary.skipped > 0 {
            warn!(
                "⚠️ Skipped {} stale backlink(s) of `{}` for {}",
                summary.skipped, old_identifier, user_id
            );
        }
        info!(
            "✅ Rewrote {}/{} message(s) from `{}` to `{}` in {:?}",
            summary.rewritten,
            summary.visited,
            old_identifier,
            new_identifier,
            start.elapsed()
        );
        Ok(summary)
    }

    /// Number of live posts still displayed under `identifier`
    #[instrument(level = "debug", skip(self))]
    pub fn count_posts_for_profile(&self, user_id: &str, identifier: &str) -> Result<usize> {
        if is_me(identifier) {
            return Err(Error::bad_request(
                "Messages shown under the real profile are not tracked.",
            ));
        }
        let mut count = 0;
        self.backlinks()
            .iterate(&backlink_key(user_id, identifier), "", 0, |post_id| {
                if let Some(post) = get_post_if_exists(self.backend.host(), post_id)? {
                    if post.profile_identifier() == Some(identifier) {
                        count += 1;
                    }
                }
                Ok(())
            })
            .map_err(|e| e.context(format!("Failed to count messages of profile `{identifier}`")))?;
        Ok(count)
    }
}

fn changed(original: &Post, updated: Post) -> Option<Post> {
    (updated != *original).then_some(updated)
}
