// =============================================================================
// Matrixon Character Profiles - Command Handlers
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
//   Handlers for the profile management commands. Merging lives in its own
//   module.
//
// Features:
//   • Create and modify with thread-root pictures
//   • Channel default bindings and the who-am-I overview
//
// =============================================================================

use std::collections::BTreeMap;

use matrixon_characters_core::{Channel, ChannelType};
use regex::Captures;
use tracing::debug;

use super::{group, ui, Attachment, CommandResponse, Invocation, Service};
use crate::service::profiles::{is_me, sort_profiles, Accept, Profile, ResolvedProfile};
use crate::{Error, Result};

const MAX_GROUP_NAMES: usize = 5;

impl Service<'_> {
    /// Profile card with the thumbnail icon
    pub(super) fn attachment(&self, profile: &ResolvedProfile) -> Result<Attachment> {
        let thumb_url = self.services.profiles().icon_url(profile, true)?;
        Ok(ui::profile_attachment(profile, thumb_url))
    }

    /// File id of the single picture attached to the thread root
    fn thread_picture(&self, invocation: &Invocation<'_>) -> Result<String> {
        let root_id = &invocation.args.root_id;
        if root_id.is_empty() {
            return Err(Error::bad_request(
                "Setting character profile picture can only be done in a thread, with the parent post containing the picture.",
            ));
        }
        let root = self
            .services
            .backend()
            .get_post(root_id)
            .map_err(|e| e.context(format!("Could not fetch parent post `{root_id}`")))?;
        match root.file_ids.as_slice() {
            [file_id] if !file_id.is_empty() => Ok(file_id.clone()),
            [_] => Err(Error::bad_request("Could not find file id in parent post.")),
            [] => Err(Error::bad_request(
                "Parent post has no file. Attach the picture to the parent post when creating or modifying a character profile.",
            )),
            _ => Err(Error::bad_request(
                "Parent post cannot have more than one file when creating or modifying a character profile.",
            )),
        }
    }

    fn upsert(
        &self,
        invocation: &Invocation<'_>,
        identifier: &str,
        name: Option<&str>,
        set_picture: bool,
    ) -> Result<CommandResponse> {
        if is_me(identifier) {
            return Err(Error::bad_request(
                "You cannot use `myself` or `me` as a character profile identifier. Use the built-in functionality to change the display name or profile picture for your real profile.",
            ));
        }
        let user_id = invocation.args.user_id.as_str();
        let profiles = self.services.profiles();
        let existed = profiles.profile_exists(user_id, identifier)?;
        let picture_file_id = if set_picture {
            Some(self.thread_picture(invocation)?)
        } else {
            None
        };

        let (mut profile, message) = if existed {
            let old = profiles
                .get_profile(user_id, identifier, Accept::CHARACTER | Accept::CORRUPT)?
                .into_profile();
            let mut new = old.clone();
            let mut message = format!("Character profile `{identifier}` modified by");
            if let Some(name) = name {
                new.name = name.to_owned();
                if old.name == new.name {
                    message.push_str(&format!(
                        " setting the display name to \"{}\" (same as before)",
                        new.name
                    ));
                } else {
                    message.push_str(&format!(
                        " changing the display name from \"{}\" to \"{}\"",
                        old.name, new.name
                    ));
                }
            }
            if let Some(file_id) = picture_file_id {
                if name.is_some() {
                    message.push_str(" and");
                }
                if old.picture_file_id == file_id {
                    message.push_str(" updating the profile picture (to the same as before)");
                } else {
                    new.clear_picture();
                    new.picture_file_id = file_id;
                    new.request_key = profiles.new_request_key();
                    message.push_str(" updating the profile picture");
                }
                if new.request_key.is_empty() {
                    new.request_key = profiles.new_request_key();
                }
            }
            (new, message)
        } else {
            let Some(name) = name else {
                return Err(Error::bad_request(format!(
                    "No character profile with identifier `{identifier}` exists. In order to create it, you must at least provide a display name. Try `/{} help` for details.",
                    self.config().trigger
                )));
            };
            let mut new = Profile::new(user_id, identifier, name);
            let mut message =
                format!("Character profile `{identifier}` created with display name \"{name}\"");
            if let Some(file_id) = picture_file_id {
                new.picture_file_id = file_id;
                new.request_key = profiles.new_request_key();
                message.push_str(" and a profile picture");
            }
            (new, message)
        };

        profiles.set_profile(&mut profile)?;
        let summary = self
            .services
            .posts()
            .rewrite_posts_for_profile(user_id, identifier, identifier)?;
        debug!("🔄 Refreshed {} message(s) of `{}`", summary.rewritten, identifier);

        let attachment = self.attachment(&ResolvedProfile::Character(profile))?;
        Ok(CommandResponse::with_attachments(message, vec![attachment]))
    }

    fn channel_mention(&self, channel: &Channel, user_id: &str, team_id: &str) -> Result<String> {
        let backend = self.services.backend();
        let page_size = self.config().channel_members_page_size;
        match channel.channel_type {
            ChannelType::Open | ChannelType::Private => Ok(format!("~{}", channel.name)),
            ChannelType::Direct => {
                let members = backend.get_channel_members(&channel.id, 0, page_size)?;
                if members.len() != 2 {
                    return Err(Error::bad_request(format!(
                        "Channel {} has {} members, expected 2.",
                        channel.id,
                        members.len()
                    )));
                }
                let other = members
                    .iter()
                    .find(|member| member.user_id != user_id)
                    .ok_or_else(|| {
                        Error::bad_request(format!(
                            "Channel {} has no members other than {}.",
                            channel.id, user_id
                        ))
                    })?;
                Ok(format!("@{}", backend.get_user(&other.user_id)?.username))
            }
            ChannelType::Group => {
                let team = backend.get_team(team_id)?;
                let mut names = Vec::new();
                for member in backend.get_channel_members(&channel.id, 0, page_size)? {
                    if member.user_id != user_id {
                        names.push(backend.get_user(&member.user_id)?.username);
                    }
                }
                if names.is_empty() {
                    return Err(Error::bad_request(format!(
                        "Channel {} has no members other than user {}.",
                        channel.id, user_id
                    )));
                }
                Ok(format!(
                    "[Group Chat]({}/{}/messages/{}) with {}",
                    backend.site_url()?.trim_end_matches('/'),
                    team.name,
                    channel.name,
                    member_list(names)
                ))
            }
        }
    }
}

/// Sorted, abbreviated and joined group member names
fn member_list(mut names: Vec<String>) -> String {
    names.sort();
    if names.len() > MAX_GROUP_NAMES {
        let others = names.len() - (MAX_GROUP_NAMES - 1);
        names.truncate(MAX_GROUP_NAMES - 1);
        names.push(format!("{others} others"));
    }
    match names.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} and {}", rest.join(", "), last),
        _ => names.join(""),
    }
}

/// Channels first, then group chats, then direct messages
fn sort_mentions(mentions: &mut [String]) {
    fn category(mention: &str) -> u8 {
        if mention.starts_with('~') {
            0
        } else if mention.starts_with("[Group") {
            1
        } else if mention.starts_with('@') {
            2
        } else {
            3
        }
    }
    mentions.sort_by(|a, b| category(a).cmp(&category(b)).then_with(|| a.cmp(b)));
}

pub(super) fn help(service: &Service<'_>, _: &Invocation<'_>, _: &Captures<'_>) -> Result<CommandResponse> {
    Ok(CommandResponse::text(service.help_text()))
}

pub(super) fn upsert_picture(
    service: &Service<'_>,
    invocation: &Invocation<'_>,
    captures: &Captures<'_>,
) -> Result<CommandResponse> {
    let name = captures.get(2).map(|m| m.as_str());
    service.upsert(invocation, group(captures, 1), name, true)
}

pub(super) fn upsert_name(
    service: &Service<'_>,
    invocation: &Invocation<'_>,
    captures: &Captures<'_>,
) -> Result<CommandResponse> {
    service.upsert(invocation, group(captures, 1), Some(group(captures, 2)), false)
}

pub(super) fn delete(
    service: &Service<'_>,
    invocation: &Invocation<'_>,
    captures: &Captures<'_>,
) -> Result<CommandResponse> {
    let identifier = group(captures, 1);
    if is_me(identifier) {
        return Err(Error::bad_request(
            "Please do not try to delete yourself. Your real profile is not a character profile.",
        ));
    }
    let user_id = invocation.args.user_id.as_str();
    let profiles = service.services.profiles();
    if !profiles.profile_exists(user_id, identifier)? {
        return Err(Error::bad_request(format!(
            "Character profile `{identifier}` does not exist."
        )));
    }

    let count = service
        .services
        .posts()
        .count_posts_for_profile(user_id, identifier)?;
    if count > 0 && !invocation.confirmed {
        let text = format!(
            "Character profile `{identifier}` is still used by {count} messages. Are you sure you want to delete it? The messages keep their current name and picture, and recreating `{identifier}` later makes them follow it again."
        );
        return Ok(CommandResponse::with_attachments(
            "",
            ui::confirmation(
                service.config(),
                &text,
                &invocation.args.command,
                &invocation.args.root_id,
            ),
        ));
    }

    profiles.delete_profile(user_id, identifier)?;
    Ok(CommandResponse::text(format!(
        "Deleted character profile `{identifier}`."
    )))
}

pub(super) fn list(service: &Service<'_>, invocation: &Invocation<'_>, _: &Captures<'_>) -> Result<CommandResponse> {
    let attachments = service
        .services
        .profiles()
        .list_profiles(&invocation.args.user_id)?
        .iter()
        .map(|profile| service.attachment(profile))
        .collect::<Result<Vec<_>>>()?;
    Ok(CommandResponse::with_attachments("## Character profiles", attachments))
}

pub(super) fn i_am(
    service: &Service<'_>,
    invocation: &Invocation<'_>,
    captures: &Captures<'_>,
) -> Result<CommandResponse> {
    let identifier = group(captures, 1);
    let args = invocation.args;
    let profiles = service.services.profiles();
    let previous = profiles.get_default_profile(&args.user_id, &args.channel_id)?;

    if is_me(identifier) {
        if is_me(&previous) {
            return Ok(CommandResponse::text(
                "You are already yourself. Multiplicity was a fun movie, but let's leave it at that.",
            ));
        }
        profiles.remove_default_profile(&args.user_id, &args.channel_id)?;
        let me = profiles.get_profile(&args.user_id, "", Accept::ME)?;
        return Ok(CommandResponse::with_attachments(
            "You are now yourself again. Hope that feels ok.",
            vec![service.attachment(&me)?],
        ));
    }

    let profile = profiles.set_default_profile(&args.user_id, &args.channel_id, identifier)?;
    if previous == identifier {
        return Ok(CommandResponse::text(format!(
            "You are already \"{}\", and if that's not enough you should've rolled better stats.",
            profile.name
        )));
    }
    let text = format!("You are now known as \"{}\".", profile.name);
    let attachment = service.attachment(&ResolvedProfile::Character(profile))?;
    Ok(CommandResponse::with_attachments(text, vec![attachment]))
}

pub(super) fn who_am_i(service: &Service<'_>, invocation: &Invocation<'_>, _: &Captures<'_>) -> Result<CommandResponse> {
    let args = invocation.args;
    let profiles = service.services.profiles();
    let backend = service.services.backend();
    // Commands issued outside a team context carry no team id.
    let team_id = if args.team_id.is_empty() {
        backend.get_channel(&args.channel_id)?.team_id
    } else {
        args.team_id.clone()
    };
    let channels = backend.get_channels_for_team_for_user(&team_id, &args.user_id)?;

    let mut mentions: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for channel in &channels {
        let identifier = profiles.get_default_profile(&args.user_id, &channel.id)?;
        let mention = service.channel_mention(channel, &args.user_id, &team_id)?;
        mentions.entry(identifier).or_default().push(mention);
    }

    let mut resolved = mentions
        .keys()
        .map(|identifier| profiles.get_profile(&args.user_id, identifier, Accept::ALL))
        .collect::<Result<Vec<_>>>()?;
    sort_profiles(&mut resolved);

    let mut attachments = Vec::with_capacity(resolved.len());
    for profile in &resolved {
        let mut attachment = service.attachment(profile)?;
        if let Some(channel_mentions) = mentions.get_mut(profile.identifier()) {
            sort_mentions(channel_mentions);
            attachment.text.push_str("\nDefault profile in: ");
            attachment.text.push_str(&channel_mentions.join(", "));
        }
        attachments.push(attachment);
    }
    Ok(CommandResponse::with_attachments(
        "## Default character profiles",
        attachments,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_member_list() {
        assert_eq!(member_list(names(&["tintin"])), "tintin");
        assert_eq!(member_list(names(&["tintin", "haddock"])), "haddock and tintin");
        assert_eq!(
            member_list(names(&["tintin", "haddock", "milou"])),
            "haddock, milou and tintin"
        );
        assert_eq!(
            member_list(names(&["a", "b", "c", "d", "e"])),
            "a, b, c, d and e"
        );
        assert_eq!(
            member_list(names(&["f", "e", "d", "c", "b", "a"])),
            "a, b, c, d and 2 others"
        );
    }

    #[test]
    fn test_sort_mentions() {
        let mut mentions = names(&[
            "@tintin",
            "[Group Chat](x) with a and b",
            "~town-square",
            "@haddock",
            "~off-topic",
        ]);
        sort_mentions(&mut mentions);
        assert_eq!(
            mentions,
            names(&[
                "~off-topic",
                "~town-square",
                "[Group Chat](x) with a and b",
                "@haddock",
                "@tintin",
            ])
        );
    }
}
