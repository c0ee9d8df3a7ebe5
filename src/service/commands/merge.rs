// =============================================================================
// Matrixon Character Profiles - Merge Protocol
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
//   `make <source> into <target>`: moves every message of one character profile
//   to another profile, or renames it when the target does not exist yet.
//
// Features:
//   • Source checked before target, every status covered
//   • Confirmation before anything is written
//
// =============================================================================

use regex::Captures;
use tracing::{info, instrument};

use super::{group, ui, CommandResponse, Invocation, Service};
use crate::service::profiles::{is_me, Accept, ResolvedProfile};
use crate::{Error, Result};

/// What a confirmed merge will do
#[derive(Clone, Copy)]
enum Plan {
    /// Target exists; messages move, source is deleted
    Merge,
    /// Target is the real profile
    IntoMe,
    /// Target does not exist; it is created from the source first
    Rename,
}

#[instrument(level = "debug", skip_all, fields(query = %invocation.query))]
pub(super) fn make_into(
    service: &Service<'_>,
    invocation: &Invocation<'_>,
    captures: &Captures<'_>,
) -> Result<CommandResponse> {
    let from = group(captures, 1);
    let to = group(captures, 2);
    let user_id = invocation.args.user_id.as_str();
    let profiles = service.services.profiles();
    let posts = service.services.posts();

    if is_me(from) {
        return Err(Error::bad_request(
            "Cannot make your real profile into something else. Use the built-in functionality to change the display name or profile picture for your real profile.",
        ));
    }
    if from == to {
        return Err(Error::bad_request(format!("Cannot make `{from}` into itself.")));
    }

    let source = profiles.get_profile(user_id, from, Accept::ALL)?;
    let target = profiles.get_profile(user_id, to, Accept::ALL)?;
    let source_count = posts.count_posts_for_profile(user_id, from)?;
    let target_count = if is_me(to) {
        0
    } else {
        posts.count_posts_for_profile(user_id, to)?
    };

    match (&source, source_count) {
        (ResolvedProfile::Character(_), 0) => {
            return Err(Error::bad_request(format!(
                "Character profile `{from}` isn't used by any messages. You can delete it with `/{} delete {from}`.",
                service.config().trigger
            )));
        }
        (ResolvedProfile::Character(_), _) => {}
        (ResolvedProfile::Me(_), _) => {
            return Err(Error::bad_request(
                "Cannot make your real profile into something else. Use the built-in functionality to change the display name or profile picture for your real profile.",
            ));
        }
        (ResolvedProfile::Corrupt(..), 0) => {
            return Err(Error::bad_request(format!(
                "Character profile `{from}` is corrupt, and isn't used by any messages. You can delete it with `/{} delete {from}`.",
                service.config().trigger
            )));
        }
        (ResolvedProfile::Corrupt(..), count) => {
            return Err(Error::bad_request(format!(
                "Character profile `{from}` is corrupt, but is still used by {count} messages. Before you try to make this character profile into something else, you need to delete and recreate it. The messages will not be affected by deleting the profile."
            )));
        }
        (ResolvedProfile::Nonexistent(..), 0) => {
            return Err(Error::bad_request(format!(
                "Character profile `{from}` doesn't exist, and isn't used by any messages."
            )));
        }
        (ResolvedProfile::Nonexistent(..), count) => {
            return Err(Error::bad_request(format!(
                "Character profile `{from}` doesn't exist, but is still used by {count} messages. Create a character profile with this identifier in order to manage those messages."
            )));
        }
    }

    let plan = match (&target, target_count) {
        (ResolvedProfile::Character(_), _) => Plan::Merge,
        (ResolvedProfile::Me(_), _) => Plan::IntoMe,
        (ResolvedProfile::Corrupt(..), _) => {
            return Err(Error::bad_request(format!(
                "Target character profile `{to}` is corrupt."
            )));
        }
        (ResolvedProfile::Nonexistent(..), 0) => Plan::Rename,
        (ResolvedProfile::Nonexistent(..), count) => {
            return Err(Error::bad_request(format!(
                "Target character profile `{to}` doesn't exist, but since it is still used by {count} messages you must recreate it before you can make another character profile into it."
            )));
        }
    };

    if !invocation.confirmed {
        let text = match plan {
            Plan::Merge => format!(
                "Are you sure you want to make character profile `{from}` into `{to}`? All {source_count} messages that use `{from}` will use `{to}` instead, and `{from}` will be deleted. This cannot be undone."
            ),
            Plan::IntoMe => format!(
                "Are you sure you want to make character profile `{from}` into your real profile? All {source_count} messages that use `{from}` will use your real profile instead, and `{from}` will be deleted. This cannot be undone."
            ),
            Plan::Rename => format!(
                "Change the identifier of character profile `{from}` to `{to}`? All {source_count} messages that use `{from}` will use `{to}` instead."
            ),
        };
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

    if let Plan::Rename = plan {
        let mut renamed = source.profile().clone();
        renamed.identifier = to.to_owned();
        profiles.set_profile(&mut renamed)?;
    }
    let summary = posts.rewrite_posts_for_profile(user_id, from, to)?;
    profiles.delete_profile(user_id, from)?;
    info!(
        "🔀 Made `{}` into `{}` for {} ({} message(s) rewritten)",
        from, to, user_id, summary.rewritten
    );

    let result = profiles.get_profile(user_id, to, Accept::CHARACTER | Accept::ME)?;
    let text = match plan {
        Plan::Merge => format!(
            "All messages that used character profile `{from}` now use character profile `{to}` instead. Character profile `{from}` has been deleted."
        ),
        Plan::IntoMe => format!(
            "All messages that used character profile `{from}` now use your real profile instead. Character profile `{from}` has been deleted."
        ),
        Plan::Rename => format!("Changed identifier for character profile `{from}` to `{to}`."),
    };
    Ok(CommandResponse::with_attachments(
        text,
        vec![service.attachment(&result)?],
    ))
}
