// =============================================================================
// Matrixon Character Profiles - Commands Module
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
//   The slash command surface: an ordered table of pattern rules evaluated
//   top to bottom, first match wins, with an unrecognized-command fallback.
//
// Features:
//   • Profile create, modify, delete and listing
//   • Channel default bindings
//   • Merge protocol with confirmation prompts
//
// =============================================================================

mod handlers;
mod merge;
pub mod ui;

use std::time::Instant;

use matrixon_characters_core::PluginConfig;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

pub use ui::{Action, Attachment, Integration};

use crate::service::Services;
use crate::{Error, Result};

const HELP_TEXT: &str = include_str!("help.md");

/// Arguments of a slash command invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandArgs {
    /// Full command text, trigger included
    pub command: String,
    pub user_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub team_id: String,
    /// Thread root the command was issued in, empty outside threads
    #[serde(default)]
    pub root_id: String,
}

/// Ephemeral reply to a command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl CommandResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            text: text.into(),
            attachments,
        }
    }

    /// True when the reply asks for confirmation instead of reporting a result
    pub fn is_prompt(&self) -> bool {
        self.attachments.iter().any(|a| !a.actions.is_empty())
    }
}

/// A command being handled
pub struct Invocation<'i> {
    pub args: &'i CommandArgs,
    /// Command text after the trigger
    pub query: &'i str,
    /// Set when the user already answered a confirmation prompt
    pub confirmed: bool,
}

type Handler = fn(&Service<'_>, &Invocation<'_>, &Captures<'_>) -> Result<CommandResponse>;

struct Rule {
    pattern: Regex,
    handler: Handler,
}

fn rule(pattern: &str, handler: Handler) -> Rule {
    Rule {
        pattern: Regex::new(pattern).expect("valid regex"),
        handler,
    }
}

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule(r"^(?:help|--help|h|-h)$", handlers::help),
        rule(r"^picture ([a-z]+)(?:=(.*))?$", handlers::upsert_picture),
        rule(r"^([a-z]+)=(.*)$", handlers::upsert_name),
        rule(r"^delete ([a-z]+)$", handlers::delete),
        rule(r"^make ([a-z]+) into ([a-z]+)$", merge::make_into),
        rule(r"^list$", handlers::list),
        rule(r"^I am ([a-z]+)$", handlers::i_am),
        rule(r"^who am I$", handlers::who_am_i),
    ]
});

/// Capture group `index`, empty when it did not participate
fn group<'h>(captures: &Captures<'h>, index: usize) -> &'h str {
    captures.get(index).map_or("", |m| m.as_str())
}

#[derive(Clone, Copy)]
pub struct Service<'a> {
    services: Services<'a>,
}

impl<'a> Service<'a> {
    pub fn new(services: Services<'a>) -> Self {
        Self { services }
    }

    fn config(&self) -> &'a PluginConfig {
        self.services.config()
    }

    /// Runs a slash command. `confirmed` is set when the command comes back
    /// from a confirmation prompt.
    #[instrument(level = "debug", skip(self, args), fields(user_id = %args.user_id, command = %args.command))]
    pub fn execute(&self, args: &CommandArgs, confirmed: bool) -> Result<CommandResponse> {
        let start = Instant::now();
        let trigger = format!("/{} ", self.config().trigger);
        let query = args.command.strip_prefix(&trigger).ok_or_else(|| {
            Error::bad_request(format!(
                "Expected trigger /{} but got {}",
                self.config().trigger,
                args.command
            ))
        })?;

        let invocation = Invocation {
            args,
            query,
            confirmed,
        };
        for rule in RULES.iter() {
            let Some(captures) = rule.pattern.captures(query) else {
                continue;
            };
            debug!("🔧 `{}` matched {}", query, rule.pattern);
            let response = (rule.handler)(self, &invocation, &captures)?;
            metrics::counter!("characters_commands_total").increment(1);
            info!(
                "✅ Executed `{}` for {} in {:?}",
                query,
                args.user_id,
                start.elapsed()
            );
            return Ok(response);
        }

        Err(Error::bad_request(format!(
            "Unrecognized command. Try `/{} help`.",
            self.config().trigger
        )))
    }

    fn help_text(&self) -> String {
        HELP_TEXT.replace("/character ", &format!("/{} ", self.config().trigger))
    }
}
