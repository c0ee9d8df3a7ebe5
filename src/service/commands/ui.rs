// =============================================================================
// Matrixon Character Profiles - Command UI
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
//   Message attachments shown in ephemeral command replies: profile cards and
//   interactive confirmation or retry prompts.
//
// Features:
//   • Profile cards per status
//   • Cancel and confirm buttons wired to the plugin HTTP surface
//
// =============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use matrixon_characters_core::PluginConfig;

use crate::service::profiles::ResolvedProfile;

const COLOR_CHARACTER: &str = "#5c66ff";
const COLOR_ME: &str = "#009900";
const COLOR_ALERT: &str = "#ff0000";

/// Rich attachment on a reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    pub text: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thumb_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

/// Button on an attachment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub style: String,
    pub integration: Integration,
}

/// Request the host sends to the plugin when a button is pressed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub url: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// Card describing a profile; `thumb_url` is its thumbnail icon
pub fn profile_attachment(profile: &ResolvedProfile, thumb_url: String) -> Attachment {
    let (text, color) = match profile {
        ResolvedProfile::Character(p) => (
            format!("**{}**\n`{}`", p.name, p.identifier),
            COLOR_CHARACTER,
        ),
        ResolvedProfile::Me(p) => (
            format!("**{}** *(your real profile)*\n`me`, `myself`", p.name),
            COLOR_ME,
        ),
        ResolvedProfile::Corrupt(p, err) => (
            format!(
                "**{}** *(corrupt profile)*\n`{}`\nError: {}",
                p.name,
                p.identifier,
                err.user_message()
            ),
            COLOR_ALERT,
        ),
        ResolvedProfile::Nonexistent(p, _) => (
            format!("*(profile does not exist)*\n`{}`", p.identifier),
            COLOR_ALERT,
        ),
    };
    Attachment {
        text,
        color: color.to_owned(),
        thumb_url,
        ..Default::default()
    }
}

/// Prompt asking the user to confirm `command` before it runs
pub fn confirmation(config: &PluginConfig, text: &str, command: &str, root_id: &str) -> Vec<Attachment> {
    prompt(config, "Warning", text, command, "Yes", root_id)
}

/// Prompt reporting that `command` failed, offering to run it again
pub fn failure(config: &PluginConfig, text: &str, command: &str, root_id: &str) -> Vec<Attachment> {
    prompt(config, "Error", text, command, "Try again", root_id)
}

fn prompt(
    config: &PluginConfig,
    title: &str,
    text: &str,
    command: &str,
    yes_label: &str,
    root_id: &str,
) -> Vec<Attachment> {
    let mut cancel = Map::new();
    cancel.insert(
        "message".to_owned(),
        Value::from(format!("Canceled command `{command}`.")),
    );
    cancel.insert("root_id".to_owned(), Value::from(root_id));

    let mut confirm = Map::new();
    confirm.insert("command".to_owned(), Value::from(command));
    confirm.insert("root_id".to_owned(), Value::from(root_id));

    vec![Attachment {
        title: title.to_owned(),
        text: text.to_owned(),
        color: COLOR_ALERT.to_owned(),
        actions: vec![
            Action {
                name: "Cancel".to_owned(),
                style: "primary".to_owned(),
                integration: Integration {
                    url: format!("/plugins/{}/api/v1/echo", config.plugin_id),
                    context: cancel,
                },
            },
            Action {
                name: yes_label.to_owned(),
                style: "danger".to_owned(),
                integration: Integration {
                    url: format!("/plugins/{}/api/v1/confirm", config.plugin_id),
                    context: confirm,
                },
            },
        ],
        ..Default::default()
    }]
}
