// =============================================================================
// Matrixon Character Profiles - Config Module
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
//   Plugin configuration. A snapshot is loaded once by the binary and passed
//   explicitly to every operation.
//
// Features:
//   • Defaults, TOML file and CHARACTERS_ environment layers via figment
//   • Compare-and-swap retry tuning
//   • HTTP bind address and asset bundle location
//
// =============================================================================

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use matrixon_characters_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "CHARACTERS_";

/// Plugin configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Plugin id, part of every plugin URL
    pub plugin_id: String,

    /// Slash command trigger word, without the slash
    pub trigger: String,

    /// Name shown on ephemeral replies
    pub bot_display_name: String,

    /// Plugin bundle directory; static pictures live in `<bundle_path>/assets`
    pub bundle_path: PathBuf,

    /// Address the HTTP surface binds to
    pub address: IpAddr,

    /// Port the HTTP surface binds to
    pub port: u16,

    /// Header carrying the authenticated user id on plugin HTTP requests
    pub user_id_header: String,

    /// Tracing filter directive
    pub log: String,

    /// String set compare-and-swap tuning
    pub cas: CasConfig,

    /// Page size when enumerating KV keys
    pub kv_list_page_size: usize,

    /// Page size when enumerating channel members
    pub channel_members_page_size: usize,
}

/// Retry policy for string set compare-and-swap cycles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CasConfig {
    /// Read-modify-write cycles attempted before giving up, at least 1
    pub max_attempts: u32,

    /// Delay after the first lost race, in milliseconds
    pub initial_backoff_ms: u64,

    /// Upper bound for the doubling delay, in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            plugin_id: "com.matrixon.character-profiles".to_string(),
            trigger: "character".to_string(),
            bot_display_name: "Character Profiles".to_string(),
            bundle_path: PathBuf::from("."),
            address: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 8065,
            user_id_header: "Mattermost-User-ID".to_string(),
            log: "info".to_string(),
            cas: CasConfig::default(),
            kv_list_page_size: 100,
            channel_members_page_size: 100,
        }
    }
}

impl Default for CasConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 2,
            max_backoff_ms: 50,
        }
    }
}

impl CasConfig {
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms))
    }
}

impl PluginConfig {
    /// Layers the defaults, the optional TOML file and `CHARACTERS_*`
    /// environment variables (`__` separates nested keys).
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(PluginConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        debug!("🔧 Loading plugin configuration from {:?}", path);
        let config: PluginConfig = Self::figment(path)
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.plugin_id.is_empty() {
            return Err(Error::Config("plugin_id must not be empty".to_string()));
        }
        if self.trigger.is_empty() || self.trigger.contains(char::is_whitespace) {
            return Err(Error::Config(format!(
                "trigger must be a single word, got {:?}",
                self.trigger
            )));
        }
        if self.kv_list_page_size == 0 || self.channel_members_page_size == 0 {
            return Err(Error::Config("page sizes must be positive".to_string()));
        }
        Ok(())
    }

    /// Directory holding the bundled static pictures
    pub fn assets_dir(&self) -> PathBuf {
        self.bundle_path.join("assets")
    }

    /// `<site>/plugins/<plugin_id>`
    pub fn plugin_url(&self, site_url: &str) -> String {
        format!("{}/plugins/{}", site_url.trim_end_matches('/'), self.plugin_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use test_log::test;

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = PluginConfig::load(None).expect("defaults load");
            assert_eq!(config, PluginConfig::default());
            assert_eq!(config.cas.attempts(), 5);
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "characters.toml",
                r#"
                    plugin_id = "com.example.characters"
                    port = 9000

                    [cas]
                    max_attempts = 2
                "#,
            )?;
            jail.set_env("CHARACTERS_PORT", "9100");
            jail.set_env("CHARACTERS_CAS__MAX_BACKOFF_MS", "7");

            let config = PluginConfig::load(Some(Path::new("characters.toml"))).expect("load");
            assert_eq!(config.plugin_id, "com.example.characters");
            assert_eq!(config.port, 9100);
            assert_eq!(config.cas.max_attempts, 2);
            assert_eq!(config.cas.max_backoff_ms, 7);
            assert_eq!(config.cas.initial_backoff_ms, 2);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_trigger_is_rejected() {
        let config = PluginConfig {
            trigger: "two words".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_plugin_url() {
        let config = PluginConfig::default();
        assert_eq!(
            config.plugin_url("https://chat.example.com/"),
            "https://chat.example.com/plugins/com.matrixon.character-profiles"
        );
    }
}
