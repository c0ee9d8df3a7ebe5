// =============================================================================
// Matrixon Character Profiles - Command Line Interface
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
//   Arguments of the `matrixon-characters` binary, which drives the plugin
//   against an in-memory host persisted as a JSON state file.
//
// Features:
//   • Global config, state and log level options
//   • Subcommands for commands, posting, editing, reindexing and serving
//
// =============================================================================

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::{debug, instrument};

#[instrument(level = "debug")]
pub fn version() -> String {
    let start = Instant::now();
    let cargo_pkg_version = env!("CARGO_PKG_VERSION");

    let result = match option_env!("MATRIXON_CHARACTERS_VERSION_EXTRA") {
        Some(x) => format!("{} ({})", cargo_pkg_version, x),
        None => cargo_pkg_version.to_owned(),
    };

    debug!("✅ Version string generated in {:?}: {}", start.elapsed(), result);
    result
}

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[clap(about, version = version(), name = "matrixon-characters")]
pub struct Args {
    /// Path to configuration file
    #[clap(short, long, global = true, env = "CHARACTERS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Host state file
    #[clap(
        short,
        long,
        global = true,
        env = "CHARACTERS_STATE",
        default_value = "characters-state.json"
    )]
    pub state: PathBuf,

    /// Log filter override
    #[clap(short, long, global = true)]
    pub log_level: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Create a fresh state file with a team, a channel and users
    Init {
        /// Base URL of the chat site
        #[clap(long, default_value = "http://localhost:8065")]
        site_url: String,

        /// Usernames to create, all joined to the channel
        #[clap(long = "user", required = true)]
        users: Vec<String>,

        /// Overwrite an existing state file
        #[clap(long)]
        force: bool,
    },

    /// Run a slash command, e.g. `exec --user <id> --channel <id> "/character list"`
    Exec {
        #[clap(long)]
        user: String,

        #[clap(long)]
        channel: String,

        #[clap(long, default_value = "")]
        team: String,

        /// Thread root the command is issued in
        #[clap(long, default_value = "")]
        root: String,

        /// Answer yes to any confirmation prompt
        #[clap(long)]
        confirm: bool,

        command: String,
    },

    /// Post a message through the plugin hooks
    Post {
        #[clap(long)]
        user: String,

        #[clap(long)]
        channel: String,

        #[clap(long, default_value = "")]
        root: String,

        /// Attach a file from disk to the post
        #[clap(long)]
        file: Option<PathBuf>,

        message: String,
    },

    /// Edit a message through the plugin hooks
    Edit {
        post_id: String,

        message: String,
    },

    /// Rebuild the profile list of a user from the stored profiles
    Reindex {
        #[clap(long)]
        user: String,
    },

    /// Serve the plugin HTTP routes
    Serve {
        #[clap(long)]
        address: Option<IpAddr>,

        #[clap(long)]
        port: Option<u16>,

        /// Public URL of the chat site, stored in the state file
        #[clap(long)]
        site_url: Option<String>,
    },
}

/// Parse commandline arguments into structured data
#[must_use]
pub fn parse() -> Args {
    Args::parse()
}
