// =============================================================================
// Matrixon Character Profiles - Plugin Glue
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
//   Host-facing entry points: message hooks, slash command execution and the
//   HTTP router, all sharing one backend and configuration snapshot.
//
// Features:
//   • Message create and edit hooks
//   • Command execution with confirmation support
//   • Router construction for the plugin HTTP surface
//
// =============================================================================

use std::sync::Arc;

use axum::Router;
use matrixon_characters_core::{PluginConfig, Post};
use tracing::{debug, instrument, warn};

use crate::service::commands::{CommandArgs, CommandResponse};
use crate::service::host::Backend;
use crate::service::Services;
use crate::Result;

/// A running plugin instance
#[derive(Clone)]
pub struct Plugin {
    backend: Arc<dyn Backend>,
    config: Arc<PluginConfig>,
}

impl Plugin {
    pub fn new(backend: Arc<dyn Backend>, config: PluginConfig) -> Self {
        Self {
            backend,
            config: Arc::new(config),
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn services(&self) -> Services<'_> {
        Services::new(self.backend.as_ref(), &self.config)
    }

    /// Runs before a new post is stored. `Ok(None)` lets it through as is;
    /// an error rejects it.
    #[instrument(level = "debug", skip(self, post), fields(user_id = %post.user_id))]
    pub fn message_will_be_posted(&self, post: &Post) -> Result<Option<Post>> {
        self.services().posts().profiled_post(post, false)
    }

    /// Runs before an edit is stored
    #[instrument(level = "debug", skip(self, post), fields(post_id = %post.id))]
    pub fn message_will_be_updated(&self, post: &Post) -> Result<Option<Post>> {
        self.services().posts().profiled_post(post, true)
    }

    /// Runs after a post is stored, once it has an id
    pub fn message_has_been_posted(&self, post: &Post) {
        self.register(post);
    }

    pub fn message_has_been_updated(&self, post: &Post) {
        self.register(post);
    }

    fn register(&self, post: &Post) {
        // The post is already stored, so there is nobody to report to.
        if let Err(err) = self.services().posts().register_post(post) {
            warn!("⚠️ Failed to index post {}: {}", post.id, err);
        }
    }

    /// Executes a slash command
    pub fn execute_command(&self, args: &CommandArgs, confirmed: bool) -> Result<CommandResponse> {
        let response = self.services().commands().execute(args, confirmed);
        if let Err(err) = &response {
            debug!("❌ Command `{}` failed: {}", args.command, err);
        }
        response
    }

    /// HTTP routes, relative to the plugin URL
    pub fn router(&self) -> Router {
        crate::api::router(self.clone())
    }
}
