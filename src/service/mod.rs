// =============================================================================
// Matrixon Character Profiles - Service Module
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
//   Core business logic for character profiles, bundled per request over a
//   borrowed backend and configuration snapshot.
//
// Features:
//   • Profile store
//   • Backlink index and message rewriting
//   • Slash command handling and merge protocol
//
// =============================================================================

use matrixon_characters_core::PluginConfig;

pub mod commands;
pub mod host;
pub mod posts;
pub mod profiles;

use host::Backend;

/**
 * Central service container for one request.
 *
 * Services hold no state of their own: every call goes through the borrowed
 * backend, and the configuration is an immutable snapshot handed in by the
 * caller. Building a container is free, so callers create one per hook or
 * command invocation.
 *
 * # Service Architecture
 * - `profiles`: profile records, listing and channel default bindings
 * - `posts`: per-message profile resolution, backlinks and bulk rewrites
 * - `commands`: the `/character` slash command and its confirmations
 */
#[derive(Clone, Copy)]
pub struct Services<'a> {
    backend: &'a dyn Backend,
    config: &'a PluginConfig,
}

impl<'a> Services<'a> {
    pub fn new(backend: &'a dyn Backend, config: &'a PluginConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &'a dyn Backend {
        self.backend
    }

    pub fn config(&self) -> &'a PluginConfig {
        self.config
    }

    pub fn profiles(&self) -> profiles::Service<'a> {
        profiles::Service::new(self.backend, self.config)
    }

    pub fn posts(&self) -> posts::Service<'a> {
        posts::Service::new(self.backend, self.config)
    }

    pub fn commands(&self) -> commands::Service<'a> {
        commands::Service::new(*self)
    }
}
