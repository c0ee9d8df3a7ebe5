// =============================================================================
// Matrixon Character Profiles - Main Entry Point
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
//   Binary driving the character profile plugin against an in-memory host
//   whose state lives in a JSON file, for local use and demos.
//
// Features:
//   • Figment configuration with command line overrides
//   • Slash commands, posting and editing through the plugin hooks
//   • HTTP serving with graceful shutdown
//
// =============================================================================

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail, Context};
use axum::Router;
use matrixon_characters::service::commands::{CommandArgs, CommandResponse};
use matrixon_characters::service::host::{Host, HostDirectory, MemoryHost};
use matrixon_characters::{Channel, FileInfo, Plugin, PluginConfig, Post, Team, User};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

mod clap;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = clap::parse();

    let mut config = PluginConfig::load(args.config.as_deref())
        .context("It looks like your config is invalid")?;
    if let Some(level) = args.log_level {
        config.log = level;
    }
    init_tracing(&config.log);
    debug!("🔧 Configuration: {:?}", config);

    match args.command {
        clap::Commands::Init {
            site_url,
            users,
            force,
        } => init(&args.state, &site_url, &users, force),
        clap::Commands::Exec {
            user,
            channel,
            team,
            root,
            confirm,
            command,
        } => {
            let host = Arc::new(open_host(&args.state)?);
            let plugin = Plugin::new(host.clone(), config);
            let command_args = CommandArgs {
                command,
                user_id: user,
                channel_id: channel,
                team_id: team,
                root_id: root,
            };
            let response = plugin
                .execute_command(&command_args, confirm)
                .map_err(|err| anyhow!(err.user_message()))?;
            print_response(&response);
            host.save(&args.state)?;
            Ok(())
        }
        clap::Commands::Post {
            user,
            channel,
            root,
            file,
            message,
        } => {
            let host = Arc::new(open_host(&args.state)?);
            let plugin = Plugin::new(host.clone(), config);
            let mut post = Post::new(&user, &channel, &message);
            post.root_id = root;
            if let Some(path) = file {
                post.file_ids.push(upload(&host, &path)?);
            }
            let post = plugin
                .message_will_be_posted(&post)
                .map_err(|err| anyhow!(err.user_message()))?
                .unwrap_or(post);
            let post = host.create_post(post)?;
            plugin.message_has_been_posted(&post);
            println!("{}", serde_json::to_string_pretty(&post)?);
            host.save(&args.state)?;
            Ok(())
        }
        clap::Commands::Edit { post_id, message } => {
            let host = Arc::new(open_host(&args.state)?);
            let plugin = Plugin::new(host.clone(), config);
            let mut post = host.get_post(&post_id)?;
            post.message = message;
            let post = plugin
                .message_will_be_updated(&post)
                .map_err(|err| anyhow!(err.user_message()))?
                .unwrap_or(post);
            let post = host.update_post(&post)?;
            plugin.message_has_been_updated(&post);
            println!("{}", serde_json::to_string_pretty(&post)?);
            host.save(&args.state)?;
            Ok(())
        }
        clap::Commands::Reindex { user } => {
            let host = Arc::new(open_host(&args.state)?);
            let plugin = Plugin::new(host.clone(), config);
            let identifiers = plugin.services().profiles().reindex(&user)?;
            println!("{}", identifiers.join("\n"));
            host.save(&args.state)?;
            Ok(())
        }
        clap::Commands::Serve {
            address,
            port,
            site_url,
        } => {
            if let Some(address) = address {
                config.address = address;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(&args.state, site_url.as_deref(), config).await
        }
    }
}

fn init_tracing(log: &str) {
    let filter_layer = match EnvFilter::try_new(log) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("It looks like your log filter is invalid. The following error occurred while parsing it: {e}");
            EnvFilter::new("warn")
        }
    };
    let subscriber = tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("A tracing subscriber was already installed");
    }
}

fn open_host(state: &Path) -> anyhow::Result<MemoryHost> {
    MemoryHost::load(state).with_context(|| {
        format!(
            "Could not open state file {}. Create one with `init` first.",
            state.display()
        )
    })
}

fn init(state: &Path, site_url: &str, usernames: &[String], force: bool) -> anyhow::Result<()> {
    if state.exists() && !force {
        bail!(
            "State file {} already exists. Pass --force to overwrite it.",
            state.display()
        );
    }
    let host = MemoryHost::new(HostDirectory::new(site_url));
    let team = Team {
        id: host.new_id(),
        name: "matrixon".to_owned(),
    };
    let channel = Channel {
        id: host.new_id(),
        team_id: team.id.clone(),
        name: "town-square".to_owned(),
        display_name: "Town Square".to_owned(),
        ..Default::default()
    };
    let mut directory = HostDirectory::new(site_url)
        .with_team(team.clone())
        .with_channel(channel.clone());
    let mut users = Vec::new();
    for username in usernames {
        let user = User {
            id: host.new_id(),
            username: username.clone(),
            ..Default::default()
        };
        directory = directory.with_user(user.clone()).with_member(&channel.id, &user.id);
        users.push(user);
    }
    MemoryHost::new(directory).save(state)?;

    info!("✅ Created {}", state.display());
    println!("team     {} {}", team.id, team.name);
    println!("channel  {} {}", channel.id, channel.name);
    for user in users {
        println!("user     {} {}", user.id, user.username);
    }
    Ok(())
}

/// Stores a file on the host and returns its id
fn upload(host: &MemoryHost, path: &Path) -> anyhow::Result<String> {
    let contents =
        std::fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;
    let id = host.new_id();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| id.clone());
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let stored_path = format!("files/{id}/{name}");
    host.add_file(
        FileInfo {
            id: id.clone(),
            name,
            extension,
            mime_type: mime_guess::from_path(path).first_or_octet_stream().to_string(),
            // The memory host does not scale pictures
            thumbnail_path: stored_path.clone(),
            path: stored_path,
            update_at: chrono::Utc::now().timestamp_millis(),
            ..Default::default()
        },
        contents,
    )?;
    Ok(id)
}

fn print_response(response: &CommandResponse) {
    if !response.text.is_empty() {
        println!("{}", response.text);
    }
    for attachment in &response.attachments {
        println!();
        if !attachment.title.is_empty() {
            println!("[{}]", attachment.title);
        }
        println!("{}", attachment.text);
        if !attachment.thumb_url.is_empty() {
            println!("picture: {}", attachment.thumb_url);
        }
    }
    if response.is_prompt() {
        println!();
        println!("Run the command again with --confirm to go ahead.");
    }
}

async fn serve(state: &Path, site_url: Option<&str>, config: PluginConfig) -> anyhow::Result<()> {
    let start = Instant::now();
    let host = Arc::new(open_host(state)?);
    if let Some(site_url) = site_url {
        host.set_site_url(site_url)?;
    }
    let addr = SocketAddr::new(config.address, config.port);
    let base = format!("/plugins/{}", config.plugin_id);
    let plugin = Plugin::new(host.clone(), config);
    let app = Router::new().nest(&base, plugin.router());

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Could not bind {addr}"))?;
    info!("🚀 Serving {} on http://{} (ready in {:?})", base, addr, start.elapsed());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    host.save(state)?;
    info!("💾 Saved state to {}", state.display());
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to install signal handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let sig: &str;

    tokio::select! {
        _ = ctrl_c => { sig = "Ctrl+C"; },
        _ = terminate => { sig = "SIGTERM"; },
    }

    warn!("Received {}, shutting down...", sig);
}
