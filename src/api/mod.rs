// =============================================================================
// Matrixon Character Profiles - API Module
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
//   HTTP surface of the plugin: bundled static pictures, request-keyed profile
//   pictures, and the confirm and echo endpoints behind interactive buttons.
//
// Features:
//   • Authenticated routes via a user id header
//   • Security headers on served pictures
//   • Blocking core calls moved off the async runtime
//
// =============================================================================

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::{header, HeaderName, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Router,
};
use chrono::{TimeZone, Utc};
use matrixon_characters_core::types::{
    PROP_FROM_WEBHOOK, PROP_OVERRIDE_ICON_URL, PROP_OVERRIDE_USERNAME,
};
use matrixon_characters_core::Post;
use serde::Deserialize;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, error, warn};

use crate::database::idset::is_valid_id;
use crate::plugin::Plugin;
use crate::service::commands::{ui, Attachment, CommandArgs};
use crate::service::profiles::{is_valid_identifier, Accept, ResolvedProfile};
use crate::Error;

const THUMBNAIL_CONTENT_TYPE: &str = "image/jpeg";

const UNSAFE_CONTENT_TYPES: [&str; 6] = [
    "application/javascript",
    "application/ecmascript",
    "text/javascript",
    "text/ecmascript",
    "application/x-javascript",
    "text/html",
];

/// Bundled pictures by route path
const STATIC_FILES: [(&str, &str); 6] = [
    ("botprofilepicture", "pluginicon.png"),
    ("botprofilepicture/thumbnail", "pluginicon-thumbnail.jpeg"),
    ("defaultprofilepicture", "character.png"),
    ("defaultprofilepicture/thumbnail", "character-thumbnail.jpeg"),
    ("corruptedprofilepicture", "no-sign.jpg"),
    ("corruptedprofilepicture/thumbnail", "no-sign-thumbnail.jpg"),
];

/// User id the host authenticated the request as
#[derive(Debug, Clone)]
struct AuthenticatedUser(String);

/// Plain-text error response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "404 page not found")
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.user_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("❌ {}: {}", self.status, self.message);
        }
        (self.status, self.message).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Routes relative to the plugin URL
pub fn router(plugin: Plugin) -> Router {
    Router::new()
        .route("/static/*path", get(static_file))
        .route("/profile/:user_id/:profile_id", get(profile_picture))
        .route("/profile/:user_id/:profile_id/thumbnail", get(profile_thumbnail))
        .route("/api/v1/confirm", post(confirm))
        .route("/api/v1/echo", post(echo))
        .layer(middleware::from_fn_with_state(plugin.clone(), require_user))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(tracing::Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(tracing::Level::DEBUG)),
        )
        .with_state(plugin)
}

async fn require_user(State(plugin): State<Plugin>, mut request: Request, next: Next) -> Response {
    let user_id = request
        .headers()
        .get(plugin.config().user_id_header.as_str())
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned);
    let Some(user_id) = user_id else {
        debug!("🔒 Rejected unauthenticated {}", request.uri().path());
        return (StatusCode::UNAUTHORIZED, "Not authorized").into_response();
    };
    request.extensions_mut().insert(AuthenticatedUser(user_id));
    next.run(request).await
}

/// Runs blocking core work on the blocking pool
async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|err| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Request worker failed: {err}"),
        )
    })?
}

async fn static_file(State(plugin): State<Plugin>, Path(path): Path<String>) -> ApiResult<Response> {
    let Some((_, file_name)) = STATIC_FILES.iter().find(|(route, _)| *route == path) else {
        return Err(ApiError::not_found());
    };
    let file = plugin.config().assets_dir().join(file_name);
    let contents = tokio::fs::read(&file).await.map_err(|err| {
        warn!("⚠️ Static picture {:?} unavailable: {}", file, err);
        ApiError::not_found()
    })?;
    let content_type = mime_guess::from_path(&file).first_or_octet_stream();
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CACHE_CONTROL, "public, max-age=3600".to_owned()),
        ],
        contents,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct PictureQuery {
    #[serde(default)]
    rk: String,
}

async fn profile_picture(
    State(plugin): State<Plugin>,
    Path((user_id, profile_id)): Path<(String, String)>,
    Query(query): Query<PictureQuery>,
) -> ApiResult<Response> {
    serve_picture(plugin, user_id, profile_id, query.rk, false).await
}

async fn profile_thumbnail(
    State(plugin): State<Plugin>,
    Path((user_id, profile_id)): Path<(String, String)>,
    Query(query): Query<PictureQuery>,
) -> ApiResult<Response> {
    serve_picture(plugin, user_id, profile_id, query.rk, true).await
}

/// Picture bytes and what the response needs to describe them
struct Picture {
    contents: Vec<u8>,
    content_type: String,
    file_name: String,
    update_at: i64,
}

async fn serve_picture(
    plugin: Plugin,
    user_id: String,
    profile_id: String,
    request_key: String,
    thumbnail: bool,
) -> ApiResult<Response> {
    if !is_valid_id(&user_id) || !is_valid_identifier(&profile_id) {
        return Err(ApiError::not_found());
    }
    let start = Instant::now();
    let picture = blocking(move || {
        load_picture(&plugin, &user_id, &profile_id, &request_key, thumbnail)
    })
    .await?;
    debug!("🖼️ Loaded {} in {:?}", picture.file_name, start.elapsed());

    let file_name = escape_file_name(&picture.file_name);
    let last_modified = Utc
        .timestamp_millis_opt(picture.update_at)
        .single()
        .unwrap_or_default()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();
    let headers: [(HeaderName, String); 7] = [
        (header::CACHE_CONTROL, "private, immutable, max-age=604800".to_owned()),
        (
            header::CONTENT_DISPOSITION,
            format!("inline;filename=\"{file_name}\"; filename*=UTF-8''{file_name}"),
        ),
        (header::CONTENT_SECURITY_POLICY, "frame-ancestors 'none'".to_owned()),
        (header::CONTENT_TYPE, picture.content_type),
        (header::LAST_MODIFIED, last_modified),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_owned()),
        (header::X_FRAME_OPTIONS, "DENY".to_owned()),
    ];
    Ok((headers, picture.contents).into_response())
}

fn load_picture(
    plugin: &Plugin,
    user_id: &str,
    profile_id: &str,
    request_key: &str,
    thumbnail: bool,
) -> ApiResult<Picture> {
    let resolved = plugin.services().profiles().get_profile(
        user_id,
        profile_id,
        Accept::CHARACTER | Accept::CORRUPT | Accept::NONEXISTENT,
    )?;
    let profile = match resolved {
        ResolvedProfile::Character(profile) => profile,
        ResolvedProfile::Nonexistent(..) => return Err(ApiError::not_found()),
        ResolvedProfile::Corrupt(..) => {
            return Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Profile corrupt"))
        }
        ResolvedProfile::Me(_) => {
            return Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Bug in profile status handling",
            ))
        }
    };
    if profile.request_key.is_empty() {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Profile image request key not set",
        ));
    }
    if profile.request_key != request_key {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "Invalid request key"));
    }
    let Some(file) = profile.picture else {
        return Err(ApiError::not_found());
    };

    let (path, content_type) = if thumbnail {
        (file.thumbnail_path.as_str(), THUMBNAIL_CONTENT_TYPE)
    } else {
        (file.path.as_str(), file.mime_type.as_str())
    };
    if path.is_empty() {
        return Err(ApiError::not_found());
    }
    let contents = plugin.backend().read_file(path)?;
    Ok(Picture {
        contents,
        content_type: safe_content_type(content_type),
        file_name: file.name.clone(),
        update_at: file.update_at,
    })
}

fn safe_content_type(content_type: &str) -> String {
    if content_type.is_empty() {
        return "application/octet-stream".to_owned();
    }
    if UNSAFE_CONTENT_TYPES
        .iter()
        .any(|unsafe_type| content_type.starts_with(unsafe_type))
    {
        return "text/plain".to_owned();
    }
    content_type.to_owned()
}

/// Percent-encodes a file name for use in a header
fn escape_file_name(name: &str) -> String {
    url::form_urlencoded::byte_serialize(name.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Body the host posts when an interactive button is pressed
#[derive(Debug, Deserialize)]
struct ActionRequest<C> {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    post_id: String,
    #[serde(default)]
    channel_id: String,
    #[serde(default)]
    team_id: String,
    context: C,
}

#[derive(Debug, Deserialize)]
struct ConfirmContext {
    command: String,
    #[serde(default)]
    root_id: String,
}

#[derive(Debug, Deserialize)]
struct EchoContext {
    message: String,
    #[serde(default)]
    root_id: String,
}

fn parse_action<C: serde::de::DeserializeOwned>(
    user: &AuthenticatedUser,
    body: &[u8],
) -> ApiResult<ActionRequest<C>> {
    let request: ActionRequest<C> = serde_json::from_slice(body)
        .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    if request.user_id != user.0 {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "User ID mismatch"));
    }
    Ok(request)
}

/// Ephemeral reply replacing the post that held the buttons
fn bot_reply(
    plugin: &Plugin,
    request: &ActionRequest<impl Sized>,
    root_id: &str,
    message: String,
    attachments: Vec<Attachment>,
) -> ApiResult<Post> {
    let site_url = plugin.backend().site_url()?;
    let mut post = Post {
        id: request.post_id.clone(),
        user_id: request.user_id.clone(),
        channel_id: request.channel_id.clone(),
        root_id: root_id.to_owned(),
        message,
        ..Default::default()
    };
    if !attachments.is_empty() {
        post.set_prop(
            "attachments",
            serde_json::to_value(attachments).map_err(Error::from)?,
        );
    }
    post.set_prop(PROP_OVERRIDE_USERNAME, plugin.config().bot_display_name.as_str());
    post.set_prop(
        PROP_OVERRIDE_ICON_URL,
        format!(
            "{}/static/botprofilepicture",
            plugin.config().plugin_url(&site_url)
        ),
    );
    post.set_prop(PROP_FROM_WEBHOOK, "true");
    Ok(post)
}

async fn confirm(
    State(plugin): State<Plugin>,
    Extension(user): Extension<AuthenticatedUser>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let request: ActionRequest<ConfirmContext> = parse_action(&user, &body)?;
    blocking(move || {
        let command = request.context.command.clone();
        let root_id = request.context.root_id.clone();
        let args = CommandArgs {
            command: command.clone(),
            user_id: request.user_id.clone(),
            channel_id: request.channel_id.clone(),
            team_id: request.team_id.clone(),
            root_id: root_id.clone(),
        };
        let (message, attachments) = match plugin.execute_command(&args, true) {
            Ok(response) => (response.text, response.attachments),
            Err(err) => (
                String::new(),
                ui::failure(
                    plugin.config(),
                    &format!("Command `{command}` failed:\n{}", err.user_message()),
                    &command,
                    &root_id,
                ),
            ),
        };
        let reply = bot_reply(&plugin, &request, &root_id, message, attachments)?;
        plugin
            .backend()
            .update_ephemeral_post(&request.user_id, &reply)?;
        Ok(StatusCode::OK)
    })
    .await
}

async fn echo(
    State(plugin): State<Plugin>,
    Extension(user): Extension<AuthenticatedUser>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let request: ActionRequest<EchoContext> = parse_action(&user, &body)?;
    blocking(move || {
        let reply = bot_reply(
            &plugin,
            &request,
            &request.context.root_id,
            request.context.message.clone(),
            Vec::new(),
        )?;
        plugin
            .backend()
            .update_ephemeral_post(&request.user_id, &reply)?;
        Ok(StatusCode::OK)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_safe_content_type() {
        assert_eq!(safe_content_type(""), "application/octet-stream");
        assert_eq!(safe_content_type("image/png"), "image/png");
        assert_eq!(safe_content_type("text/html; charset=utf-8"), "text/plain");
        assert_eq!(safe_content_type("application/javascript"), "text/plain");
    }

    #[test]
    fn test_escape_file_name() {
        assert_eq!(escape_file_name("haddock.png"), "haddock.png");
        assert_eq!(escape_file_name("captain haddock.png"), "captain%20haddock.png");
        assert_eq!(escape_file_name("a\"b.png"), "a%22b.png");
    }
}
