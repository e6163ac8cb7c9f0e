//! HTTP surface of the coverage store.
//!
//! ## Routes
//!
//! ```text
//! GET  /                 report root
//! GET  /show?p=<path>    report page of a file or directory
//! POST /reset            restore baselines (GET too with `reset_on_get`)
//! GET  /object           raw coverage map as JSON
//! GET  /download         coverage.zip bundle
//! POST /client           merge coverage posted by a browser
//! GET  /asset/<name>     report stylesheets and scripts
//! ```
//!
//! The router can be nested under any prefix; page links are built from the
//! original request URI so they keep pointing inside the mount.

#![allow(clippy::unused_async)]
#![allow(clippy::missing_errors_doc)]

pub mod client;

pub use client::{
    default_matcher, default_path_transformer, instrument_client_scripts, ClientHandler,
    ClientOptions,
};

use crate::context::CoverageContext;
use crate::export::{package, ARCHIVE_FILE_NAME};
use crate::model::coverage_map_from_value;
use crate::render::{render, Rendered, NO_COVERAGE_MESSAGE};
use crate::report::assets;
use crate::result::{CoverageError, CoverageResult};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, OriginalUri, Path as UrlPath, Query, State},
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Largest accepted request body (100 MiB)
pub const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

/// Rejection body for `/client` posts that are not a JSON object
pub const CLIENT_BODY_MESSAGE: &str = "Please post an object with content-type: application/json";

/// Options of the coverage handler
#[derive(Debug, Clone, Default)]
pub struct HandlerOptions {
    /// Log every request served
    pub verbose: bool,
    /// Also accept `GET /reset`
    pub reset_on_get: bool,
    /// Directory whose files take precedence over the embedded assets
    pub assets_dir: Option<PathBuf>,
}

impl HandlerOptions {
    /// Default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable verbose request logging
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Accept `GET /reset`
    #[must_use]
    pub const fn reset_on_get(mut self, enabled: bool) -> Self {
        self.reset_on_get = enabled;
        self
    }

    /// Serve assets from `dir` before the embedded set
    #[must_use]
    pub fn assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets_dir = Some(dir.into());
        self
    }
}

#[derive(Debug, Clone)]
struct HandlerState {
    ctx: Arc<CoverageContext>,
    options: Arc<HandlerOptions>,
}

impl IntoResponse for CoverageError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "coverage request failed");
        }
        (status, self.to_string()).into_response()
    }
}

/// Build the coverage handler router over `ctx`
pub fn create_handler(ctx: Arc<CoverageContext>, options: HandlerOptions) -> Router {
    let reset_route = if options.reset_on_get {
        get(reset).post(reset)
    } else {
        post(reset)
    };
    let state = HandlerState {
        ctx,
        options: Arc::new(options),
    };

    Router::new()
        .route("/", get(index))
        .route("/show", get(show))
        .route("/reset", reset_route)
        .route("/object", get(object))
        .route("/download", get(download))
        .route("/client", post(client))
        .route("/asset/{*path}", get(asset))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// URL prefix the router is mounted at, always ending with `/`
fn mount_prefix(original: &Uri, local: &Uri) -> String {
    let full = original.path();
    let route = local.path().trim_start_matches('/');
    let mut prefix = full.strip_suffix(route).unwrap_or(full).to_string();
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}

async fn run_blocking<T, F>(f: F) -> CoverageResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> CoverageResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CoverageError::Io(std::io::Error::other(e)))?
}

async fn render_page(
    state: &HandlerState,
    target: Option<String>,
    prefix: String,
) -> CoverageResult<Response> {
    let ctx = Arc::clone(&state.ctx);
    let rendered = run_blocking(move || render(&ctx, target.as_deref(), &prefix)).await?;
    Ok(match rendered {
        Rendered::NoCoverage => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            NO_COVERAGE_MESSAGE,
        )
            .into_response(),
        Rendered::Page(html) => Html(html).into_response(),
    })
}

async fn index(
    State(state): State<HandlerState>,
    OriginalUri(original): OriginalUri,
    uri: Uri,
) -> CoverageResult<Response> {
    render_page(&state, None, mount_prefix(&original, &uri)).await
}

#[derive(Debug, Deserialize)]
struct ShowParams {
    p: Option<String>,
}

async fn show(
    State(state): State<HandlerState>,
    OriginalUri(original): OriginalUri,
    uri: Uri,
    Query(params): Query<ShowParams>,
) -> CoverageResult<Response> {
    let target = params
        .p
        .filter(|p| !p.is_empty())
        .ok_or_else(|| CoverageError::bad_request("[p] parameter must be specified"))?;
    if state.options.verbose {
        tracing::info!(path = %target, "rendering coverage page");
    }
    render_page(&state, Some(target), mount_prefix(&original, &uri)).await
}

async fn reset(State(state): State<HandlerState>) -> Json<Value> {
    state.ctx.restore_baseline();
    Json(json!({ "ok": true }))
}

async fn object(State(state): State<HandlerState>) -> Response {
    Json(state.ctx.snapshot()).into_response()
}

async fn download(State(state): State<HandlerState>) -> CoverageResult<Response> {
    let coverage = state.ctx.report_snapshot();
    let bytes = run_blocking(move || package(&coverage)).await?;
    if state.options.verbose {
        tracing::info!(bytes = bytes.len(), "sending coverage archive");
    }
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={ARCHIVE_FILE_NAME}"),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn client(State(state): State<HandlerState>, body: Bytes) -> CoverageResult<Json<Value>> {
    let value: Value = serde_json::from_slice(&body)
        .map_err(|_| CoverageError::bad_request(CLIENT_BODY_MESSAGE))?;
    if !value.is_object() {
        return Err(CoverageError::bad_request(CLIENT_BODY_MESSAGE));
    }
    let update = coverage_map_from_value(value).map_err(|e| match e {
        CoverageError::Json(e) => CoverageError::bad_request(format!("Invalid coverage object: {e}")),
        other => other,
    })?;
    if state.options.verbose {
        tracing::info!(files = update.len(), "merging client coverage");
    }
    state.ctx.merge_client_coverage(update);
    Ok(Json(json!({ "ok": true })))
}

fn content_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

async fn asset(State(state): State<HandlerState>, UrlPath(name): UrlPath<String>) -> Response {
    let relative = Path::new(&name);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return (StatusCode::NOT_FOUND, format!("Asset not found: {name}")).into_response();
    }

    if let Some(dir) = &state.options.assets_dir {
        if let Ok(bytes) = tokio::fs::read(dir.join(relative)).await {
            return ([(header::CONTENT_TYPE, content_type(&name))], bytes).into_response();
        }
    }

    match assets::asset(&name) {
        Some(content) => ([(header::CONTENT_TYPE, content_type(&name))], content).into_response(),
        None => (StatusCode::NOT_FOUND, format!("Asset not found: {name}")).into_response(),
    }
}
