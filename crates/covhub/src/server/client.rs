//! Client-script instrumentation middleware.
//!
//! Scripts requested by a browser are instrumented on the fly so the page can
//! later post its `__coverage__` map to `/client`. Anything that cannot be
//! instrumented is passed on untouched to the next handler.

use crate::context::CoverageContext;
use crate::result::{CoverageError, CoverageResult};
use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Decides whether a request is for an instrumentable script
pub type RequestMatcher = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Maps a request to the local file to serve, `None` to pass it on
pub type PathTransformer = Arc<dyn Fn(&Request) -> Option<PathBuf> + Send + Sync>;

/// Matches request paths ending with `.js`
#[must_use]
pub fn default_matcher(req: &Request) -> bool {
    req.uri().path().ends_with(".js")
}

/// Resolves the request path below `root`; requests climbing out with `..` map to nothing
#[must_use]
pub fn default_path_transformer(root: &Path, req: &Request) -> Option<PathBuf> {
    let relative = Path::new(req.uri().path().trim_start_matches('/'));
    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

/// Options of the client middleware
#[derive(Clone, Default)]
pub struct ClientOptions {
    matcher: Option<RequestMatcher>,
    path_transformer: Option<PathTransformer>,
    verbose: bool,
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("custom_matcher", &self.matcher.is_some())
            .field("custom_path_transformer", &self.path_transformer.is_some())
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl ClientOptions {
    /// Default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the `.js` matcher
    #[must_use]
    pub fn matcher(mut self, f: impl Fn(&Request) -> bool + Send + Sync + 'static) -> Self {
        self.matcher = Some(Arc::new(f));
        self
    }

    /// Replace the root-relative path resolution
    #[must_use]
    pub fn path_transformer(
        mut self,
        f: impl Fn(&Request) -> Option<PathBuf> + Send + Sync + 'static,
    ) -> Self {
        self.path_transformer = Some(Arc::new(f));
        self
    }

    /// Log every instrumented response
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// State of the client middleware, used with [`axum::middleware::from_fn_with_state`]
#[derive(Clone)]
pub struct ClientHandler {
    ctx: Arc<CoverageContext>,
    matcher: RequestMatcher,
    path_transformer: PathTransformer,
    verbose: bool,
}

impl fmt::Debug for ClientHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandler")
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl ClientHandler {
    /// Serve scripts below `root`, instrumented by `ctx`'s instrumenter
    #[must_use]
    pub fn new(ctx: Arc<CoverageContext>, root: impl Into<PathBuf>, options: ClientOptions) -> Self {
        let root = root.into();
        let matcher: RequestMatcher = match options.matcher {
            Some(matcher) => matcher,
            None => Arc::new(default_matcher),
        };
        let path_transformer: PathTransformer = match options.path_transformer {
            Some(transformer) => transformer,
            None => Arc::new(move |req: &Request| default_path_transformer(&root, req)),
        };
        Self {
            ctx,
            matcher,
            path_transformer,
            verbose: options.verbose,
        }
    }

    async fn instrument(&self, path: &Path) -> CoverageResult<String> {
        let instrumenter = self.ctx.instrumenter().ok_or_else(|| {
            CoverageError::configuration(
                "no instrumenter set up, install the loader hook before using the client middleware",
            )
        })?;
        let code = tokio::fs::read_to_string(path).await?;
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || instrumenter.instrument(&code, &path))
            .await
            .map_err(|e| CoverageError::Io(std::io::Error::other(e)))?
    }
}

/// Middleware answering matching `GET` requests with instrumented scripts
pub async fn instrument_client_scripts(
    State(handler): State<ClientHandler>,
    req: Request,
    next: Next,
) -> Response {
    if req.method() != Method::GET || !(handler.matcher)(&req) {
        return next.run(req).await;
    }
    let Some(full_path) = (handler.path_transformer)(&req) else {
        return next.run(req).await;
    };

    match handler.instrument(&full_path).await {
        Ok(code) => {
            if handler.verbose {
                tracing::info!(
                    path = %full_path.display(),
                    url = %req.uri(),
                    "sending instrumented code"
                );
            }
            ([(header::CONTENT_TYPE, "application/javascript")], code).into_response()
        }
        Err(e) => {
            tracing::warn!(path = %full_path.display(), error = %e, "serving script uninstrumented");
            next.run(req).await
        }
    }
}
