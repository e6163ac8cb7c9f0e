//! Serve command handler
//!
//! Static files under the configured root are served as-is, except scripts,
//! which go through the instrumenter first. The coverage handler is nested at
//! the mount prefix.

use crate::config::{ServeConfig, Verbosity};
use crate::error::{CliError, CliResult};
use crate::ServeArgs;
use axum::middleware::from_fn_with_state;
use axum::Router;
use covhub::server::{create_handler, instrument_client_scripts, ClientHandler, ClientOptions, HandlerOptions};
use covhub::{CommandInstrumenter, CoverageContext};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

/// Build the application router for `config` around `ctx`
#[must_use]
pub fn build_app(ctx: Arc<CoverageContext>, config: &ServeConfig) -> Router {
    let mut options = HandlerOptions::new()
        .verbose(config.verbose)
        .reset_on_get(config.reset_on_get);
    if let Some(dir) = &config.assets_dir {
        options = options.assets_dir(dir.clone());
    }
    let coverage = create_handler(Arc::clone(&ctx), options);

    let client = ClientHandler::new(
        ctx,
        config.root.clone(),
        ClientOptions::new().verbose(config.verbose),
    );
    let statics = Router::new()
        .fallback_service(ServeDir::new(&config.root))
        .layer(from_fn_with_state(client, instrument_client_scripts));

    let app = if config.mount.is_empty() {
        coverage.merge(statics)
    } else {
        Router::new().nest(&config.mount, coverage).merge(statics)
    };

    if config.cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    }
}

/// Format the report URL for `config`
#[must_use]
pub fn format_report_url(config: &ServeConfig) -> String {
    let host = if config.host == "0.0.0.0" {
        "localhost"
    } else {
        config.host.as_str()
    };
    format!("http://{host}:{}{}/", config.port, config.mount)
}

fn print_banner(config: &ServeConfig) {
    let clip = |s: String| s.chars().take(48).collect::<String>();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                   covhub coverage server                     ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Report:    {:<48}║", clip(format_report_url(config)));
    println!("║  Root:      {:<48}║", clip(config.root.display().to_string()));
    println!("║  Instrument:{:<48}║", clip(format!(" {}", config.instrumenter.program)));
    println!(
        "║  Reset:     {:<48}║",
        if config.reset_on_get { "POST or GET" } else { "POST" }
    );
    println!(
        "║  CORS:      {:<48}║",
        if config.cors { "enabled" } else { "disabled" }
    );
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Press Ctrl+C to stop                                        ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

async fn serve(config: ServeConfig, verbosity: Verbosity) -> CliResult<()> {
    let ctx = CoverageContext::shared();
    ctx.set_instrumenter(Arc::new(CommandInstrumenter::new(config.instrumenter.clone())));
    let app = build_app(Arc::clone(&ctx), &config);

    let listener = tokio::net::TcpListener::bind(config.address())
        .await
        .map_err(|e| CliError::server(format!("cannot bind {}: {e}", config.address())))?;
    if !verbosity.is_quiet() {
        print_banner(&config);
    }
    tracing::info!(
        address = %config.address(),
        mount = %config.mount,
        root = %config.root.display(),
        "coverage server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CliError::server(e.to_string()))?;

    tracing::info!(files = ctx.snapshot().len(), "coverage server stopped");
    Ok(())
}

/// Execute the serve command
pub fn execute_serve(args: &ServeArgs, verbosity: Verbosity) -> CliResult<()> {
    let config = ServeConfig::load(args.config.as_deref())?
        .with_args(args, verbosity)
        .validate()?;
    if !config.root.is_dir() {
        return Err(CliError::invalid_argument(format!(
            "root is not a directory: {}",
            config.root.display()
        )));
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::server(format!("failed to create runtime: {e}")))?;
    runtime.block_on(serve(config, verbosity))
}
