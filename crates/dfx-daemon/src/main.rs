//! dfx-daemon entry point.
//!
//! Thin by intent: load config, set up tracing, bind the datafile store and
//! refresh coordinator, wire middleware, serve. Route handlers live in
//! `routes.rs`; shared state lives in `state.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use dfx_config::{load_config_files, secrets, DatafileOptions};
use dfx_daemon::{binder::RequestBinder, routes, state};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "dfx-daemon", about = "Serve and refresh a feature-flag datafile")]
struct Args {
    /// Config YAML layers, merged in order (later wins).
    #[arg(long = "config", required = true)]
    config: Vec<String>,

    /// Listen address; overrides DFX_DAEMON_ADDR.
    #[arg(long)]
    addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    let args = Args::parse();
    let loaded = load_config_files(&args.config).context("load config failed")?;
    let options = DatafileOptions::from_config_json(&loaded.config_json)
        .context("invalid datafile options")?;

    init_tracing(options.log_filter());
    info!(config_hash = %loaded.config_hash, layers = args.config.len(), "config loaded");

    let secret = secrets::resolve_webhook_secret(&loaded.config_json);
    if secret.is_none() {
        warn!(
            env_var = %secrets::webhook_secret_env_name(&loaded.config_json),
            "webhook secret not set; webhook requests will be refused"
        );
    }

    let binder = RequestBinder::from_options(options)?;
    let shared = Arc::new(state::AppState::new(binder.clone(), secret));
    let revision_logger = state::spawn_revision_logger(binder.store());

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = args
        .addr
        .or_else(bind_addr_from_env)
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8898)));
    info!("dfx-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    state::shutdown(&binder, revision_logger).await;
    info!("dfx-daemon stopped");
    Ok(())
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("DFX_DAEMON_ADDR").ok()?.parse().ok()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
