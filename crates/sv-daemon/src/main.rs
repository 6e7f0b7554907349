//! sv-daemon entry point.
//!
//! Thin on purpose: tracing, config, shared state, scheduler, HTTP server.
//!
//! - `SV_CONFIG`: comma-separated config layer paths (merge order)
//! - `SV_DAEMON_ADDR`: bind address, default `127.0.0.1:8898`

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use sv_config::{load_layered_yaml, report_unused_keys, UnusedKeyPolicy};
use sv_daemon::{routes, schedule, state};
use sv_runtime::{HttpStoreFactory, ModeController};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths_from_env().context("SV_CONFIG must list at least one config file")?;
    let loaded = load_layered_yaml(paths.as_slice())?;
    report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    let config = loaded.settings()?;
    config.validate().context("config rejected at boot")?;
    let schedule = schedule::Schedule::from_settings(&config.schedule)?;

    let stores = HttpStoreFactory::from_env(&config.source).await;
    let controller = ModeController::new(config, Arc::new(stores))
        .with_config_hash(loaded.config_hash.clone());
    let shared = Arc::new(state::AppState::new(controller));

    schedule::spawn_scheduler(Arc::clone(&shared), schedule);

    let app = routes::build_router(Arc::clone(&shared)).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8898)));
    info!(config_hash = %loaded.config_hash, "sv-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn config_paths_from_env() -> Option<Vec<String>> {
    let raw = std::env::var("SV_CONFIG").ok()?;
    let paths: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    (!paths.is_empty()).then_some(paths)
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("SV_DAEMON_ADDR").ok()?.parse().ok()
}
