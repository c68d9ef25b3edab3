//! tfn-daemon entry point.
//!
//! Thin: loads config and credentials, connects and migrates Postgres,
//! wires the services, and starts the HTTP server plus the sweep ticker.
//! Route handlers live in `routes.rs`; shared state lives in `state.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tfn_config::{ConfigConsumer, UnusedKeyPolicy};
use tfn_daemon::{auth::StaticCredentialVerifier, routes, state};
use tfn_schemas::{Clock, SystemClock};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = tfn_config::load_from_env()?;
    let unused =
        tfn_config::report_unused_keys(ConfigConsumer::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "config/unused_keys");
    }
    let cfg = loaded.settings()?;
    info!(config_hash = %loaded.config_hash, "config/loaded");

    let clock: Arc<dyn Clock> = Arc::new(
        SystemClock::from_name(&cfg.clock.timezone).context("clock.timezone")?,
    );

    let credentials = tfn_config::resolve_credentials(&cfg)?;
    let verifier = StaticCredentialVerifier::new(credentials, clock.clone());
    if verifier.is_empty() {
        warn!("auth/no_credentials: every protected route will answer 401");
    } else {
        info!(count = verifier.len(), "auth/credentials_loaded");
    }

    let pool = tfn_db::connect_from_env(cfg.db.max_connections).await?;
    tfn_db::migrate(&pool).await?;
    let store = Arc::new(tfn_db::PgStore::new(pool));

    let shared = Arc::new(state::AppState::wire(store, clock, Arc::new(verifier), &cfg));

    if cfg.sweep.enabled {
        state::spawn_sweep(shared.subscriptions.clone(), cfg.sweep.interval());
    }

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = match bind_addr_from_env() {
        Some(a) => a,
        None => cfg
            .server
            .addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid server.addr '{}'", cfg.server.addr))?,
    };
    info!("tfn-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("TIFFIN_DAEMON_ADDR").ok()?.parse().ok()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "shutdown/signal_handler_failed");
        std::future::pending::<()>().await;
    }
    info!("shutdown/requested");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}
