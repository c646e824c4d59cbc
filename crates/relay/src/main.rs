//! DevOps Relay - Azure DevOps service hooks into Mattermost channels.
//!
//! This binary serves the relay on port 3002.
//!
//! # Architecture
//!
//! - Axum web framework
//! - Azure DevOps REST API, called with each user's OAuth token
//! - Mattermost REST API v4, called as the relay's bot
//! - `PostgreSQL` key-value table, or an in-memory map when no database is set
//!
//! # Signals
//!
//! - Ctrl+C / SIGTERM: graceful shutdown
//! - SIGHUP: reload configuration from the environment

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use devops_relay::chat::{EventHub, MattermostClient};
use devops_relay::config::{RelayConfig, SharedConfig};
use devops_relay::kv::{self, KvStore, MemoryKvStore, PgKvStore};
use devops_relay::routes;
use devops_relay::state::AppState;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &RelayConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = RelayConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "devops_relay=info,tower_http=debug".into());

    let json_layer = config
        .log_json
        .then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!config.log_json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p devops-relay-cli -- migrate
    let store: Arc<dyn KvStore> = match &config.database_url {
        Some(database_url) => {
            let pool = kv::postgres::create_pool(database_url)
                .await
                .expect("Failed to create database pool");
            tracing::info!("Database pool created");
            Arc::new(PgKvStore::new(pool))
        }
        None => {
            tracing::warn!("No database configured, using in-memory store");
            Arc::new(MemoryKvStore::new())
        }
    };

    let events = EventHub::default();
    let chat = MattermostClient::new(&config.mattermost, events.clone())
        .expect("Failed to create Mattermost client");

    let addr = config.socket_addr();
    let shared = SharedConfig::new(config);
    let state = AppState::new(shared.clone(), store, Arc::new(chat), events)
        .expect("Failed to create application state");

    tokio::spawn(reload_on_hangup(shared));

    let app = routes::app(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    tracing::info!("relay listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Re-read the environment on every SIGHUP.
///
/// The encryption key is not reloaded; sealed secrets stay readable.
#[cfg(unix)]
async fn reload_on_hangup(config: SharedConfig) {
    let Ok(mut hangup) =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
    else {
        tracing::error!("Failed to install SIGHUP handler, configuration reload disabled");
        return;
    };

    while hangup.recv().await.is_some() {
        match config.reload_from_env() {
            Ok(()) => tracing::info!("Configuration reloaded"),
            Err(e) => tracing::error!(error = %e, "Configuration reload failed, keeping current"),
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(_config: SharedConfig) {}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
