//! Xero Relay web server.
//!
//! Receives Xero webhooks, verifies their signatures, fetches every
//! referenced resource and hands it to the relay channel.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use xero_relay::credentials::{store_from_config, CredentialCache};
use xero_relay::dispatch::{
    guard_from_config, DispatchOptions, HttpResourceFetcher, LogSink, OutcomeSink,
    WebhookDispatcher,
};
use xero_relay::web::{router, AppState};
use xero_relay::{Config, Publisher};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        secret_param = %config.secret_param,
        secret_file = ?config.secret_file,
        credential_ttl_secs = config.credential_ttl_secs,
        fetch_timeout_ms = config.fetch_timeout_ms,
        fetch_max_attempts = config.fetch_max_attempts,
        fetch_concurrency = config.fetch_concurrency,
        dispatch_deadline_ms = config.dispatch_deadline_ms,
        replay_mode = ?config.replay_mode,
        cloudamqp_url_set = config.cloudamqp_url.is_some(),
        "config_loaded"
    );

    let credentials = CredentialCache::new(store_from_config(&config), config.credential_ttl())
        .with_min_refresh_interval(config.credential_min_refresh());

    let fetcher =
        HttpResourceFetcher::from_config(&config).context("Failed to build HTTP client")?;

    // Relay over RabbitMQ when configured, otherwise log only
    let publisher = config.cloudamqp_url.clone().map(Publisher::new);
    let sink: Arc<dyn OutcomeSink> = match &publisher {
        Some(publisher) => {
            info!("rabbitmq_publisher_created");
            Arc::new(publisher.clone())
        }
        None => {
            info!("relay_log_only");
            Arc::new(LogSink)
        }
    };

    let dispatcher = WebhookDispatcher::new(Arc::new(credentials), Arc::new(fetcher), sink)
        .with_replay_guard(guard_from_config(&config))
        .with_options(DispatchOptions::from_config(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = router(AppState::new(config, dispatcher));

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(publisher) = publisher {
        publisher.close().await;
    }

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
