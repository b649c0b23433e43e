use price_feed_server::{build_state, config::ServerConfig, router::router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize logging
    init_logging();

    info!("Starting price-feed server");

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            error!(%error, "invalid configuration");
            std::process::exit(1);
        }
    };

    let state = build_state(&config);
    let scheduler_task = Arc::clone(state.scheduler()).spawn();

    let listener = match TcpListener::bind(config.addr).await {
        Ok(listener) => listener,
        Err(error) => {
            error!(%error, addr = %config.addr, "failed to bind HTTP server");
            std::process::exit(1);
        }
    };

    info!("HTTP server listening on http://{}", config.addr);
    info!("Clients can connect to ws://{}/ws for real-time prices", config.addr);

    if let Err(error) = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(%error, "HTTP server terminated");
    }

    scheduler_task.abort();
    info!("price-feed server stopped");
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Initialize logging, JSON formatted when `LOG_FORMAT=json`
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
