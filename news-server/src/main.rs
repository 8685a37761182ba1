use std::sync::Arc;

use news_core::{AppConfig, NaverNewsClient};
use news_server::{router, AppState};
use reqwest::{redirect, ClientBuilder};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("failed to read .env: {e}");
        }
    }
    init_tracing();

    let config = AppConfig::load();
    if config.api.client_id.is_empty() || config.api.client_secret.is_empty() {
        warn!("search API credentials are not configured; requests will be rejected upstream");
    }

    let client = ClientBuilder::new()
        .redirect(redirect::Policy::limited(5))
        .user_agent(concat!("news-tracker/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let fetcher = Arc::new(NaverNewsClient::new(client, &config.api)?);
    let state = AppState::new(fetcher, config.tracker.clone(), config.trending.clone());
    let registry = Arc::clone(&state.registry);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "news tracker listening");

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    registry.shutdown().await;
    served?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
