pub mod http;
pub mod protocol;
pub mod ws;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use news_core::{Fetcher, NewsQuery, Registry, TrackerConfig, TrendingConfig};

/// Shared handles passed to every request.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub query: NewsQuery,
}

impl AppState {
    pub fn new(fetcher: Arc<dyn Fetcher>, tracker: TrackerConfig, trending: TrendingConfig) -> Self {
        Self {
            registry: Arc::new(Registry::new(Arc::clone(&fetcher), tracker)),
            query: NewsQuery::new(fetcher, trending),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api", get(http::index))
        .route("/api/news/search", get(http::search))
        .route("/api/news/trending", get(http::trending))
        .route("/api/realtime/status", get(http::status))
        .route("/api/realtime/cache/{keyword}", get(http::cached))
        .route("/ws", get(ws::ws_handler))
        .fallback(http::not_found)
        .with_state(state)
}
