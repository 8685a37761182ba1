//! Request/response endpoints.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use news_core::{NewsItem, RegistryStatus, SearchPage, SearchRequest, SortMode, TrackerError, TrendingEntry};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use crate::AppState;

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

/// Error type that converts to a JSON response.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Tracker(TrackerError),
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        ApiError::Tracker(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Tracker(err) => {
                let status = match &err {
                    TrackerError::InvalidArgument(_)
                    | TrackerError::UpstreamRejected(_)
                    | TrackerError::Range { .. } => StatusCode::BAD_REQUEST,
                    TrackerError::UpstreamUnavailable(_) | TrackerError::ShuttingDown => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    TrackerError::Upstream(_) | TrackerError::Task(_) => {
                        error!(error = %err, "request failed");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.to_string())
            }
        };
        let body = ErrorBody {
            success: false,
            error: message,
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub display: Option<u32>,
    pub start: Option<u32>,
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    #[serde(flatten)]
    pub page: SearchPage,
}

#[derive(Debug, Serialize)]
pub struct TrendingResponse {
    pub success: bool,
    pub data: Vec<TrendingEntry>,
}

#[derive(Debug, Serialize)]
pub struct CacheResponse {
    pub keyword: String,
    pub count: usize,
    pub news: Vec<NewsItem>,
}

pub async fn index() -> impl IntoResponse {
    Json(json!({
        "message": "News Tracker API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "searchNews": "GET /api/news/search?query=keyword&display=10&start=1&sort=date",
            "trendingNews": "GET /api/news/trending",
            "realtimeStatus": "GET /api/realtime/status",
            "cachedNews": "GET /api/realtime/cache/{keyword}",
            "websocket": "GET /ws"
        }
    }))
}

pub async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(params) = params?;
    let query = params
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("query parameter is required".into()))?;

    let defaults = SearchRequest::default();
    let sort = match params.sort.as_deref() {
        Some(sort) => sort
            .parse::<SortMode>()
            .map_err(|err| ApiError::BadRequest(err.to_string()))?,
        None => defaults.sort,
    };
    let request = SearchRequest {
        page_size: params.display.unwrap_or(defaults.page_size),
        offset: params.start.unwrap_or(defaults.offset),
        sort,
    };
    debug!(%query, ?request, "search");

    let page = state.query.search(&query, &request).await?;
    Ok(Json(SearchResponse { success: true, page }))
}

pub async fn trending(State(state): State<AppState>) -> Result<Json<TrendingResponse>, ApiError> {
    let data = state.query.trending().await?;
    Ok(Json(TrendingResponse { success: true, data }))
}

pub async fn status(State(state): State<AppState>) -> Json<RegistryStatus> {
    Json(state.registry.status().await)
}

pub async fn cached(State(state): State<AppState>, Path(keyword): Path<String>) -> Json<CacheResponse> {
    let news = state.registry.cache(&keyword).await;
    Json(CacheResponse {
        keyword,
        count: news.len(),
        news,
    })
}

pub async fn not_found() -> impl IntoResponse {
    let body = ErrorBody {
        success: false,
        error: "endpoint not found".into(),
    };
    (StatusCode::NOT_FOUND, Json(body))
}
