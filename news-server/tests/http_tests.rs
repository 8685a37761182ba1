use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use news_core::{
    FetchError, Fetcher, NewsItem, SearchPage, SearchRequest, TrackerConfig, TrendingConfig,
};
use news_server::{router, AppState};
use serde_json::Value;
use tower::ServiceExt;

/// Answers every search with one item titled after the query.
struct StubFetcher;

#[async_trait]
impl Fetcher for StubFetcher {
    async fn search(&self, query: &str, request: &SearchRequest) -> Result<SearchPage, FetchError> {
        if query == "down" {
            return Err(FetchError::Unavailable("connection refused".into()));
        }
        Ok(SearchPage {
            total: 42,
            offset: request.offset,
            page_size: request.page_size,
            last_build_date: None,
            items: vec![NewsItem::new(
                &format!("<b>{query}</b> headline"),
                "https://news.example.com/1",
                "https://origin.example.com/1",
                "summary",
                None,
            )],
        })
    }
}

fn app() -> axum::Router {
    let state = AppState::new(Arc::new(StubFetcher), TrackerConfig::default(), TrendingConfig::default());
    router(state)
}

async fn get(uri: &str) -> (StatusCode, Value) {
    let response = app()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn search_returns_cleaned_items() {
    let (status, body) = get("/api/news/search?query=rust&display=5&start=11&sort=sim").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["total"], 42);
    assert_eq!(body["offset"], 11);
    assert_eq!(body["pageSize"], 5);
    assert_eq!(body["items"][0]["title"], "rust headline");
    assert_eq!(body["items"][0]["sourceLink"], "https://origin.example.com/1");
}

#[tokio::test]
async fn search_requires_a_query() {
    let (status, body) = get("/api/news/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = get("/api/news/search?query=rust&display=500").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get("/api/news/search?query=rust&sort=newest").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_numbers_get_a_json_error() {
    let (status, body) = get("/api/news/search?query=rust&display=ten").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let (status, body) = get("/api/news/search?query=rust&start=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn upstream_outage_maps_to_service_unavailable() {
    let (status, body) = get("/api/news/search?query=down").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn trending_lists_seed_keywords() {
    let (status, body) = get("/api/news/trending").await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 3);
    assert_eq!(data[0]["keyword"], "뉴스");
    assert_eq!(data[0]["count"], 1);
}

#[tokio::test]
async fn realtime_endpoints_report_idle_registry() {
    let (status, body) = get("/api/realtime/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], true);
    assert_eq!(body["keywords"].as_array().unwrap().len(), 0);

    let (status, body) = get("/api/realtime/cache/rust").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keyword"], "rust");
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let (status, body) = get("/api/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}
