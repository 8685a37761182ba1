use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::error::{describe_api_error, FetchError};
use crate::news::{NewsItem, SearchPage, SearchRequest};

/// Source of news search results.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn search(&self, query: &str, request: &SearchRequest) -> Result<SearchPage, FetchError>;
}

/// Rejects requests the search API would refuse anyway.
pub fn check_request(query: &str, request: &SearchRequest) -> Result<(), FetchError> {
    if query.trim().is_empty() {
        return Err(FetchError::InvalidArgument("query must not be empty".into()));
    }
    request.validate()
}

#[derive(Debug, Clone)]
pub struct NaverNewsClient {
    client: Client,
    endpoint: Url,
    client_id: String,
    client_secret: String,
    timeout: Duration,
}

impl NaverNewsClient {
    pub fn new(client: Client, config: &ApiConfig) -> Result<Self, FetchError> {
        let endpoint = config
            .endpoint_url()
            .map_err(|err| FetchError::InvalidArgument(format!("bad API endpoint: {err}")))?;
        Ok(Self {
            client,
            endpoint,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            timeout: Duration::from_secs(config.request_timeout_seconds),
        })
    }
}

#[async_trait]
impl Fetcher for NaverNewsClient {
    async fn search(&self, query: &str, request: &SearchRequest) -> Result<SearchPage, FetchError> {
        check_request(query, request)?;

        let response = self
            .client
            .get(self.endpoint.clone())
            .header("X-Naver-Client-Id", &self.client_id)
            .header("X-Naver-Client-Secret", &self.client_secret)
            .query(&[
                ("query", query.to_owned()),
                ("display", request.page_size.to_string()),
                ("start", request.offset.to_string()),
                ("sort", request.sort.as_str().to_owned()),
            ])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<ApiErrorBody>().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body: ApiSearchBody = response.json().await?;
        debug!(query, total = body.total, returned = body.items.len(), "search completed");
        Ok(body.into_page())
    }
}

fn classify_status(status: StatusCode, body: ApiErrorBody) -> FetchError {
    let code = body.error_code.unwrap_or_else(|| "UNKNOWN".to_owned());
    let message = describe_api_error(&code)
        .map(str::to_owned)
        .or(body.error_message)
        .unwrap_or_else(|| "search API request failed".to_owned());
    warn!(status = status.as_u16(), %code, %message, "search API returned an error");

    if status.is_server_error() || code == "SE99" {
        FetchError::Unavailable(format!("[{}] {}", status.as_u16(), message))
    } else if status.is_client_error() {
        FetchError::BadRequest {
            status: status.as_u16(),
            code,
            message,
        }
    } else {
        FetchError::Unknown(format!("[{}] {}", status.as_u16(), message))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    error_code: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSearchBody {
    #[serde(default)]
    last_build_date: Option<String>,
    total: u64,
    start: u32,
    display: u32,
    #[serde(default)]
    items: Vec<ApiItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiItem {
    #[serde(default)]
    title: String,
    #[serde(default, rename = "originallink")]
    original_link: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    pub_date: Option<String>,
}

impl ApiSearchBody {
    fn into_page(self) -> SearchPage {
        SearchPage {
            total: self.total,
            offset: self.start,
            page_size: self.display,
            last_build_date: self.last_build_date,
            items: self.items.into_iter().map(ApiItem::into_item).collect(),
        }
    }
}

impl ApiItem {
    fn into_item(self) -> NewsItem {
        let published_at = self
            .pub_date
            .as_deref()
            .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
            .map(|dt| dt.with_timezone(&Utc));
        NewsItem::new(
            &self.title,
            self.link,
            self.original_link,
            &self.description,
            published_at,
        )
    }
}
