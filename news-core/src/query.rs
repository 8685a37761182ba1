use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TrendingConfig;
use crate::error::TrackerError;
use crate::fetcher::{check_request, Fetcher};
use crate::news::{NewsItem, SearchPage, SearchRequest, SortMode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingEntry {
    pub keyword: String,
    pub count: usize,
    pub items: Vec<NewsItem>,
}

/// Request/response searches that bypass the live feed and its cache.
#[derive(Clone)]
pub struct NewsQuery {
    fetcher: Arc<dyn Fetcher>,
    trending: TrendingConfig,
}

impl NewsQuery {
    pub fn new(fetcher: Arc<dyn Fetcher>, trending: TrendingConfig) -> Self {
        Self { fetcher, trending }
    }

    pub async fn search(&self, keyword: &str, request: &SearchRequest) -> Result<SearchPage, TrackerError> {
        check_request(keyword, request)?;
        Ok(self.fetcher.search(keyword, request).await?)
    }

    /// Latest results for each seed keyword, in configured order.
    pub async fn trending(&self) -> Result<Vec<TrendingEntry>, TrackerError> {
        let request = SearchRequest::first_page(self.trending.page_size, SortMode::Date);
        let mut entries = Vec::with_capacity(self.trending.keywords.len());
        for keyword in &self.trending.keywords {
            let page = self.search(keyword, &request).await?;
            debug!(keyword = %keyword, count = page.items.len(), "trending keyword fetched");
            entries.push(TrendingEntry {
                keyword: keyword.clone(),
                count: page.items.len(),
                items: page.items,
            });
        }
        Ok(entries)
    }
}
