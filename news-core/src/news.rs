use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Largest page size the search API accepts.
pub const MAX_PAGE_SIZE: u32 = 100;
/// Largest 1-based result offset the search API can address.
pub const MAX_OFFSET: u32 = 1000;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub source_link: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl NewsItem {
    pub fn new(
        title: &str,
        link: impl Into<String>,
        source_link: impl Into<String>,
        summary: &str,
        published_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            title: strip_markup(title),
            link: link.into(),
            source_link: source_link.into(),
            summary: strip_markup(summary),
            published_at,
        }
    }

    /// Dedup key. Two items with the same title are treated as the same article.
    pub fn identity(&self) -> &str {
        &self.title
    }
}

/// Removes every `<...>` tag, keeping the text between tags.
pub fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => rest = &rest[open + close + 1..],
            None => {
                // unterminated tag is kept verbatim
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortMode {
    #[serde(rename = "sim")]
    Relevance,
    #[default]
    #[serde(rename = "date")]
    Date,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Relevance => "sim",
            SortMode::Date => "date",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sim" | "relevance" => Ok(SortMode::Relevance),
            "date" => Ok(SortMode::Date),
            other => Err(FetchError::InvalidArgument(format!(
                "sort must be \"sim\" or \"date\", got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRequest {
    pub page_size: u32,
    pub offset: u32,
    pub sort: SortMode,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            offset: 1,
            sort: SortMode::Date,
        }
    }
}

impl SearchRequest {
    pub fn first_page(page_size: u32, sort: SortMode) -> Self {
        Self {
            page_size,
            offset: 1,
            sort,
        }
    }

    pub fn validate(&self) -> Result<(), FetchError> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(FetchError::InvalidArgument(format!(
                "display must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if !(1..=MAX_OFFSET).contains(&self.offset) {
            return Err(FetchError::InvalidArgument(format!(
                "start must be between 1 and {MAX_OFFSET}, got {}",
                self.offset
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub total: u64,
    pub offset: u32,
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_build_date: Option<String>,
    pub items: Vec<NewsItem>,
}

/// One page of results for a keyword, fetched outside the live feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub keyword: String,
    pub page: u32,
    pub offset: u32,
    pub page_size: u32,
    pub total: u64,
    pub items: Vec<NewsItem>,
    pub has_next_page: bool,
    pub total_pages: u64,
}

impl PageResult {
    pub fn from_search(keyword: &str, page: u32, requested_size: u32, result: SearchPage) -> Self {
        let last = u64::from(result.offset) + u64::from(result.page_size);
        let has_next_page = last.saturating_sub(1) < result.total;
        let total_pages = result.total.div_ceil(u64::from(requested_size.max(1)));
        Self {
            keyword: keyword.to_owned(),
            page,
            offset: result.offset,
            page_size: result.page_size,
            total: result.total,
            items: result.items,
            has_next_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_markup_removes_tags() {
        assert_eq!(strip_markup("<b>Rust</b> 1.80 released"), "Rust 1.80 released");
        assert_eq!(strip_markup("a < b"), "a < b");
        assert_eq!(strip_markup("plain"), "plain");
    }

    #[test]
    fn page_result_past_the_end() {
        let page = SearchPage {
            total: 15,
            offset: 21,
            page_size: 10,
            last_build_date: None,
            items: Vec::new(),
        };
        let result = PageResult::from_search("alpha", 3, 10, page);
        assert!(!result.has_next_page);
        assert_eq!(result.total_pages, 2);
    }

    #[test]
    fn sort_mode_parses_wire_values() {
        assert_eq!("sim".parse::<SortMode>().unwrap(), SortMode::Relevance);
        assert_eq!("date".parse::<SortMode>().unwrap(), SortMode::Date);
        assert!("newest".parse::<SortMode>().is_err());
    }
}
