//! WebSocket message types.
//!
//! Frames are JSON objects `{"event": ..., "data": ...}`. A `news` frame
//! carries the tracker event unchanged, including its own `type` field.

use std::collections::BTreeMap;

use news_core::{NewsEvent, NewsItem, PageResult, RegistryStatus, SortMode, SubscriptionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    Subscribe {
        keyword: String,
        #[serde(default)]
        interval: Option<String>,
        #[serde(default)]
        display: Option<u32>,
    },
    Unsubscribe {
        keyword: String,
        #[serde(default, rename = "subscriptionId")]
        subscription_id: Option<SubscriptionId>,
    },
    GetCachedNews {
        keyword: String,
    },
    GetAllCache,
    GetStatus,
    GetNewsPage {
        keyword: String,
        #[serde(default = "first_page")]
        page: u32,
        #[serde(default)]
        display: Option<u32>,
        #[serde(default)]
        sort: Option<SortMode>,
    },
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    Subscribed {
        keyword: String,
        #[serde(rename = "subscriptionId")]
        subscription_id: SubscriptionId,
        message: String,
    },
    Unsubscribed {
        keyword: String,
        message: String,
    },
    News(NewsEvent),
    CachedNews {
        keyword: String,
        count: usize,
        news: Vec<NewsItem>,
    },
    AllCache(BTreeMap<String, Vec<NewsItem>>),
    Status(RegistryStatus),
    NewsPage(PageResult),
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use news_core::EventKind;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_subscribe_with_defaults() {
        let msg: ClientMessage =
            serde_json::from_value(json!({ "event": "subscribe", "data": { "keyword": "rust" } })).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Subscribe {
                keyword: "rust".into(),
                interval: None,
                display: None,
            }
        );
    }

    #[test]
    fn parses_unit_and_paged_requests() {
        let status: ClientMessage = serde_json::from_value(json!({ "event": "get-status" })).unwrap();
        assert_eq!(status, ClientMessage::GetStatus);

        let page: ClientMessage = serde_json::from_value(json!({
            "event": "get-news-page",
            "data": { "keyword": "rust", "display": 20, "sort": "sim" }
        }))
        .unwrap();
        assert_eq!(
            page,
            ClientMessage::GetNewsPage {
                keyword: "rust".into(),
                page: 1,
                display: Some(20),
                sort: Some(SortMode::Relevance),
            }
        );
    }

    #[test]
    fn news_frame_keeps_event_type() {
        let event = NewsEvent::updated("rust", Vec::new());
        let value = serde_json::to_value(ServerMessage::News(event)).unwrap();
        assert_eq!(value["event"], "news");
        assert_eq!(value["data"]["type"], "updated");
        assert_eq!(value["data"]["keyword"], "rust");
        assert_eq!(value["data"]["count"], 0);
        assert_eq!(serde_json::to_value(EventKind::New).unwrap(), "new");
    }
}
