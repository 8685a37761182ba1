use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::news::NewsItem;

/// Latest snapshot per keyword. Outlives the trackers that fill it.
#[derive(Debug, Clone, Default)]
pub struct NewsCache {
    inner: Arc<RwLock<HashMap<String, Vec<NewsItem>>>>,
}

impl NewsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last snapshot for `keyword`, empty when nothing was ever fetched.
    pub async fn get(&self, keyword: &str) -> Vec<NewsItem> {
        let inner = self.inner.read().await;
        inner.get(keyword).cloned().unwrap_or_default()
    }

    /// Swaps in a new snapshot and returns the items absent from the old one.
    pub async fn replace(&self, keyword: &str, items: Vec<NewsItem>) -> Vec<NewsItem> {
        let mut inner = self.inner.write().await;
        let previous = inner.insert(keyword.to_owned(), items.clone());
        match previous {
            Some(previous) => new_items(&previous, &items),
            None => items,
        }
    }

    pub async fn keywords(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut keywords: Vec<String> = inner.keys().cloned().collect();
        keywords.sort();
        keywords
    }

    pub async fn all(&self) -> BTreeMap<String, Vec<NewsItem>> {
        let inner = self.inner.read().await;
        inner.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Items of `current` whose identity does not occur in `previous`, in `current` order.
pub fn new_items(previous: &[NewsItem], current: &[NewsItem]) -> Vec<NewsItem> {
    let seen: std::collections::HashSet<&str> = previous.iter().map(NewsItem::identity).collect();
    current
        .iter()
        .filter(|item| !seen.contains(item.identity()))
        .cloned()
        .collect()
}
