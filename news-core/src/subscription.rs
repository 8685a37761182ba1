use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fanout::Listener;
use crate::news::SortMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SubscriptionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Per-subscriber options. Unset fields take the registry defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub interval: Option<String>,
    pub page_size: Option<u32>,
    pub sort: Option<SortMode>,
}

impl SubscribeOptions {
    pub fn interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = Some(interval.into());
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn sort(mut self, sort: SortMode) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// One listener's interest in one keyword.
#[derive(Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub keyword: String,
    pub interval: String,
    pub page_size: u32,
    pub listener: Arc<dyn Listener>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("keyword", &self.keyword)
            .field("interval", &self.interval)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}
