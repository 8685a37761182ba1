use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::error::DeliveryError;
use crate::news::NewsItem;
use crate::subscription::Subscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    New,
    Updated,
    Error,
}

/// Push notification for one keyword refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub keyword: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<NewsItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NewsEvent {
    pub fn new_items(keyword: &str, items: Vec<NewsItem>) -> Self {
        Self::with_items(EventKind::New, keyword, items)
    }

    pub fn updated(keyword: &str, items: Vec<NewsItem>) -> Self {
        Self::with_items(EventKind::Updated, keyword, items)
    }

    pub fn failed(keyword: &str, reason: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Error,
            keyword: keyword.to_owned(),
            timestamp: Some(Utc::now()),
            items: None,
            count: None,
            error: Some(reason.into()),
        }
    }

    fn with_items(kind: EventKind, keyword: &str, items: Vec<NewsItem>) -> Self {
        Self {
            kind,
            keyword: keyword.to_owned(),
            timestamp: Some(Utc::now()),
            count: Some(items.len()),
            items: Some(items),
            error: None,
        }
    }
}

/// Receiver of live events for a subscription. Implemented per transport.
#[async_trait]
pub trait Listener: Send + Sync {
    async fn deliver(&self, event: &NewsEvent) -> Result<(), DeliveryError>;
}

/// Forwards events into a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::Sender<NewsEvent>,
}

impl ChannelListener {
    pub fn new(tx: mpsc::Sender<NewsEvent>) -> Self {
        Self { tx }
    }

    pub fn shared(tx: mpsc::Sender<NewsEvent>) -> Arc<dyn Listener> {
        Arc::new(Self::new(tx))
    }
}

#[async_trait]
impl Listener for ChannelListener {
    async fn deliver(&self, event: &NewsEvent) -> Result<(), DeliveryError> {
        self.tx
            .send(event.clone())
            .await
            .map_err(|_| DeliveryError("receiver dropped".into()))
    }
}

/// A subscription as seen by delivery. Once retired it receives nothing.
pub struct Recipient {
    subscription: Subscription,
    // held for the length of each delivery
    active: Mutex<bool>,
}

impl Recipient {
    pub fn new(subscription: Subscription) -> Self {
        Self {
            subscription,
            active: Mutex::new(true),
        }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Stops delivery to this recipient. Waits for a delivery to it that is
    /// already running, so nothing reaches the listener after this returns.
    pub async fn retire(&self) {
        *self.active.lock().await = false;
    }
}

impl std::fmt::Debug for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Recipient").field(&self.subscription).finish()
    }
}

/// Delivers `event` to every active recipient in order. Returns how many
/// deliveries succeeded; failures, panics and timeouts are logged only.
pub async fn fan_out(recipients: &[Arc<Recipient>], event: &NewsEvent, timeout: Duration) -> usize {
    let mut delivered = 0;
    for recipient in recipients {
        let active = recipient.active.lock().await;
        if !*active {
            continue;
        }
        let subscription = &recipient.subscription;
        let delivery = AssertUnwindSafe(subscription.listener.deliver(event)).catch_unwind();
        match tokio::time::timeout(timeout, delivery).await {
            Ok(Ok(Ok(()))) => delivered += 1,
            Ok(Ok(Err(err))) => {
                warn!(subscription = %subscription.id, keyword = %event.keyword, error = %err, "listener failed");
            }
            Ok(Err(_)) => {
                warn!(subscription = %subscription.id, keyword = %event.keyword, "listener panicked");
            }
            Err(_) => {
                warn!(subscription = %subscription.id, keyword = %event.keyword, ?timeout, "listener timed out");
            }
        }
        drop(active);
    }
    delivered
}
