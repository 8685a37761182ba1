#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use news_core::{
    DeliveryError, FetchError, Fetcher, Listener, NewsEvent, NewsItem, SearchPage, SearchRequest,
    TrackerConfig,
};
use tokio::sync::mpsc;

pub fn item(title: &str) -> NewsItem {
    NewsItem::new(
        title,
        format!("https://news.example.com/{title}"),
        format!("https://origin.example.com/{title}"),
        "summary",
        None,
    )
}

pub fn items(titles: &[&str]) -> Vec<NewsItem> {
    titles.iter().map(|t| item(t)).collect()
}

pub fn titles(items: &[NewsItem]) -> Vec<&str> {
    items.iter().map(|i| i.title.as_str()).collect()
}

pub fn tracker_config() -> TrackerConfig {
    TrackerConfig {
        default_interval: "1s".into(),
        delivery_timeout_ms: 1_000,
        ..TrackerConfig::default()
    }
}

/// Fetcher that plays back queued results, then repeats the last success.
/// Individual calls can be made slow with [`ScriptedFetcher::delay_call`].
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<Vec<NewsItem>, FetchError>>>,
    last: Mutex<Vec<NewsItem>>,
    total: u64,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, SearchRequest)>>,
    delays: Mutex<HashMap<usize, Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Result<Vec<NewsItem>, FetchError>>) -> Arc<Self> {
        Self::with_total(script, 100)
    }

    pub fn with_total(script: Vec<Result<Vec<NewsItem>, FetchError>>, total: u64) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(Vec::new()),
            total,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            delays: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// Makes the `call`th search (1-based) take `delay` before answering.
    pub fn delay_call(&self, call: usize, delay: Duration) {
        self.delays.lock().unwrap().insert(call, delay);
    }

    /// Most searches that were ever running at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, SearchRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn search(&self, query: &str, request: &SearchRequest) -> Result<SearchPage, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push((query.to_owned(), *request));
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let delay = self.delays.lock().unwrap().get(&call).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        let items = match next {
            Some(Ok(items)) => {
                *self.last.lock().unwrap() = items.clone();
                items
            }
            Some(Err(err)) => return Err(err),
            None => self.last.lock().unwrap().clone(),
        };
        Ok(SearchPage {
            total: self.total,
            offset: request.offset,
            page_size: request.page_size,
            last_build_date: None,
            items,
        })
    }
}

pub fn channel_listener() -> (Arc<dyn Listener>, mpsc::Receiver<NewsEvent>) {
    let (tx, rx) = mpsc::channel(16);
    (news_core::ChannelListener::shared(tx), rx)
}

pub struct FailingListener;

#[async_trait]
impl Listener for FailingListener {
    async fn deliver(&self, _event: &NewsEvent) -> Result<(), DeliveryError> {
        Err(DeliveryError("socket closed".into()))
    }
}

pub struct PanickingListener;

#[async_trait]
impl Listener for PanickingListener {
    async fn deliver(&self, _event: &NewsEvent) -> Result<(), DeliveryError> {
        panic!("listener bug");
    }
}

pub struct StalledListener;

#[async_trait]
impl Listener for StalledListener {
    async fn deliver(&self, _event: &NewsEvent) -> Result<(), DeliveryError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}
