//! Subscription registry: the single owner of every keyword tracker.
//!
//! Each keyword has a slot with two locks. The start lock is held by the
//! subscriber that creates the tracker, across its first fetch, so a second
//! subscriber waits and joins instead of starting another. The state lock
//! guards the tracker itself and is only held for short structural changes,
//! never across a fetch. The map of slots is only locked long enough to look
//! a slot up, so keywords never wait on each other.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cache::NewsCache;
use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::fanout::Listener;
use crate::fetcher::{check_request, Fetcher};
use crate::news::{NewsItem, PageResult, SearchRequest, SortMode, MAX_OFFSET, MAX_PAGE_SIZE};
use crate::schedule::IntervalSpec;
use crate::subscription::{SubscribeOptions, Subscription, SubscriptionId};
use crate::tracker::{FetchGate, KeywordTracker, TrackerSettings};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatus {
    pub running: bool,
    pub keywords: Vec<String>,
    pub subscriber_count_by_keyword: BTreeMap<String, usize>,
    pub cached_keywords: Vec<String>,
}

/// Options for [`Registry::page`]. Unset fields take the registry defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageOptions {
    pub page_size: Option<u32>,
    pub sort: Option<SortMode>,
}

#[derive(Debug, Default)]
struct KeywordSlot {
    // held by whoever is starting the tracker, across its first fetch
    start: Mutex<()>,
    state: Mutex<SlotState>,
}

#[derive(Debug, Default)]
struct SlotState {
    tracker: Option<KeywordTracker>,
    // set once the slot has been unlinked from the map
    retired: bool,
}

type SlotRef = Arc<KeywordSlot>;

pub struct Registry {
    fetcher: Arc<dyn Fetcher>,
    config: TrackerConfig,
    cache: NewsCache,
    slots: Mutex<HashMap<String, SlotRef>>,
    gates: Mutex<HashMap<String, FetchGate>>,
    index: Mutex<HashMap<SubscriptionId, String>>,
    closed: AtomicBool,
}

impl Registry {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: TrackerConfig) -> Self {
        Self {
            fetcher,
            config,
            cache: NewsCache::new(),
            slots: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            index: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Registers `listener` for live events on `keyword`.
    ///
    /// The first subscriber of a keyword starts its tracker and waits for the
    /// first fetch; if that fetch fails nothing is registered. Concurrent
    /// subscribers of the same keyword wait for that start and then join.
    /// Later subscribers join the running tracker immediately and receive
    /// events from its next refresh, without a replay of the current snapshot.
    pub async fn subscribe(
        &self,
        keyword: &str,
        listener: Arc<dyn Listener>,
        options: SubscribeOptions,
    ) -> Result<SubscriptionId, TrackerError> {
        if keyword.is_empty() {
            return Err(TrackerError::InvalidArgument("keyword must not be empty".into()));
        }
        let interval = options
            .interval
            .unwrap_or_else(|| self.config.default_interval.clone());
        let spec = IntervalSpec::parse(&interval)?;
        let page_size = options.page_size.unwrap_or(self.config.default_page_size);
        let request = SearchRequest::first_page(page_size, options.sort.unwrap_or(self.config.default_sort));
        request.validate()?;

        let subscription = Subscription {
            id: SubscriptionId::generate(),
            keyword: keyword.to_owned(),
            interval,
            page_size,
            listener,
        };

        loop {
            if !self.is_running() {
                return Err(TrackerError::ShuttingDown);
            }
            let slot = self.slot(keyword).await;
            let _starting = slot.start.lock().await;
            {
                let state = slot.state.lock().await;
                if state.retired {
                    continue;
                }
                if let Some(tracker) = state.tracker.as_ref() {
                    return Ok(self.register(tracker, subscription).await);
                }
            }

            // the first fetch runs under the start lock only
            let settings = TrackerSettings::new(spec, request, self.config.delivery_timeout())
                .with_gate(self.gate(keyword).await);
            let started = KeywordTracker::start(keyword, Arc::clone(&self.fetcher), self.cache.clone(), settings).await;

            let mut state = slot.state.lock().await;
            let tracker = match started {
                Ok(tracker) => tracker,
                Err(err) => {
                    state.retired = true;
                    self.unlink(keyword, &slot).await;
                    return Err(err);
                }
            };
            if state.retired {
                drop(state);
                if let Err(err) = tracker.terminate().await {
                    warn!(keyword, error = %err, "tracker did not stop cleanly");
                }
                return Err(TrackerError::ShuttingDown);
            }
            let id = self.register(&tracker, subscription).await;
            state.tracker = Some(tracker);
            return Ok(id);
        }
    }

    async fn register(&self, tracker: &KeywordTracker, subscription: Subscription) -> SubscriptionId {
        let id = subscription.id;
        let keyword = subscription.keyword.clone();
        tracker.add(subscription).await;
        self.index.lock().await.insert(id, keyword.clone());
        info!(keyword = %keyword, subscription = %id, "subscribed");
        id
    }

    /// Removes a subscription. The last subscription of a keyword stops its
    /// tracker; the cached snapshot stays readable. Unknown ids return false.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Some(keyword) = self.index.lock().await.remove(&id) else {
            return false;
        };
        let Some(slot) = self.slots.lock().await.get(&keyword).cloned() else {
            return false;
        };

        let mut state = slot.state.lock().await;
        let Some(tracker) = state.tracker.as_mut() else {
            return false;
        };
        let Some((_, remaining)) = tracker.remove(id).await else {
            return false;
        };
        info!(keyword = %keyword, subscription = %id, remaining, "unsubscribed");

        if remaining == 0 {
            tracker.stop();
            state.tracker = None;
            state.retired = true;
            self.unlink(&keyword, &slot).await;
        }
        true
    }

    /// Last snapshot for `keyword`. Never fetches.
    pub async fn cache(&self, keyword: &str) -> Vec<NewsItem> {
        self.cache.get(keyword).await
    }

    pub async fn all_cache(&self) -> BTreeMap<String, Vec<NewsItem>> {
        self.cache.all().await
    }

    /// Fetches page `page` (1-based) for `keyword`, independent of the live feed.
    pub async fn page(&self, keyword: &str, page: u32, options: PageOptions) -> Result<PageResult, TrackerError> {
        if page == 0 {
            return Err(TrackerError::InvalidArgument("page numbers start at 1".into()));
        }
        let page_size = options.page_size.unwrap_or(self.config.default_page_size);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(TrackerError::InvalidArgument(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }
        let offset = u64::from(page - 1) * u64::from(page_size) + 1;
        if offset > u64::from(MAX_OFFSET) {
            return Err(TrackerError::Range {
                offset: u32::try_from(offset).unwrap_or(u32::MAX),
                max: MAX_OFFSET,
            });
        }

        let request = SearchRequest {
            page_size,
            offset: offset as u32,
            sort: options.sort.unwrap_or(self.config.default_sort),
        };
        check_request(keyword, &request)?;
        let result = self.fetcher.search(keyword, &request).await?;
        Ok(PageResult::from_search(keyword, page, page_size, result))
    }

    /// Subscriber counts of running trackers. Keywords whose tracker is
    /// still starting are not listed.
    pub async fn subscriber_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for (keyword, slot) in self.slot_snapshot().await {
            let state = slot.state.lock().await;
            if let Some(tracker) = state.tracker.as_ref() {
                counts.insert(keyword, tracker.subscriber_count().await);
            }
        }
        counts
    }

    pub async fn status(&self) -> RegistryStatus {
        let subscriber_count_by_keyword = self.subscriber_counts().await;
        RegistryStatus {
            running: self.is_running(),
            keywords: subscriber_count_by_keyword.keys().cloned().collect(),
            subscriber_count_by_keyword,
            cached_keywords: self.cache.keywords().await,
        }
    }

    /// Refuses new subscriptions and terminates every tracker, waiting for
    /// in-flight refreshes. Cached snapshots stay readable.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let slots: Vec<(String, SlotRef)> = self.slots.lock().await.drain().collect();
        let mut trackers = Vec::new();
        for (keyword, slot) in slots {
            let mut state = slot.state.lock().await;
            state.retired = true;
            if let Some(tracker) = state.tracker.take() {
                trackers.push((keyword, tracker));
            }
        }
        self.index.lock().await.clear();
        for (keyword, tracker) in trackers {
            if let Err(err) = tracker.terminate().await {
                warn!(keyword = %keyword, error = %err, "tracker did not stop cleanly");
            }
        }
        info!("registry shut down");
    }

    async fn slot(&self, keyword: &str) -> SlotRef {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(keyword.to_owned()).or_default())
    }

    async fn gate(&self, keyword: &str) -> FetchGate {
        let mut gates = self.gates.lock().await;
        Arc::clone(gates.entry(keyword.to_owned()).or_default())
    }

    async fn slot_snapshot(&self) -> Vec<(String, SlotRef)> {
        let slots = self.slots.lock().await;
        slots.iter().map(|(k, v)| (k.clone(), Arc::clone(v))).collect()
    }

    async fn unlink(&self, keyword: &str, slot: &SlotRef) {
        let mut slots = self.slots.lock().await;
        if slots.get(keyword).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(keyword);
        }
    }
}
