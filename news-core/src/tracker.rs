use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::NewsCache;
use crate::error::{FetchError, TrackerError};
use crate::fanout::{fan_out, NewsEvent, Recipient};
use crate::fetcher::Fetcher;
use crate::news::SearchRequest;
use crate::schedule::{spawn_schedule, IntervalSpec, ScheduleHandle};
use crate::subscription::{Subscription, SubscriptionId};

/// Serializes fetches for one keyword, across every tracker that ever
/// polls it.
pub type FetchGate = Arc<Mutex<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Starting,
    Running,
    Stopping,
    Terminated,
}

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub interval: IntervalSpec,
    pub request: SearchRequest,
    pub delivery_timeout: Duration,
    pub gate: FetchGate,
}

impl TrackerSettings {
    /// Settings with a gate of their own.
    pub fn new(interval: IntervalSpec, request: SearchRequest, delivery_timeout: Duration) -> Self {
        Self {
            interval,
            request,
            delivery_timeout,
            gate: FetchGate::default(),
        }
    }

    pub fn with_gate(mut self, gate: FetchGate) -> Self {
        self.gate = gate;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RefreshOutcome {
    new_items: usize,
    total: usize,
    listeners: usize,
}

struct Shared {
    keyword: String,
    fetcher: Arc<dyn Fetcher>,
    cache: NewsCache,
    request: SearchRequest,
    delivery_timeout: Duration,
    gate: FetchGate,
    stopped: AtomicBool,
    // replaced wholesale on change; refreshes deliver to the copy they loaded
    recipients: RwLock<Arc<Vec<Arc<Recipient>>>>,
}

impl Shared {
    /// Fetches the first page, swaps the snapshot and notifies listeners.
    /// The snapshot is left alone when the fetch fails, and a result that
    /// arrives after the tracker stopped is dropped (`Ok(None)`).
    async fn refresh(&self) -> Result<Option<RefreshOutcome>, FetchError> {
        let _gate = self.gate.lock().await;
        if self.stopped.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let page = self.fetcher.search(&self.keyword, &self.request).await?;
        if self.stopped.load(Ordering::SeqCst) {
            debug!(keyword = %self.keyword, "tracker stopped during fetch, result dropped");
            return Ok(None);
        }
        let snapshot = page.items;
        let fresh = self.cache.replace(&self.keyword, snapshot.clone()).await;
        let recipients = self.recipients().await;
        let outcome = RefreshOutcome {
            new_items: fresh.len(),
            total: snapshot.len(),
            listeners: recipients.len(),
        };

        if !fresh.is_empty() {
            let event = NewsEvent::new_items(&self.keyword, fresh);
            fan_out(&recipients, &event, self.delivery_timeout).await;
        }
        let event = NewsEvent::updated(&self.keyword, snapshot);
        fan_out(&recipients, &event, self.delivery_timeout).await;
        Ok(Some(outcome))
    }

    async fn tick(&self) {
        match self.refresh().await {
            Ok(Some(outcome)) => info!(
                keyword = %self.keyword,
                new = outcome.new_items,
                total = outcome.total,
                listeners = outcome.listeners,
                "refresh completed"
            ),
            Ok(None) => {}
            Err(err) => {
                warn!(keyword = %self.keyword, error = %err, "refresh failed");
                let recipients = self.recipients().await;
                let event = NewsEvent::failed(&self.keyword, err.to_string());
                fan_out(&recipients, &event, self.delivery_timeout).await;
            }
        }
    }

    async fn recipients(&self) -> Arc<Vec<Arc<Recipient>>> {
        Arc::clone(&*self.recipients.read().await)
    }
}

/// Polling lifecycle of a single keyword.
pub struct KeywordTracker {
    shared: Arc<Shared>,
    state: TrackerState,
    schedule: Option<ScheduleHandle>,
}

impl KeywordTracker {
    /// Runs the first refresh inline, then installs the recurring schedule.
    /// A failed first refresh leaves nothing running.
    pub async fn start(
        keyword: &str,
        fetcher: Arc<dyn Fetcher>,
        cache: NewsCache,
        settings: TrackerSettings,
    ) -> Result<Self, TrackerError> {
        let mut tracker = Self {
            shared: Arc::new(Shared {
                keyword: keyword.to_owned(),
                fetcher,
                cache,
                request: settings.request,
                delivery_timeout: settings.delivery_timeout,
                gate: settings.gate,
                stopped: AtomicBool::new(false),
                recipients: RwLock::new(Arc::new(Vec::new())),
            }),
            state: TrackerState::Idle,
            schedule: None,
        };

        tracker.state = TrackerState::Starting;
        info!(keyword, interval = ?settings.interval, "starting tracker");
        match tracker.shared.refresh().await {
            Ok(outcome) => debug!(keyword, ?outcome, "first refresh completed"),
            Err(err) => {
                tracker.state = TrackerState::Terminated;
                warn!(keyword, error = %err, "first refresh failed, tracker not started");
                return Err(err.into());
            }
        }

        let shared = Arc::clone(&tracker.shared);
        tracker.schedule = Some(spawn_schedule(&settings.interval, move || {
            let shared = Arc::clone(&shared);
            async move { shared.tick().await }
        }));
        tracker.state = TrackerState::Running;
        Ok(tracker)
    }

    pub fn keyword(&self) -> &str {
        &self.shared.keyword
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Registers a listener. It receives events from the next refresh on.
    /// Never waits for a delivery in progress.
    pub async fn add(&self, subscription: Subscription) {
        debug!(keyword = %self.shared.keyword, subscription = %subscription.id, "listener added");
        let recipient = Arc::new(Recipient::new(subscription));
        let mut recipients = self.shared.recipients.write().await;
        Arc::make_mut(&mut *recipients).push(recipient);
    }

    /// Removes a listener, waiting for a delivery to it that is in progress.
    /// Returns the removed subscription and how many remain.
    pub async fn remove(&self, id: SubscriptionId) -> Option<(Subscription, usize)> {
        let (removed, remaining) = {
            let mut recipients = self.shared.recipients.write().await;
            let index = recipients.iter().position(|r| r.subscription().id == id)?;
            let list = Arc::make_mut(&mut *recipients);
            let removed = list.remove(index);
            (removed, list.len())
        };
        removed.retire().await;
        Some((removed.subscription().clone(), remaining))
    }

    pub async fn subscriber_count(&self) -> usize {
        self.shared.recipients.read().await.len()
    }

    /// Cancels the schedule. No tick starts after this returns; the result
    /// of a fetch already in flight is dropped.
    pub fn stop(&mut self) {
        if matches!(self.state, TrackerState::Terminated) {
            return;
        }
        self.state = TrackerState::Stopping;
        self.shared.stopped.store(true, Ordering::SeqCst);
        if let Some(schedule) = self.schedule.take() {
            schedule.cancel();
        }
        self.state = TrackerState::Terminated;
        info!(keyword = %self.shared.keyword, "tracker stopped");
    }

    /// Cancels the schedule and waits for an in-flight refresh to finish.
    pub async fn terminate(mut self) -> Result<(), TrackerError> {
        self.state = TrackerState::Stopping;
        let result = match self.schedule.take() {
            Some(schedule) => schedule.stop().await,
            None => Ok(()),
        };
        self.state = TrackerState::Terminated;
        info!(keyword = %self.shared.keyword, "tracker terminated");
        result
    }
}

impl Drop for KeywordTracker {
    fn drop(&mut self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for KeywordTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordTracker")
            .field("keyword", &self.shared.keyword)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
