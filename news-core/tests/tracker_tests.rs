mod common;

use std::time::Duration;

use common::{channel_listener, items, titles, ScriptedFetcher};
use news_core::{
    EventKind, FetchError, IntervalSpec, KeywordTracker, NewsCache, SearchRequest, Subscription,
    SubscriptionId, TrackerError, TrackerSettings, TrackerState,
};

fn settings() -> TrackerSettings {
    TrackerSettings::new(
        IntervalSpec::every(Duration::from_secs(2)),
        SearchRequest::default(),
        Duration::from_secs(1),
    )
}

fn subscription(keyword: &str) -> (Subscription, tokio::sync::mpsc::Receiver<news_core::NewsEvent>) {
    let (listener, rx) = channel_listener();
    let subscription = Subscription {
        id: SubscriptionId::generate(),
        keyword: keyword.to_owned(),
        interval: "2s".into(),
        page_size: 10,
        listener,
    };
    (subscription, rx)
}

#[tokio::test(start_paused = true)]
async fn start_fetches_once_and_runs() {
    let fetcher = ScriptedFetcher::new(vec![Ok(items(&["a"]))]);
    let cache = NewsCache::new();

    let tracker = KeywordTracker::start("rust", fetcher.clone(), cache.clone(), settings()).await.unwrap();

    assert_eq!(tracker.state(), TrackerState::Running);
    assert_eq!(tracker.keyword(), "rust");
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(fetcher.requests()[0].1, SearchRequest::default());
    assert_eq!(titles(&cache.get("rust").await), ["a"]);
}

#[tokio::test(start_paused = true)]
async fn failed_start_surfaces_the_fetch_error() {
    let fetcher = ScriptedFetcher::new(vec![Err(FetchError::Unavailable("dns failure".into()))]);
    let cache = NewsCache::new();

    let err = KeywordTracker::start("rust", fetcher.clone(), cache.clone(), settings())
        .await
        .unwrap_err();

    assert!(matches!(err, TrackerError::UpstreamUnavailable(_)), "{err:?}");
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(fetcher.calls(), 1);
    assert!(cache.get("rust").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn ticks_follow_the_interval_and_stop_on_request() {
    let fetcher = ScriptedFetcher::new(vec![Ok(items(&["a"])), Ok(items(&["a", "b"]))]);
    let mut tracker = KeywordTracker::start("rust", fetcher.clone(), NewsCache::new(), settings())
        .await
        .unwrap();
    let (sub, mut rx) = subscription("rust");
    tracker.add(sub).await;
    assert_eq!(tracker.subscriber_count().await, 1);

    tokio::time::sleep(Duration::from_millis(1_900)).await;
    assert_eq!(fetcher.calls(), 1, "first tick fires one interval after start");

    let new = rx.recv().await.unwrap();
    assert_eq!(new.kind, EventKind::New);
    assert_eq!(rx.recv().await.unwrap().kind, EventKind::Updated);
    assert_eq!(fetcher.calls(), 2);

    tracker.stop();
    assert_eq!(tracker.state(), TrackerState::Terminated);
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn terminate_waits_for_the_schedule() {
    let fetcher = ScriptedFetcher::new(vec![Ok(items(&["a"]))]);
    let tracker = KeywordTracker::start("rust", fetcher.clone(), NewsCache::new(), settings())
        .await
        .unwrap();
    let (sub, _rx) = subscription("rust");
    let id = sub.id;
    tracker.add(sub).await;

    let (removed, remaining) = tracker.remove(id).await.unwrap();
    assert_eq!(removed.id, id);
    assert_eq!(remaining, 0);
    assert!(tracker.remove(id).await.is_none());

    tracker.terminate().await.unwrap();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_a_tracker_cancels_its_schedule() {
    let fetcher = ScriptedFetcher::new(vec![Ok(items(&["a"]))]);
    let tracker = KeywordTracker::start("rust", fetcher.clone(), NewsCache::new(), settings())
        .await
        .unwrap();
    drop(tracker);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_drops_the_result_of_an_inflight_fetch() {
    let fetcher = ScriptedFetcher::new(vec![Ok(items(&["a"])), Ok(items(&["late"]))]);
    fetcher.delay_call(2, Duration::from_secs(5));
    let cache = NewsCache::new();
    let mut tracker = KeywordTracker::start("rust", fetcher.clone(), cache.clone(), settings())
        .await
        .unwrap();
    let (sub, mut rx) = subscription("rust");
    tracker.add(sub).await;

    // the tick at 2s is still fetching
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(fetcher.calls(), 2);
    tracker.stop();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(titles(&cache.get("rust").await), ["a"]);
    assert!(rx.try_recv().is_err());
}
