pub mod cache;
pub mod config;
pub mod error;
pub mod fanout;
pub mod fetcher;
pub mod news;
pub mod query;
pub mod registry;
pub mod schedule;
pub mod subscription;
pub mod tracker;

pub use cache::NewsCache;
pub use config::{ApiConfig, AppConfig, ServerConfig, TrackerConfig, TrendingConfig};
pub use error::{DeliveryError, FetchError, TrackerError};
pub use fanout::{fan_out, ChannelListener, EventKind, Listener, NewsEvent, Recipient};
pub use fetcher::{Fetcher, NaverNewsClient};
pub use news::{NewsItem, PageResult, SearchPage, SearchRequest, SortMode};
pub use query::{NewsQuery, TrendingEntry};
pub use registry::{PageOptions, Registry, RegistryStatus};
pub use schedule::{spawn_schedule, IntervalSpec, ScheduleHandle};
pub use subscription::{SubscribeOptions, Subscription, SubscriptionId};
pub use tracker::{FetchGate, KeywordTracker, TrackerSettings, TrackerState};
