use std::collections::BTreeSet;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::debug;

use crate::error::TrackerError;

/// When a recurring refresh fires.
#[derive(Debug, Clone)]
pub enum IntervalSpec {
    Every(Duration),
    Cron(Box<cron::Schedule>),
}

impl IntervalSpec {
    pub fn every(period: Duration) -> Self {
        IntervalSpec::Every(period)
    }

    /// Accepts a fixed period (`500ms`, `30s`, `5m`, `1h`) or a cron expression
    /// with five (minute resolution) or six/seven (second resolution) fields.
    /// Day-of-week numbers run 0-7 with Sunday as 0 or 7.
    pub fn parse(spec: &str) -> Result<Self, TrackerError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(TrackerError::InvalidArgument("interval must not be empty".into()));
        }
        if let Some(period) = parse_period(spec) {
            if period.is_zero() {
                return Err(TrackerError::InvalidArgument("interval must be positive".into()));
            }
            return Ok(IntervalSpec::Every(period));
        }

        let fields: Vec<&str> = spec.split_whitespace().collect();
        let fields: Vec<String> = match fields.len() {
            5 => std::iter::once("0").chain(fields).map(str::to_owned).collect(),
            6 | 7 => fields.into_iter().map(str::to_owned).collect(),
            n => {
                return Err(TrackerError::InvalidArgument(format!(
                    "interval {spec:?} has {n} fields, expected a period or a 5-7 field cron expression"
                )))
            }
        };
        let expression = fields
            .iter()
            .enumerate()
            .map(|(i, field)| match (i, field.strip_prefix("*/")) {
                // seconds, minutes, hours start at zero
                (0..=2, Some(step)) => Ok(format!("0/{step}")),
                (DAY_OF_WEEK, _) => day_of_week(field),
                _ => Ok(field.clone()),
            })
            .collect::<Result<Vec<_>, _>>()?
            .join(" ");

        cron::Schedule::from_str(&expression)
            .map(|schedule| IntervalSpec::Cron(Box::new(schedule)))
            .map_err(|err| TrackerError::InvalidArgument(format!("invalid interval {spec:?}: {err}")))
    }

    /// Delay until the next firing, or `None` when the schedule has no future firing.
    pub fn next_delay(&self) -> Option<Duration> {
        match self {
            IntervalSpec::Every(period) => Some(*period),
            IntervalSpec::Cron(schedule) => {
                let now = Utc::now();
                let next = schedule.after(&now).next()?;
                Some((next - now).to_std().unwrap_or(Duration::ZERO))
            }
        }
    }
}

const DAY_OF_WEEK: usize = 5;

/// Rewrites numeric days from 0-7 (Sunday is 0 or 7) to the cron crate's
/// 1-7 (Sunday is 1). Ranges and steps are expanded to lists; names pass
/// through.
fn day_of_week(field: &str) -> Result<String, TrackerError> {
    if field == "*" || field == "?" {
        return Ok(field.to_owned());
    }
    let invalid = || TrackerError::InvalidArgument(format!("invalid day of week {field:?}"));

    let mut days = BTreeSet::new();
    let mut names = Vec::new();
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: usize = step.parse().ok().filter(|s| *s > 0).ok_or_else(invalid)?;
                (range, Some(step))
            }
            None => (item, None),
        };
        let bounds = match (range, range.split_once('-')) {
            ("*", _) => Some((0, 6)),
            (_, Some((from, to))) => from.parse::<u32>().ok().zip(to.parse::<u32>().ok()),
            (single, None) => single
                .parse::<u32>()
                .ok()
                .map(|day| (day, if step.is_some() { 6 } else { day })),
        };
        let Some((from, to)) = bounds else {
            names.push(item.to_owned());
            continue;
        };
        if from > to || to > 7 {
            return Err(invalid());
        }
        days.extend((from..=to).step_by(step.unwrap_or(1)).map(|day| day % 7 + 1));
    }

    Ok(days
        .into_iter()
        .map(|day| day.to_string())
        .chain(names)
        .collect::<Vec<_>>()
        .join(","))
}

fn parse_period(spec: &str) -> Option<Duration> {
    let split = spec.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = spec.split_at(split);
    let value: u64 = digits.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}

enum Ticker {
    Fixed(Interval),
    Cron(IntervalSpec),
}

impl Ticker {
    fn new(spec: &IntervalSpec) -> Self {
        match spec {
            IntervalSpec::Every(period) => {
                let mut interval = tokio::time::interval_at(Instant::now() + *period, *period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                Ticker::Fixed(interval)
            }
            other => Ticker::Cron(other.clone()),
        }
    }

    /// Waits for the next firing. Returns false once the schedule is exhausted.
    async fn wait(&mut self) -> bool {
        match self {
            Ticker::Fixed(interval) => {
                interval.tick().await;
                true
            }
            Ticker::Cron(spec) => match spec.next_delay() {
                Some(delay) => {
                    tokio::time::sleep(delay).await;
                    true
                }
                None => false,
            },
        }
    }
}

/// A running schedule. Dropping the handle cancels the schedule.
pub struct ScheduleHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl ScheduleHandle {
    /// Stops future firings. A tick that is already running completes.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(());
    }

    /// Cancels and waits for an in-flight tick to finish.
    pub async fn stop(self) -> Result<(), TrackerError> {
        self.cancel();
        self.join.await.map_err(TrackerError::from)
    }
}

/// Runs `tick` at every firing of `spec` until cancelled. The first firing
/// is one period from now. Ticks never overlap; firings missed while a tick
/// runs are skipped.
pub fn spawn_schedule<F, Fut>(spec: &IntervalSpec, mut tick: F) -> ScheduleHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let mut ticker = Ticker::new(spec);
    let join = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancel_rx.recv() => break,
                more = ticker.wait() => {
                    if !more {
                        debug!("schedule has no further firings");
                        break;
                    }
                }
            }
            // the timer and a cancel can become ready together
            if !matches!(cancel_rx.try_recv(), Err(TryRecvError::Empty)) {
                break;
            }
            tick().await;
        }
        debug!("schedule stopped");
    });

    ScheduleHandle { cancel_tx, join }
}
