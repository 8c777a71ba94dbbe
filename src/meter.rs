use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Name of the meter marked by every dispatched request.
pub const VIEW_REQUESTS: &str = "view-request-loadbalancer";

/// A named monotonic request counter, shared by every handler for the life of the process.
#[derive(Debug)]
pub struct Meter {
    name: String,
    count: AtomicU64,
}

impl Meter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Count one request and return the new total.
    pub fn mark(&self) -> u64 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Requests per second between two readings taken `period` apart.
pub fn rate(previous: u64, current: u64, period: Duration) -> f64 {
    let seconds = period.as_secs_f64();
    if seconds == 0.0 {
        return 0.0;
    }

    current.saturating_sub(previous) as f64 / seconds
}

/// Emit the meter's total and rate once per `period` as a `metrics` event until the task is aborted.
pub fn report(meter: Arc<Meter>, period: Duration) -> JoinHandle<()> {
    let period = period.max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // the first tick completes immediately
        ticker.tick().await;
        let mut previous = meter.count();

        loop {
            ticker.tick().await;

            let count = meter.count();
            tracing::info!(
                target: "metrics",
                metric = meter.name(),
                count,
                rate = rate(previous, count, period),
                "Metrics.{}",
                meter.name()
            );

            previous = count;
        }
    })
}
