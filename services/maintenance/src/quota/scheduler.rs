use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;

use super::manager::QuotaManager;

/// Renews every account's AI allowance when the clock passes the start of a
/// month (day 1, 00:00 UTC).
///
/// The scheduler remembers the last instant it observed. Each [`poll`] looks
/// at the month starts in `(last_observed, now]`; if there is at least one,
/// a single renewal runs. Boundaries skipped within one poll coalesce.
///
/// [`poll`]: RenewalScheduler::poll
pub struct RenewalScheduler {
    manager: Arc<QuotaManager>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    last_observed: Mutex<DateTime<Utc>>,
    renewals: AtomicU64,
    task: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl RenewalScheduler {
    pub fn new(manager: Arc<QuotaManager>, clock: Arc<dyn Clock>, poll_interval: Duration) -> Self {
        let now = clock.now();
        Self {
            manager,
            clock,
            poll_interval,
            last_observed: Mutex::new(now),
            renewals: AtomicU64::new(0),
            task: Mutex::new(None),
        }
    }

    /// Checks the clock once; runs a renewal if a month boundary was crossed
    /// since the previous poll. Returns whether a renewal succeeded.
    pub fn poll(&self) -> bool {
        let now = self.clock.now();
        let crossed = {
            let mut last = self
                .last_observed
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let crossed = month_boundaries_crossed(*last, now);
            if now > *last {
                *last = now;
            }
            crossed
        };

        if crossed == 0 {
            return false;
        }
        if crossed > 1 {
            warn!(category = "QUOTA", missed = crossed - 1, "coalescing skipped monthly renewals");
        }

        match self.manager.renew_all() {
            Ok(accounts) => {
                self.renewals.fetch_add(1, Ordering::SeqCst);
                info!(category = "QUOTA", accounts, at = %now, "monthly AI limit renewal completed");
                true
            }
            Err(err) => {
                error!(category = "QUOTA", error = %err, "monthly AI limit renewal failed");
                false
            }
        }
    }

    /// Number of successful scheduled renewals since construction.
    pub fn renewals_fired(&self) -> u64 {
        self.renewals.load(Ordering::SeqCst)
    }

    /// Start of the next month after the last observed instant.
    pub fn next_renewal_at(&self) -> Option<DateTime<Utc>> {
        let last = *self
            .last_observed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        next_month_start(last)
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|task| task.is_some())
            .unwrap_or(false)
    }

    /// Spawns the polling task. Calling `start` on a running scheduler is a
    /// no-op.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if task.is_some() {
            return;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(scheduler.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !scheduler.poll() {
                            debug!(category = "QUOTA", "no monthly renewal due");
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        info!(
            category = "QUOTA",
            poll_interval_secs = self.poll_interval.as_secs_f64(),
            next_renewal_at = ?self.next_renewal_at(),
            "monthly renewal scheduler started"
        );
        *task = Some((stop_tx, handle));
    }

    /// Signals the polling task to finish and waits for it.
    pub async fn stop(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some((stop_tx, handle)) = task {
            let _ = stop_tx.send(true);
            if let Err(err) = handle.await {
                warn!(category = "QUOTA", error = %err, "renewal scheduler task ended abnormally");
            }
            info!(category = "QUOTA", "monthly renewal scheduler stopped");
        }
    }
}

/// Number of month starts in `(from, to]`.
pub fn month_boundaries_crossed(from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
    if to <= from {
        return 0;
    }
    let months = month_index(to) - month_index(from);
    months.max(0) as u32
}

fn month_index(at: DateTime<Utc>) -> i64 {
    i64::from(at.year()) * 12 + i64::from(at.month0())
}

fn next_month_start(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if at.month() == 12 {
        (at.year() + 1, 1)
    } else {
        (at.year(), at.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
