//! Run-wide statistics shared by every worker and the reporter.
//!
//! All state lives behind a single lock inside [`Aggregator`]; nothing outside this module can
//! touch the counters except through its operations. The lock is only ever held for constant
//! time bookkeeping and never across an `.await`.
use crate::constants::TRANSPORT_FAILURE;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Classification bucket for a finished attempt: the HTTP status code, or `0` when no response
/// was received at all.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatusClass(pub u16);

impl StatusClass {
    pub const TRANSPORT_FAILURE: StatusClass = StatusClass(TRANSPORT_FAILURE);

    pub fn is_transport_failure(&self) -> bool {
        *self == Self::TRANSPORT_FAILURE
    }
}

impl From<reqwest::StatusCode> for StatusClass {
    fn from(status: reqwest::StatusCode) -> Self {
        StatusClass(status.as_u16())
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a dispatch request was granted. Returned by [`Aggregator::try_dispatch`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Granted,
    Refused,
}

struct SharedStats {
    requests_issued: u64,
    requests_dispatched: u64,
    window_baseline: u64,
    latency_low: Duration,
    latency_high: Duration,
    latency_sum: Duration,
    status_counts: BTreeMap<StatusClass, u64>,
    completed: bool,
    cancelled: bool,
    interrupted: bool,
}

impl SharedStats {
    fn new() -> Self {
        Self {
            requests_issued: 0,
            requests_dispatched: 0,
            window_baseline: 0,
            latency_low: Duration::MAX,
            latency_high: Duration::ZERO,
            latency_sum: Duration::ZERO,
            status_counts: BTreeMap::new(),
            completed: false,
            cancelled: false,
            interrupted: false,
        }
    }

    fn reset_window(&mut self) {
        self.latency_low = Duration::MAX;
        self.latency_high = Duration::ZERO;
        self.latency_sum = Duration::ZERO;
        self.window_baseline = self.requests_issued;
    }

    /// Returns true only for the call that actually fired the token.
    fn fire(&mut self, cancel: &CancellationToken) -> bool {
        if self.cancelled {
            return false;
        }
        self.cancelled = true;
        cancel.cancel();
        true
    }
}

/// Lock-protected counters for one run.
///
/// Two independent quota boundaries are enforced here: [`try_dispatch`](Self::try_dispatch)
/// gates the start of a request and [`record_outcome`](Self::record_outcome) fires the run's
/// cancellation once the last dispatched request has reported back.
pub struct Aggregator {
    stats: Mutex<SharedStats>,
    started_at: Instant,
    requests_target: u64,
    cancel: CancellationToken,
}

impl Aggregator {
    pub fn new(requests_target: u64, cancel: CancellationToken) -> Self {
        Self {
            stats: Mutex::new(SharedStats::new()),
            started_at: Instant::now(),
            requests_target,
            cancel,
        }
    }

    pub fn requests_target(&self) -> u64 {
        self.requests_target
    }

    /// Admission control for a single request. Refuses once the run is completed or the quota
    /// has been fully dispatched; the first refusal on the quota boundary marks the run
    /// completed.
    pub fn try_dispatch(&self) -> Dispatch {
        let mut stats = self.lock();

        if stats.completed {
            return Dispatch::Refused;
        }

        if stats.requests_dispatched >= self.requests_target {
            trace!("Quota fully dispatched; marking run completed.");
            stats.completed = true;
            return Dispatch::Refused;
        }

        stats.requests_dispatched += 1;
        Dispatch::Granted
    }

    /// Records a finished attempt. Returns true if this outcome reached the quota and fired the
    /// cancellation.
    pub fn record_outcome(&self, status: StatusClass, latency: Duration) -> bool {
        let mut stats = self.lock();

        stats.requests_issued += 1;
        *stats.status_counts.entry(status).or_insert(0) += 1;

        stats.latency_low = stats.latency_low.min(latency);
        stats.latency_high = stats.latency_high.max(latency);
        stats.latency_sum += latency;

        if stats.requests_issued == self.requests_target {
            debug!("All {} requests recorded.", self.requests_target);
            stats.completed = true;
            return stats.fire(&self.cancel);
        }

        false
    }

    /// Operator-requested stop. Refuses all further dispatches and fires the cancellation
    /// unless the quota already did. Returns true if this call fired it.
    pub fn interrupt(&self) -> bool {
        let mut stats = self.lock();
        stats.completed = true;
        stats.interrupted = true;
        stats.fire(&self.cancel)
    }

    /// Fires the cancellation if nothing else has. Used by the coordinator once the pool has
    /// drained.
    pub(crate) fn finish(&self) -> bool {
        let mut stats = self.lock();
        stats.completed = true;
        stats.fire(&self.cancel)
    }

    pub fn interrupted(&self) -> bool {
        self.lock().interrupted
    }

    /// Builds the current status line. With `reset_window` the window latencies are cleared
    /// and the window throughput baseline moves to the current sent count.
    pub fn snapshot(&self, reset_window: bool) -> StatsLine {
        let elapsed = self.started_at.elapsed();
        let mut stats = self.lock();

        let sent = stats.requests_issued;
        let window_sent = sent - stats.window_baseline;

        let (latency_low, latency_avg, latency_high) = if window_sent == 0 {
            (Duration::ZERO, Duration::ZERO, Duration::ZERO)
        } else {
            let avg = stats
                .latency_sum
                .checked_div(window_sent.min(u32::MAX as u64) as u32)
                .unwrap_or_default();
            (stats.latency_low, avg, stats.latency_high)
        };

        let average_rps = if elapsed.is_zero() {
            0.
        } else {
            sent as f64 / elapsed.as_secs_f64()
        };

        let statuses = stats
            .status_counts
            .iter()
            .map(|(status, count)| (*status, percent(*count, sent)))
            .collect();

        let line = StatsLine {
            elapsed,
            latency_low,
            latency_avg,
            latency_high,
            sent,
            target: self.requests_target,
            window_sent,
            average_rps,
            statuses,
        };

        if reset_window {
            stats.reset_window();
        }

        line
    }

    fn lock(&self) -> MutexGuard<'_, SharedStats> {
        // Every critical section leaves the counters consistent, so a poisoned lock is still
        // safe to read.
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn counts(&self) -> (u64, u64) {
        let stats = self.lock();
        (stats.requests_dispatched, stats.requests_issued)
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.
    } else {
        part as f64 / whole as f64 * 100.
    }
}

/// A point-in-time view of the run, rendered as one terminal line.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsLine {
    pub elapsed: Duration,
    pub latency_low: Duration,
    pub latency_avg: Duration,
    pub latency_high: Duration,
    /// Requests that have reported an outcome, over the whole run.
    pub sent: u64,
    pub target: u64,
    /// Requests that reported an outcome since the previous window reset.
    pub window_sent: u64,
    pub average_rps: f64,
    /// Share of each status class over the whole run, ordered by status class.
    pub statuses: Vec<(StatusClass, f64)>,
}

impl StatsLine {
    pub fn sent_percent(&self) -> f64 {
        percent(self.sent, self.target)
    }

    pub fn status_percent(&self, status: StatusClass) -> Option<f64> {
        self.statuses
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, pct)| *pct)
    }
}

impl fmt::Display for StatsLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[time: {}s] [lat LoAvgHi: {} {} {} ms] [sent: {} {:.2}%] [tps: {}] [tps avg: {}]",
            self.elapsed.as_secs(),
            self.latency_low.as_millis(),
            self.latency_avg.as_millis(),
            self.latency_high.as_millis(),
            self.sent,
            self.sent_percent(),
            self.window_sent,
            self.average_rps as u64,
        )?;

        for (status, pct) in &self.statuses {
            write!(f, " [{status}: {pct:.2}%]")?;
        }

        Ok(())
    }
}
