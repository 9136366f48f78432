use std::time::Duration;

/// Number of requests sent when no count is given.
pub const DEFAULT_REQUESTS: u64 = 10_000;

/// Number of concurrent workers (and pooled connections) when none is given.
pub const DEFAULT_WORKERS: usize = 15;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_METHOD: &str = "GET";

/// Interval between two status lines.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Status class recorded when no response was received at all.
pub const TRANSPORT_FAILURE: u16 = 0;
