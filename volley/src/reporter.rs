use crate::constants::REPORT_INTERVAL;
use crate::stats::{Aggregator, StatsLine};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Prints one overwriting status line per tick until the run is cancelled, then a final
/// newline-terminated summary. Never triggers cancellation itself.
pub(crate) struct Reporter<W> {
    aggregator: Arc<Aggregator>,
    cancel: CancellationToken,
    out: W,
    interval_dur: Duration,
}

impl<W: Write> Reporter<W> {
    pub fn new(aggregator: Arc<Aggregator>, cancel: CancellationToken, out: W) -> Self {
        Self {
            aggregator,
            cancel,
            out,
            interval_dur: REPORT_INTERVAL,
        }
    }

    #[instrument(name = "reporter", skip_all)]
    pub async fn run(mut self) -> StatsLine {
        let mut timer = Timer::new(self.interval_dur).await;

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    let line = self.aggregator.snapshot(false);
                    self.emit(&line, "\n");
                    debug!("Reporter stopped");
                    return line;
                }
                elapsed = timer.tick() => {
                    trace!("Tick after {}", humantime::format_duration(elapsed));
                    let line = self.aggregator.snapshot(true);
                    self.emit(&line, "\r");
                }
            }
        }
    }

    fn emit(&mut self, line: &StatsLine, terminator: &str) {
        let res = write!(self.out, "{line}{terminator}").and_then(|_| self.out.flush());
        if let Err(err) = res {
            warn!("Unable to write status line: {err}");
        }
    }
}

struct Timer {
    interval: Interval,
    last_tick: Instant,
}

impl Timer {
    async fn new(interval_dur: Duration) -> Self {
        let mut interval = interval(interval_dur);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // NOTE: First tick completes instantly
        let last_tick = interval.tick().await;
        Self {
            interval,
            last_tick,
        }
    }

    async fn tick(&mut self) -> Duration {
        let next = self.interval.tick().await;
        let elapsed = next - self.last_tick;
        self.last_tick = next;
        elapsed
    }
}
