use crate::stats::{Aggregator, Dispatch, StatusClass};
use crate::transport::{RequestTemplate, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Per-run state handed to every worker at spawn time.
pub(crate) struct RunContext<T> {
    pub transport: Arc<T>,
    pub aggregator: Arc<Aggregator>,
    pub template: Arc<RequestTemplate>,
    pub delay: Duration,
}

impl<T> Clone for RunContext<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            aggregator: self.aggregator.clone(),
            template: self.template.clone(),
            delay: self.delay,
        }
    }
}

/// Fixed-size set of request workers sharing one aggregator.
pub(crate) struct WorkerPool {
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn<T: Transport>(workers: usize, ctx: &RunContext<T>) -> Self {
        let tasks = (0..workers)
            .map(|id| tokio::spawn(request_worker(id, ctx.clone()).in_current_span()))
            .collect();

        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Waits until every worker has been refused a dispatch and returned.
    pub async fn join(self) {
        for handle in self.tasks {
            if let Err(err) = handle.await {
                error!("Worker task failed: {err}");
            }
        }
    }
}

#[instrument(name = "worker", skip(ctx))]
async fn request_worker<T: Transport>(id: usize, ctx: RunContext<T>) {
    let mut attempts = 0u64;

    while ctx.aggregator.try_dispatch() == Dispatch::Granted {
        attempts += 1;

        match ctx.transport.prepare(&ctx.template) {
            Ok(request) => {
                let attempt = ctx.transport.execute(request).await;
                let status = match attempt.outcome {
                    Ok(status) => StatusClass::from(status),
                    Err(err) => {
                        debug!("Error making request: {err}");
                        StatusClass::TRANSPORT_FAILURE
                    }
                };
                ctx.aggregator.record_outcome(status, attempt.latency);
            }
            Err(err) => {
                // Still counted so the quota can be reached.
                warn!("Error forming request: {err}");
                ctx.aggregator
                    .record_outcome(StatusClass::TRANSPORT_FAILURE, Duration::ZERO);
            }
        }

        if !ctx.delay.is_zero() {
            tokio::time::sleep(ctx.delay).await;
        }
    }

    trace!("Worker finished after {attempts} attempts");
}
