//! Run coordination: wires the aggregator, reporter, worker pool and interrupt handling
//! together and waits for an orderly shutdown.
use crate::config::RunConfig;
use crate::error::VolleyError;
use crate::reporter::Reporter;
use crate::stats::{Aggregator, StatsLine};
use crate::transport::{ReqwestTransport, RequestTemplate, Transport};
use crate::worker::{RunContext, WorkerPool};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Final state of a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Statistics taken once every dispatched attempt has reported back. After an interrupt this
    /// can count more requests than the final line printed at cancellation.
    pub line: StatsLine,
    /// Whether the run was stopped by an interrupt rather than by reaching its quota.
    pub interrupted: bool,
}

/// Runs a load test against `config.url` until the quota is sent or the process receives an
/// interrupt, printing a status line to stdout every second.
///
/// Only configuration problems are returned as errors; failed requests are counted under
/// status class `0`.
///
/// # Example
/// ```no_run
/// use volley::RunConfig;
///
/// #[tokio::main]
/// async fn main() -> Result<(), volley::VolleyError> {
///     let config = RunConfig::new("http://127.0.0.1:3002/delay/ms/1")?
///         .requests(1_000)
///         .workers(10);
///
///     let summary = volley::stress(config).await?;
///     println!("{}", summary.line);
///     Ok(())
/// }
/// ```
pub async fn stress(config: RunConfig) -> Result<RunSummary, VolleyError> {
    config.validate()?;
    let transport = ReqwestTransport::new(&config)?;

    let mut stdout = std::io::stdout();
    writeln!(
        stdout,
        "Stressing {} with {} connections",
        config.url, config.workers
    )?;

    Ok(run(&config, transport, stdout, shutdown_signal()).await)
}

/// Core run loop, generic over the transport, the status line sink and the interrupt source.
#[instrument(name = "run", skip_all, fields(url = %config.url, workers = config.workers))]
pub async fn run<T, W, I>(config: &RunConfig, transport: T, out: W, interrupt: I) -> RunSummary
where
    T: Transport,
    W: Write + Send + 'static,
    I: Future<Output = ()> + Send + 'static,
{
    info!(
        "Sending {} requests (delay {})",
        config.requests,
        humantime::format_duration(config.delay)
    );

    let cancel = CancellationToken::new();
    let aggregator = Arc::new(Aggregator::new(config.requests, cancel.clone()));

    let listener = tokio::spawn(
        interrupt_listener(aggregator.clone(), cancel.clone(), interrupt).in_current_span(),
    );

    let reporter = tokio::spawn(
        Reporter::new(aggregator.clone(), cancel.clone(), out)
            .run()
            .in_current_span(),
    );

    let ctx = RunContext {
        transport: Arc::new(transport),
        aggregator: aggregator.clone(),
        template: Arc::new(RequestTemplate::from(config)),
        delay: config.delay,
    };

    let pool = WorkerPool::spawn(config.workers, &ctx);
    debug!("Spawned {} workers", pool.len());
    pool.join().await;

    // Normally already fired by the quota or an interrupt.
    if aggregator.finish() {
        debug!("Workers drained before cancellation; stopping reporter");
    }

    match reporter.await {
        Ok(printed) => trace!("Reporter's final line: {printed}"),
        Err(err) => error!("Reporter task failed: {err}"),
    }

    if let Err(err) = listener.await {
        error!("Interrupt listener failed: {err}");
    }

    drop(ctx);
    debug!("Released pooled connections");

    // The pool has drained, so in-flight attempts at cancellation are included.
    let line = aggregator.snapshot(false);
    let interrupted = aggregator.interrupted();
    info!("Run finished: {line}");

    RunSummary { line, interrupted }
}

async fn interrupt_listener<I>(aggregator: Arc<Aggregator>, cancel: CancellationToken, interrupt: I)
where
    I: Future<Output = ()>,
{
    tokio::select! {
        _ = interrupt => {
            if aggregator.interrupt() {
                info!("Interrupt received; waiting for in-flight requests");
            }
        }
        _ = cancel.cancelled() => {}
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Unable to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
