//! Attempt timing that starts at "connection obtained" rather than at send.
//!
//! The HTTP client dials inside `execute`, so a plain stopwatch around it would include DNS,
//! TCP and TLS setup (or the wait for a pooled connection). [`ConnectTimingLayer`] wraps the
//! client's connector and stamps the moment a fresh connection is ready into a task-local set
//! up by [`timed`]. Pooled connections never reach the connector and leave the stamp empty.
use pin_project::pin_project;
use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::time::Instant;
use tower::{Layer, Service};

tokio::task_local! {
    static CONNECTION_READY: Cell<Option<Instant>>;
}

/// Awaits `send` and returns its output with the latency measured from whichever is later:
/// the call itself or a connection established for it.
pub(crate) async fn timed<F: Future>(send: F) -> (F::Output, Duration) {
    CONNECTION_READY
        .scope(Cell::new(None), async move {
            let start = Instant::now();
            let output = send.await;
            let received = Instant::now();

            let from = CONNECTION_READY
                .with(Cell::get)
                .map_or(start, |ready| ready.max(start));

            (output, received.saturating_duration_since(from))
        })
        .await
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ConnectTimingLayer;

impl<S> Layer<S> for ConnectTimingLayer {
    type Service = ConnectTiming<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ConnectTiming { inner }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ConnectTiming<S> {
    inner: S,
}

impl<S, R> Service<R> for ConnectTiming<S>
where
    S: Service<R>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Connecting<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, dst: R) -> Self::Future {
        Connecting {
            inner: self.inner.call(dst),
        }
    }
}

#[pin_project]
pub(crate) struct Connecting<F> {
    #[pin]
    inner: F,
}

impl<F, T, E> Future for Connecting<F>
where
    F: Future<Output = Result<T, E>>,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let res = ready!(self.project().inner.poll(cx));
        if res.is_ok() {
            // Connects finishing on a background task belong to no attempt.
            let _ = CONNECTION_READY.try_with(|ready| ready.set(Some(Instant::now())));
        }
        Poll::Ready(res)
    }
}
