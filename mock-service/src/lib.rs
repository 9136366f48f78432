use axum::{
    body::Bytes,
    debug_handler,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{any, get},
    Router,
};
use std::net::SocketAddr;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Request counter shared by every route of one service instance.
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicU64>);

impl Hits {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Returns the count and resets it to zero.
    pub fn take(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }

    fn hit(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn router(hits: Hits) -> Router {
    Router::new()
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/status/:code", get(status))
        .route("/body/len/:len", any(body_len))
        .route("/header/:name/:value", get(header))
        .layer(TraceLayer::new_for_http())
        .with_state(hits)
}

pub async fn run(addr: SocketAddr, hits: Hits) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(hits)).await
}

/// Binds an ephemeral localhost port and serves in the background.
pub async fn spawn() -> std::io::Result<(SocketAddr, Hits)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let hits = Hits::default();

    let app = router(hits.clone());
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!("Mock service stopped: {err}");
        }
    });

    debug!("Mock service listening on {addr}");
    Ok((addr, hits))
}

#[debug_handler]
async fn delay(State(hits): State<Hits>, Path(delay_ms): Path<u64>) {
    hits.hit();
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

#[debug_handler]
async fn status(State(hits): State<Hits>, Path(code): Path<u16>) -> StatusCode {
    hits.hit();
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

/// 200 when the body is exactly `len` bytes, 400 otherwise.
#[debug_handler]
async fn body_len(State(hits): State<Hits>, Path(len): Path<usize>, body: Bytes) -> StatusCode {
    hits.hit();
    if body.len() == len {
        StatusCode::OK
    } else {
        debug!("Expected {len} body bytes, got {}", body.len());
        StatusCode::BAD_REQUEST
    }
}

/// 200 when the request carries `name: value`, 400 otherwise.
#[debug_handler]
async fn header(
    State(hits): State<Hits>,
    Path((name, value)): Path<(String, String)>,
    headers: HeaderMap,
) -> StatusCode {
    hits.hit();
    match headers.get(name.as_str()) {
        Some(found) if found.as_bytes() == value.as_bytes() => StatusCode::OK,
        _ => StatusCode::BAD_REQUEST,
    }
}

/** TPS Printer **/

pub async fn tps_measure_task(hits: Hits) {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let transactions = hits.take();
        println!("{transactions} TPS");
    }
}
