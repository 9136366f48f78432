use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tracing_subscriber::FmtSubscriber;
use volley::{RunConfig, RunSummary};

#[allow(unused)]
pub async fn init() -> (SocketAddr, mock_service::Hits) {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        FmtSubscriber::builder()
            .with_env_filter("volley=debug,mock_service=debug")
            .with_test_writer()
            .init();
    });

    mock_service::spawn()
        .await
        .expect("Failed to start mock service")
}

/// Status line sink shared with the test body.
#[allow(unused)]
#[derive(Clone, Default)]
pub struct Output(Arc<Mutex<Vec<u8>>>);

#[allow(unused)]
impl Output {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[allow(unused)]
pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}

/// Runs against a real `ReqwestTransport`, failing the test if it takes longer than `limit`.
#[allow(unused)]
pub async fn run_with<I>(config: RunConfig, interrupt: I, limit: Duration) -> (RunSummary, Output)
where
    I: std::future::Future<Output = ()> + Send + 'static,
{
    let out = Output::default();
    let transport = volley::ReqwestTransport::new(&config).expect("Failed to build transport");
    let summary = tokio::time::timeout(
        limit,
        volley::run(&config, transport, out.clone(), interrupt),
    )
    .await
    .expect("Run did not finish in time");

    (summary, out)
}
