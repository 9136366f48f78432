use mock_service::Hits;
use std::net::SocketAddr;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter("mock_service=debug,tower_http=info")
        .init();

    let hits = Hits::default();
    tokio::task::spawn(mock_service::tps_measure_task(hits.clone()));

    let addr: SocketAddr = "0.0.0.0:3002".parse().expect("valid socket address");
    mock_service::run(addr, hits).await
}
