mod utils;
use utils::*;

use std::future::pending;
use std::time::Duration;
use volley::{RunConfig, StatusClass};

const LIMIT: Duration = Duration::from_secs(30);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reaches_quota_exactly() {
    let (addr, hits) = init().await;
    let config = RunConfig::new(&url(addr, "/delay/ms/1"))
        .unwrap()
        .requests(200)
        .workers(8);

    let (summary, out) = run_with(config, pending(), LIMIT).await;

    assert!(!summary.interrupted);
    assert_eq!(summary.line.sent, 200);
    assert_eq!(hits.get(), 200);
    assert_eq!(summary.line.status_percent(StatusClass(200)), Some(100.));
    assert!(summary.line.to_string().contains("[sent: 200 100.00%]"));
    assert!(out.contents().ends_with('\n'));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn status_codes_are_classified() {
    let (addr, _) = init().await;
    let config = RunConfig::new(&url(addr, "/status/503"))
        .unwrap()
        .requests(20)
        .workers(4);

    let (summary, _) = run_with(config, pending(), LIMIT).await;

    assert_eq!(summary.line.status_percent(StatusClass(503)), Some(100.));
    assert!(summary.line.to_string().ends_with("[503: 100.00%]"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn body_is_sent_whole_on_every_attempt() {
    let (addr, _) = init().await;
    let body = volley::cli::resolve_body("hello world").unwrap();
    let config = RunConfig::new(&url(addr, "/body/len/11"))
        .unwrap()
        .method("POST".parse().unwrap())
        .body(body)
        .requests(50)
        .workers(5);

    let (summary, _) = run_with(config, pending(), LIMIT).await;

    assert_eq!(summary.line.sent, 50);
    assert_eq!(summary.line.status_percent(StatusClass(200)), Some(100.));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn headers_are_sent() {
    let (addr, _) = init().await;
    let headers = volley::cli::parse_headers("x-run=abc").unwrap();
    let config = RunConfig::new(&url(addr, "/header/x-run/abc"))
        .unwrap()
        .headers(headers)
        .requests(10)
        .workers(2);

    let (summary, _) = run_with(config, pending(), LIMIT).await;

    assert_eq!(summary.line.status_percent(StatusClass(200)), Some(100.));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn works_without_keep_alive() {
    let (addr, hits) = init().await;
    let config = RunConfig::new(&url(addr, "/delay/ms/0"))
        .unwrap()
        .keep_alive(false)
        .requests(30)
        .workers(3);

    let (summary, _) = run_with(config, pending(), LIMIT).await;

    assert_eq!(summary.line.sent, 30);
    assert_eq!(hits.get(), 30);
    assert_eq!(summary.line.status_percent(StatusClass(200)), Some(100.));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timeouts_count_as_transport_failures() {
    let (addr, _) = init().await;
    let config = RunConfig::new(&url(addr, "/delay/ms/2000"))
        .unwrap()
        .timeout(Duration::from_millis(100))
        .requests(4)
        .workers(2);

    let (summary, _) = run_with(config, pending(), LIMIT).await;

    assert_eq!(summary.line.sent, 4);
    assert_eq!(
        summary.line.status_percent(StatusClass::TRANSPORT_FAILURE),
        Some(100.)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn refused_connections_do_not_stop_workers() {
    init().await;
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let config = RunConfig::new(&url(addr, "/"))
        .unwrap()
        .timeout(Duration::from_secs(1))
        .requests(12)
        .workers(3);

    let (summary, _) = run_with(config, pending(), LIMIT).await;

    assert_eq!(summary.line.sent, 12);
    assert_eq!(
        summary.line.status_percent(StatusClass::TRANSPORT_FAILURE),
        Some(100.)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interrupt_ends_run_early() {
    let (addr, hits) = init().await;
    let config = RunConfig::new(&url(addr, "/delay/ms/20"))
        .unwrap()
        .requests(100_000)
        .workers(4);

    let interrupt = tokio::time::sleep(Duration::from_millis(300));
    let (summary, out) = run_with(config, interrupt, LIMIT).await;

    assert!(summary.interrupted);
    assert!(summary.line.sent > 0);
    assert!(summary.line.sent < 100_000);
    // requests in flight at the interrupt are in the summary
    assert_eq!(hits.get(), summary.line.sent);
    assert_eq!(out.contents().matches('\n').count(), 1);
}
