// Integration tests for `NetworkProbe` against a local mock server and sockets.

use std::time::Duration;

use reqwest::Url;
use tokio::net::TcpListener;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use weather_monitor_core::{HealthProbe, NetworkProbe, ProbeTarget, SourceStatus, TargetRole};

// ── Helpers ─────────────────────────────────────────────────────────

const TIMEOUT: Duration = Duration::from_secs(3);

async fn server_returning(code: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(code))
        .mount(&server)
        .await;
    server
}

fn http_target(url: &str) -> ProbeTarget {
    ProbeTarget::http("mock", TargetRole::Source, Url::parse(url).unwrap(), TIMEOUT)
}

// ── HTTP probes ─────────────────────────────────────────────────────

#[tokio::test]
async fn http_200_is_online() {
    let server = server_returning(200).await;
    let target = http_target(&server.uri());

    let result = NetworkProbe::new().probe(&target, TIMEOUT).await;

    assert!(result.reachable);
    assert_eq!(result.status, SourceStatus::Online);
    assert!(result.latency.is_some());
    assert_eq!(result.target, "mock");
}

#[tokio::test]
async fn http_401_still_counts_as_online() {
    let server = server_returning(401).await;
    let target = http_target(&server.uri());

    let result = NetworkProbe::new().probe(&target, TIMEOUT).await;

    assert!(result.reachable);
    assert_eq!(result.status, SourceStatus::Online);
}

#[tokio::test]
async fn http_server_error_is_error_status() {
    let server = server_returning(503).await;
    let target = http_target(&server.uri());

    let result = NetworkProbe::new().probe(&target, TIMEOUT).await;

    assert!(!result.reachable);
    assert_eq!(result.status, SourceStatus::Error);
    assert!(result.latency.is_none());
}

#[tokio::test]
async fn http_other_status_is_not_reachable() {
    let server = server_returning(404).await;
    let target = http_target(&server.uri());

    let result = NetworkProbe::new().probe(&target, TIMEOUT).await;

    assert!(!result.reachable);
    assert_eq!(result.status, SourceStatus::Error);
}

#[tokio::test]
async fn http_connection_failure_is_offline() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let target = http_target(&format!("http://127.0.0.1:{port}/"));
    let result = NetworkProbe::new().probe(&target, TIMEOUT).await;

    assert!(!result.reachable);
    assert_eq!(result.status, SourceStatus::Offline);
}

#[tokio::test]
async fn http_timeout_is_offline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let timeout = Duration::from_millis(200);
    let target = http_target(&server.uri());

    let started = std::time::Instant::now();
    let result = NetworkProbe::new().probe(&target, timeout).await;

    assert!(!result.reachable);
    assert_eq!(result.status, SourceStatus::Offline);
    assert!(started.elapsed() < Duration::from_secs(2), "probe must honour its timeout");
}

// ── Reachability probes ─────────────────────────────────────────────

#[tokio::test]
async fn listening_host_is_reachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let target = ProbeTarget::reachability("local", TargetRole::ApiServer, "127.0.0.1", port, TIMEOUT);
    let result = NetworkProbe::new().probe(&target, TIMEOUT).await;

    assert!(result.reachable);
    assert_eq!(result.status, SourceStatus::Online);
    assert!(result.latency.is_some());
}

#[tokio::test]
async fn refused_connection_still_proves_host_is_up() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let target = ProbeTarget::reachability("local", TargetRole::Connectivity, "127.0.0.1", port, TIMEOUT);
    let result = NetworkProbe::new().probe(&target, TIMEOUT).await;

    assert!(result.reachable);
}

#[tokio::test]
async fn unresolvable_host_is_offline() {
    let target = ProbeTarget::reachability(
        "nowhere",
        TargetRole::ApiServer,
        "host.invalid",
        443,
        Duration::from_secs(2),
    );

    let result = NetworkProbe::new().probe(&target, Duration::from_secs(2)).await;

    assert!(!result.reachable);
    assert_eq!(result.status, SourceStatus::Offline);
    assert!(result.latency.is_none());
}
