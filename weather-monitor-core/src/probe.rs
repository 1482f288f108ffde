use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::{fmt::Debug, io, time::Duration};
use tokio::{net::TcpStream, time::Instant};
use tracing::debug;

use crate::health::{HealthCheckResult, ProbeKind, ProbeTarget};
use crate::source::SourceStatus;

/// A single reachability/latency check against one target.
///
/// Implementations never fail: every transport problem comes back as a
/// classified result with `reachable == false`.
#[async_trait]
pub trait HealthProbe: Send + Sync + Debug {
    async fn probe(&self, target: &ProbeTarget, timeout: Duration) -> HealthCheckResult;
}

/// Probe backed by real sockets: HTTP GET for URL targets, TCP connect for bare hosts.
#[derive(Debug, Clone)]
pub struct NetworkProbe {
    http: Client,
}

impl NetworkProbe {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    async fn probe_http(&self, target: &ProbeTarget, url: &Url, timeout: Duration) -> HealthCheckResult {
        let started = Instant::now();

        match self.http.get(url.clone()).timeout(timeout).send().await {
            Ok(res) => {
                let status = classify_http_status(res.status());
                debug!(probe = %target.id, code = res.status().as_u16(), %status, "http probe answered");

                if status == SourceStatus::Online {
                    HealthCheckResult::online(target, started.elapsed())
                } else {
                    HealthCheckResult::failed(target, status)
                }
            }
            Err(err) => {
                debug!(probe = %target.id, error = %err, "http probe failed");
                HealthCheckResult::failed(target, SourceStatus::Offline)
            }
        }
    }

    async fn probe_host(
        &self,
        target: &ProbeTarget,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> HealthCheckResult {
        let started = Instant::now();

        match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => HealthCheckResult::online(target, started.elapsed()),
            // A refusal means the host itself answered.
            Ok(Err(err)) if err.kind() == io::ErrorKind::ConnectionRefused => {
                HealthCheckResult::online(target, started.elapsed())
            }
            Ok(Err(err)) => {
                debug!(probe = %target.id, host, port, error = %err, "reachability probe failed");
                HealthCheckResult::failed(target, SourceStatus::Offline)
            }
            Err(_) => {
                debug!(probe = %target.id, host, port, ?timeout, "reachability probe timed out");
                HealthCheckResult::failed(target, SourceStatus::Offline)
            }
        }
    }
}

impl Default for NetworkProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthProbe for NetworkProbe {
    async fn probe(&self, target: &ProbeTarget, timeout: Duration) -> HealthCheckResult {
        match &target.kind {
            ProbeKind::Http { url } => self.probe_http(target, url, timeout).await,
            ProbeKind::Reachability { host, port } => self.probe_host(target, host, *port, timeout).await,
        }
    }
}

/// 2xx and 401 mean the service is up (401 only says the credential is missing
/// or wrong). Anything else means it answered but is not usable.
pub fn classify_http_status(code: StatusCode) -> SourceStatus {
    if code.is_success() || code == StatusCode::UNAUTHORIZED {
        SourceStatus::Online
    } else {
        SourceStatus::Error
    }
}
