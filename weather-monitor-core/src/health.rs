//! Probe targets, probe outcomes and the aggregated network snapshot.

use chrono::{DateTime, Utc};
use reqwest::Url;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::source::SourceStatus;

/// What a probe result feeds into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetRole {
    /// Primary internet connectivity check.
    Connectivity,
    Ipv6,
    /// Hostname of one configured source.
    ApiServer,
    /// HTTP probe of a source's base URL; drives `Source::status`.
    Source,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeKind {
    Http { url: Url },
    /// Network-layer reachability, no HTTP semantics.
    Reachability { host: String, port: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    /// Stable identity: the source name for `Source` targets, the hostname for
    /// `ApiServer` targets.
    pub id: String,
    pub role: TargetRole,
    pub kind: ProbeKind,
    pub timeout: Duration,
}

impl ProbeTarget {
    pub fn http(id: impl Into<String>, role: TargetRole, url: Url, timeout: Duration) -> Self {
        Self { id: id.into(), role, kind: ProbeKind::Http { url }, timeout }
    }

    pub fn reachability(
        id: impl Into<String>,
        role: TargetRole,
        host: impl Into<String>,
        port: u16,
        timeout: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            kind: ProbeKind::Reachability { host: host.into(), port },
            timeout,
        }
    }
}

/// Outcome of one probe. Produced fresh every time; only the latest per target is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheckResult {
    pub target: String,
    pub role: TargetRole,
    pub reachable: bool,
    /// Only present when reachable.
    pub latency: Option<Duration>,
    pub status: SourceStatus,
    pub checked_at: DateTime<Utc>,
    /// Scheduler cycle that issued the probe; 0 for ad-hoc probes, which the
    /// aggregator always applies.
    pub cycle: u64,
}

impl HealthCheckResult {
    pub fn online(target: &ProbeTarget, latency: Duration) -> Self {
        Self {
            target: target.id.clone(),
            role: target.role,
            reachable: true,
            latency: Some(latency),
            status: SourceStatus::Online,
            checked_at: Utc::now(),
            cycle: 0,
        }
    }

    /// Unreachable outcome; `status` should be `Offline` or `Error`.
    pub fn failed(target: &ProbeTarget, status: SourceStatus) -> Self {
        Self {
            target: target.id.clone(),
            role: target.role,
            reachable: false,
            latency: None,
            status,
            checked_at: Utc::now(),
            cycle: 0,
        }
    }

    pub fn with_cycle(mut self, cycle: u64) -> Self {
        self.cycle = cycle;
        self
    }
}

/// Coarse latency bucket used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyGrade {
    Good,
    Fair,
    Poor,
}

impl LatencyGrade {
    pub fn from_latency(latency: Duration) -> Self {
        match latency.as_millis() {
            0..50 => LatencyGrade::Good,
            50..200 => LatencyGrade::Fair,
            _ => LatencyGrade::Poor,
        }
    }
}

impl fmt::Display for LatencyGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LatencyGrade::Good => "good",
            LatencyGrade::Fair => "fair",
            LatencyGrade::Poor => "poor",
        };
        f.write_str(s)
    }
}

/// Aggregate view of every monitored network target.
///
/// Always rebuilt as a whole and swapped in atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkSnapshot {
    pub internet: bool,
    /// Only meaningful when `internet` is true.
    pub latency: Option<Duration>,
    pub ipv6: bool,
    /// API-server hostname to reachability.
    pub api_servers: BTreeMap<String, bool>,
    /// Time of the newest result folded into this snapshot.
    pub updated_at: Option<DateTime<Utc>>,
}

impl NetworkSnapshot {
    pub fn is_connected(&self) -> bool {
        self.internet
    }

    pub fn latency_grade(&self) -> Option<LatencyGrade> {
        self.latency.map(LatencyGrade::from_latency)
    }

    /// False when no API server has been probed yet.
    pub fn all_api_servers_reachable(&self) -> bool {
        !self.api_servers.is_empty() && self.api_servers.values().all(|ok| *ok)
    }
}
