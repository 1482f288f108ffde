use chrono::{DateTime, Utc};
use reqwest::Url;
use std::fmt;

/// Last known health of a [`Source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceStatus {
    Online,
    Offline,
    Error,
    #[default]
    Unknown,
}

impl SourceStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceStatus::Online => "Online",
            SourceStatus::Offline => "Offline",
            SourceStatus::Error => "Error",
            SourceStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One configured remote weather-data provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    name: String,
    label: String,
    base_url: String,
    priority: u32,
    active: bool,
    status: SourceStatus,
    last_checked: Option<DateTime<Utc>>,
}

impl Source {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        base_url: impl Into<String>,
        priority: u32,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            base_url: base_url.into(),
            priority,
            active: false,
            status: SourceStatus::Unknown,
            last_checked: None,
        }
    }

    /// Stable identity, e.g. "openweather".
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lower is preferred.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn status(&self) -> SourceStatus {
        self.status
    }

    /// When the status was last written; `None` until the first probe lands.
    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.last_checked
    }

    /// Host part of the base URL, used for hostname-only reachability probes.
    pub fn hostname(&self) -> Option<String> {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_owned))
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub(crate) fn record_status(&mut self, status: SourceStatus, at: DateTime<Utc>) {
        self.status = status;
        self.last_checked = Some(at);
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.status)
    }
}
