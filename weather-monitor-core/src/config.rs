use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, path::Path, path::PathBuf, time::Duration};

use crate::health::{ProbeTarget, TargetRole};
use crate::model::UnitSystem;
use crate::registry::SourceRegistry;
use crate::scheduler::Cadence;
use crate::source::Source;

/// Port used for reachability probes against the public DNS addresses.
const DNS_PORT: u16 = 53;
/// Port used for reachability probes against API hostnames.
const HTTPS_PORT: u16 = 443;

/// One `[[sources]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub label: String,
    pub base_url: String,
    pub priority: u32,
}

impl SourceConfig {
    fn new(name: &str, label: &str, base_url: &str, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            base_url: base_url.to_string(),
            priority,
        }
    }
}

/// Probe targets and cadences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub connectivity_target: String,
    pub ipv6_target: String,
    pub connectivity_interval_secs: u64,
    pub connectivity_timeout_secs: u64,
    pub ipv6_timeout_secs: u64,
    pub api_interval_secs: u64,
    pub api_initial_delay_secs: u64,
    pub api_timeout_secs: u64,
    pub source_initial_delay_secs: u64,
    pub source_interval_secs: u64,
    pub source_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            connectivity_target: "8.8.8.8".to_string(),
            ipv6_target: "2001:4860:4860::8888".to_string(),
            connectivity_interval_secs: 30,
            connectivity_timeout_secs: 5,
            ipv6_timeout_secs: 3,
            api_interval_secs: 5,
            api_initial_delay_secs: 5,
            api_timeout_secs: 3,
            source_initial_delay_secs: 1,
            source_interval_secs: 60,
            source_timeout_secs: 3,
        }
    }
}

impl MonitorConfig {
    /// Build the three default cadences: connectivity + IPv6, API hostnames,
    /// and HTTP status probes of each source.
    pub fn cadences(&self, sources: &[SourceConfig]) -> Result<Vec<Cadence>> {
        let connectivity = Cadence::new(
            "connectivity",
            Duration::ZERO,
            Duration::from_secs(self.connectivity_interval_secs),
            vec![
                ProbeTarget::reachability(
                    self.connectivity_target.clone(),
                    TargetRole::Connectivity,
                    self.connectivity_target.clone(),
                    DNS_PORT,
                    Duration::from_secs(self.connectivity_timeout_secs),
                ),
                ProbeTarget::reachability(
                    self.ipv6_target.clone(),
                    TargetRole::Ipv6,
                    self.ipv6_target.clone(),
                    DNS_PORT,
                    Duration::from_secs(self.ipv6_timeout_secs),
                ),
            ],
        );

        let mut api_targets = Vec::with_capacity(sources.len());
        let mut source_targets = Vec::with_capacity(sources.len());

        for source in sources {
            let url = Url::parse(&source.base_url).with_context(|| {
                format!("Invalid base_url for source '{}': {}", source.name, source.base_url)
            })?;
            let host = url
                .host_str()
                .ok_or_else(|| anyhow!("base_url for source '{}' has no host", source.name))?
                .to_string();

            api_targets.push(ProbeTarget::reachability(
                host.clone(),
                TargetRole::ApiServer,
                host,
                url.port_or_known_default().unwrap_or(HTTPS_PORT),
                Duration::from_secs(self.api_timeout_secs),
            ));
            source_targets.push(ProbeTarget::http(
                source.name.clone(),
                TargetRole::Source,
                url,
                Duration::from_secs(self.source_timeout_secs),
            ));
        }

        Ok(vec![
            connectivity,
            Cadence::new(
                "api-servers",
                Duration::from_secs(self.api_initial_delay_secs),
                Duration::from_secs(self.api_interval_secs),
                api_targets,
            ),
            Cadence::new(
                "sources",
                Duration::from_secs(self.source_initial_delay_secs),
                Duration::from_secs(self.source_interval_secs),
                source_targets,
            ),
        ])
    }
}

/// Timeouts for user-initiated weather lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Forecast slots requested by a combined lookup.
    pub forecast_count: usize,
    /// How readings are presented; requests are always metric.
    pub units: UnitSystem,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            read_timeout_secs: 5,
            forecast_count: 5,
            units: UnitSystem::default(),
        }
    }
}

impl FetchConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// default_source = "openweather"
///
/// [[sources]]
/// name = "openweather"
/// label = "OpenWeatherMap"
/// base_url = "https://api.openweathermap.org/data/2.5/"
/// priority = 1
///
/// [monitor]
/// api_interval_secs = 10
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Static credential appended to every data request.
    pub api_key: String,

    /// Source selected at start-up; nothing is active when absent.
    pub default_source: Option<String>,

    pub sources: Vec<SourceConfig>,

    pub monitor: MonitorConfig,

    pub fetch: FetchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            default_source: None,
            sources: vec![
                SourceConfig::new("openweather", "OpenWeatherMap", "https://api.openweathermap.org/data/2.5/", 1),
                SourceConfig::new("weatherapi", "WeatherAPI.com", "https://api.weatherapi.com/v1/", 2),
                SourceConfig::new("accuweather", "AccuWeather", "https://dataservice.accuweather.com/", 3),
            ],
            monitor: MonitorConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl Config {
    /// Load config from the platform path, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents).context("Invalid configuration TOML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Save config to the platform path, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-monitor", "weather-monitor")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.name.as_str()) {
                bail!("Duplicate source name '{}' in configuration", source.name);
            }
            Url::parse(&source.base_url).with_context(|| {
                format!("Invalid base_url for source '{}': {}", source.name, source.base_url)
            })?;
        }

        if let Some(name) = &self.default_source {
            if !seen.contains(name.as_str()) {
                bail!(
                    "default_source '{name}' is not a configured source.\n\
                     Hint: pick one of: {}",
                    self.source_names().join(", ")
                );
            }
        }

        let m = &self.monitor;
        if m.connectivity_interval_secs == 0 || m.api_interval_secs == 0 || m.source_interval_secs == 0 {
            bail!("Monitor intervals must be greater than zero seconds");
        }
        if m.connectivity_timeout_secs == 0
            || m.ipv6_timeout_secs == 0
            || m.api_timeout_secs == 0
            || m.source_timeout_secs == 0
        {
            bail!("Monitor timeouts must be greater than zero seconds");
        }
        if self.fetch.connect_timeout_secs == 0 || self.fetch.read_timeout_secs == 0 {
            bail!("Fetch timeouts must be greater than zero seconds");
        }

        Ok(())
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    /// Set the default source; the name must be configured.
    pub fn set_default_source(&mut self, name: &str) -> Result<()> {
        if !self.sources.iter().any(|s| s.name == name) {
            bail!("Unknown source '{name}'. Supported sources: {}.", self.source_names().join(", "));
        }
        self.default_source = Some(name.to_string());
        Ok(())
    }

    /// Replace the API key and, if no default is set yet, make `source` the default.
    pub fn upsert_api_key(&mut self, api_key: String, source: Option<&str>) -> Result<()> {
        self.api_key = api_key;

        if self.default_source.is_none() {
            if let Some(name) = source {
                self.set_default_source(name)?;
            }
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Build the fixed source registry, selecting `default_source` if configured.
    pub fn registry(&self) -> Result<SourceRegistry> {
        let mut registry = SourceRegistry::new();
        for s in &self.sources {
            registry.register(Source::new(&s.name, &s.label, &s.base_url, s.priority));
        }

        if let Some(name) = &self.default_source {
            registry.select_by_name(name)?;
        }

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reproduce_three_sources() {
        let cfg = Config::default();

        assert_eq!(cfg.source_names(), ["openweather", "weatherapi", "accuweather"]);
        assert!(cfg.validate().is_ok());
        assert!(!cfg.has_api_key());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            api_key = "KEY"
            default_source = "weatherapi"

            [monitor]
            api_interval_secs = 10
            "#,
        )
        .expect("config should parse");

        assert_eq!(cfg.api_key, "KEY");
        assert_eq!(cfg.monitor.api_interval_secs, 10);
        assert_eq!(cfg.monitor.connectivity_interval_secs, 30);
        assert_eq!(cfg.fetch.read_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.sources.len(), 3);
    }

    #[test]
    fn unknown_default_source_is_rejected() {
        let err = Config::from_toml_str(r#"default_source = "metoffice""#).unwrap_err();
        assert!(format!("{err:#}").contains("default_source 'metoffice'"));
    }

    #[test]
    fn duplicate_source_names_are_rejected() {
        let mut cfg = Config::default();
        cfg.sources.push(cfg.sources[0].clone());

        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate source name"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut cfg = Config::default();
        cfg.monitor.api_interval_secs = 0;

        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let mut cfg = Config::default();
        cfg.monitor.source_timeout_secs = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("Monitor timeouts"));

        let mut cfg = Config::default();
        cfg.monitor.ipv6_timeout_secs = 0;
        assert!(cfg.validate().is_err());

        let err = Config::from_toml_str("[fetch]\nread_timeout_secs = 0\n").unwrap_err();
        assert!(format!("{err:#}").contains("Fetch timeouts"));
    }

    #[test]
    fn source_cadence_delay_and_units_are_configurable() {
        let cfg = Config::from_toml_str(
            r#"
            [monitor]
            source_initial_delay_secs = 15

            [fetch]
            units = "imperial"
            "#,
        )
        .expect("config should parse");

        let cadences = cfg.monitor.cadences(&cfg.sources).expect("cadences build");
        assert_eq!(cadences[2].initial_delay, Duration::from_secs(15));
        assert_eq!(cfg.fetch.units, UnitSystem::Imperial);
    }

    #[test]
    fn upsert_does_not_override_existing_default() {
        let mut cfg = Config::default();

        cfg.upsert_api_key("ONE".into(), Some("openweather")).expect("known source");
        cfg.upsert_api_key("TWO".into(), Some("weatherapi")).expect("known source");

        assert_eq!(cfg.api_key, "TWO");
        assert_eq!(cfg.default_source.as_deref(), Some("openweather"));
    }

    #[test]
    fn set_default_source_rejects_unknown_name() {
        let mut cfg = Config::default();
        let err = cfg.set_default_source("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown source"));
    }

    #[test]
    fn registry_selects_default_source() {
        let mut cfg = Config::default();
        let registry = cfg.registry().expect("registry builds");
        assert!(registry.active().is_none());

        cfg.set_default_source("accuweather").expect("known source");
        let registry = cfg.registry().expect("registry builds");
        assert_eq!(registry.active().map(Source::name), Some("accuweather"));
    }

    #[test]
    fn cadences_cover_every_source() {
        let cfg = Config::default();
        let cadences = cfg.monitor.cadences(&cfg.sources).expect("cadences build");

        let names: Vec<_> = cadences.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["connectivity", "api-servers", "sources"]);

        assert_eq!(cadences[0].period, Duration::from_secs(30));
        assert_eq!(cadences[0].initial_delay, Duration::ZERO);
        assert_eq!(cadences[1].initial_delay, Duration::from_secs(5));
        assert_eq!(cadences[2].initial_delay, Duration::from_secs(1));

        let hosts: Vec<_> = cadences[1].targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(hosts, ["api.openweathermap.org", "api.weatherapi.com", "dataservice.accuweather.com"]);
        assert!(cadences[2].targets.iter().all(|t| t.role == TargetRole::Source));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.upsert_api_key("SECRET".into(), Some("weatherapi")).expect("known source");
        cfg.save_to(&path).expect("save succeeds");

        let loaded = Config::load_from(&path).expect("load succeeds");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = Config::load_from(&dir.path().join("absent.toml")).expect("defaults");
        assert_eq!(loaded, Config::default());
    }
}
