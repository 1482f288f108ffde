//! Core library for the `weather-monitor` tool.
//!
//! This crate defines:
//! - The fixed registry of weather data sources and the active selection
//! - Health probes, their periodic scheduler and the aggregated network snapshot
//! - Weather fetching with a typed error taxonomy and Celsius-normalized readings
//! - Configuration loading
//!
//! Everything hangs off [`WeatherMonitor`]; a presentation layer reads
//! through it and registers a [`SourceObserver`] for change notifications.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod health;
pub mod model;
pub mod monitor;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod source;

mod sync;

pub use aggregator::{SourceObserver, StatusAggregator};
pub use config::{Config, FetchConfig, MonitorConfig, SourceConfig};
pub use error::{FetchError, FetchErrorKind, LocationError, LookupError, RegistryError};
pub use fetcher::WeatherFetcher;
pub use health::{HealthCheckResult, LatencyGrade, NetworkSnapshot, ProbeKind, ProbeTarget, TargetRole};
pub use model::{Location, SlotLabel, UnitSystem, WeatherReading};
pub use monitor::{Lookup, WeatherMonitor};
pub use probe::{HealthProbe, NetworkProbe};
pub use registry::SourceRegistry;
pub use scheduler::{Cadence, HealthScheduler};
pub use source::{Source, SourceStatus};
