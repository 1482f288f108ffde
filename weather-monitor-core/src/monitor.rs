//! Explicit application context: the source registry (through the
//! aggregator), the health scheduler and the weather fetcher.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::aggregator::{SourceObserver, StatusAggregator};
use crate::config::Config;
use crate::error::{LookupError, RegistryError};
use crate::fetcher::WeatherFetcher;
use crate::health::NetworkSnapshot;
use crate::model::{Location, WeatherReading};
use crate::probe::{HealthProbe, NetworkProbe};
use crate::registry::SourceRegistry;
use crate::scheduler::{Cadence, HealthScheduler};
use crate::source::{Source, SourceStatus};

/// Result of a combined lookup: current conditions plus forecast slots.
#[derive(Debug, Clone)]
pub struct Lookup {
    pub source: Source,
    pub location: Location,
    pub current: WeatherReading,
    pub forecast: Vec<WeatherReading>,
}

#[derive(Debug)]
pub struct WeatherMonitor {
    aggregator: Arc<StatusAggregator>,
    scheduler: HealthScheduler,
    fetcher: Arc<WeatherFetcher>,
    forecast_count: usize,
}

impl WeatherMonitor {
    /// Wire everything up from configuration using the real network probe.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let registry = config.registry()?;
        let cadences = config.monitor.cadences(&config.sources)?;
        let fetcher = WeatherFetcher::new(
            config.api_key.clone(),
            config.fetch.connect_timeout(),
            config.fetch.read_timeout(),
        )?
        .with_units(config.fetch.units);

        Ok(Self::new(
            registry,
            Arc::new(NetworkProbe::new()),
            cadences,
            fetcher,
            config.fetch.forecast_count,
        ))
    }

    pub fn new(
        registry: SourceRegistry,
        probe: Arc<dyn HealthProbe>,
        cadences: Vec<Cadence>,
        fetcher: WeatherFetcher,
        forecast_count: usize,
    ) -> Self {
        let aggregator = Arc::new(StatusAggregator::new(registry));
        let scheduler = HealthScheduler::new(probe, aggregator.clone(), cadences);

        Self {
            aggregator,
            scheduler,
            fetcher: Arc::new(fetcher),
            forecast_count,
        }
    }

    pub fn aggregator(&self) -> &Arc<StatusAggregator> {
        &self.aggregator
    }

    pub fn scheduler(&self) -> &HealthScheduler {
        &self.scheduler
    }

    pub fn add_observer(&self, observer: Arc<dyn SourceObserver>) {
        self.aggregator.add_observer(observer);
    }

    pub fn all_sources(&self) -> Vec<Source> {
        self.aggregator.all_sources()
    }

    pub fn active_source(&self) -> Option<Source> {
        self.aggregator.active_source()
    }

    pub fn select_source(&self, index: usize) -> Result<Source, RegistryError> {
        self.aggregator.select(index)
    }

    pub fn select_source_by_name(&self, name: &str) -> Result<Source, RegistryError> {
        self.aggregator.select_by_name(name)
    }

    pub fn snapshot(&self) -> Arc<NetworkSnapshot> {
        self.aggregator.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<NetworkSnapshot>> {
        self.aggregator.subscribe()
    }

    pub async fn current_weather(&self, location: &Location) -> Result<WeatherReading, LookupError> {
        let source = usable_source(&self.aggregator)?;
        Ok(self.fetcher.current(location, &source).await?)
    }

    pub async fn forecast(&self, location: &Location, count: usize) -> Result<Vec<WeatherReading>, LookupError> {
        let source = usable_source(&self.aggregator)?;
        Ok(self.fetcher.forecast(location, &source, count).await?)
    }

    pub async fn lookup(&self, query: &str) -> Result<Lookup, LookupError> {
        run_lookup(&self.aggregator, &self.fetcher, query, self.forecast_count).await
    }

    /// Run [`lookup`](Self::lookup) on its own task, independent of the
    /// health scheduler.
    pub fn spawn_lookup(&self, query: impl Into<String>) -> JoinHandle<Result<Lookup, LookupError>> {
        let aggregator = self.aggregator.clone();
        let fetcher = self.fetcher.clone();
        let query = query.into();
        let count = self.forecast_count;

        tokio::spawn(async move { run_lookup(&aggregator, &fetcher, &query, count).await })
    }
}

async fn run_lookup(
    aggregator: &StatusAggregator,
    fetcher: &WeatherFetcher,
    query: &str,
    count: usize,
) -> Result<Lookup, LookupError> {
    let location = Location::new(query)?;
    let source = usable_source(aggregator)?;

    debug!(source = source.name(), %location, count, "weather lookup");

    let current = fetcher.current(&location, &source).await?;
    let forecast = fetcher.forecast(&location, &source, count).await?;

    Ok(Lookup { source, location, current, forecast })
}

/// The active source, unless the latest probe says it is offline.
fn usable_source(aggregator: &StatusAggregator) -> Result<Source, LookupError> {
    let source = aggregator.active_source().ok_or(LookupError::NoActiveSource)?;

    if source.status() == SourceStatus::Offline {
        return Err(LookupError::SourceOffline { name: source.name().to_string() });
    }

    Ok(source)
}
