use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Select};
use tracing::{debug, info};

use weather_monitor_core::{Config, UnitSystem, WeatherMonitor};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-monitor", version, about = "Weather source monitor")]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Use this config file instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the API key and default source interactively.
    Configure,

    /// Probe every source once and list them.
    Sources,

    /// Probe once and print network connectivity.
    Status,

    /// Monitor continuously until Ctrl-C.
    Watch {
        /// Source to select before monitoring starts.
        #[arg(long)]
        source: Option<String>,
    },

    /// Show current weather and forecast for a city.
    Show {
        /// City name.
        city: String,

        /// Number of forecast slots to print.
        #[arg(long)]
        forecast: Option<usize>,

        /// Source to query, e.g. "openweather".
        #[arg(long)]
        source: Option<String>,

        /// Print temperatures in Fahrenheit.
        #[arg(long)]
        imperial: bool,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let Cli { config: config_path, command, .. } = self;
        let mut config = load_config(config_path.as_deref())?;
        debug!(?command, "dispatching command");

        match command {
            Command::Configure => {
                configure(&mut config)?;
                save_config(config_path.as_deref(), &config)?;
                println!("Configuration saved.");
            }
            Command::Sources => {
                let monitor = WeatherMonitor::from_config(&config)?;
                monitor.scheduler().refresh_now().await;
                output::print_sources(&monitor.all_sources());
            }
            Command::Status => {
                let monitor = WeatherMonitor::from_config(&config)?;
                monitor.scheduler().refresh_now().await;
                output::print_snapshot(&monitor.snapshot());
            }
            Command::Watch { source } => {
                let monitor = WeatherMonitor::from_config(&config)?;
                monitor.add_observer(Arc::new(output::StatusPrinter));
                if let Some(name) = source {
                    monitor.select_source_by_name(&name)?;
                }
                watch(&monitor).await?;
            }
            Command::Show { city, forecast, source, imperial } => {
                if !config.has_api_key() {
                    bail!("No API key configured. Run `weather-monitor configure` first.");
                }
                if let Some(count) = forecast {
                    config.fetch.forecast_count = count;
                }
                if imperial {
                    config.fetch.units = UnitSystem::Imperial;
                }

                let monitor = WeatherMonitor::from_config(&config)?;
                if let Some(name) = source {
                    monitor.select_source_by_name(&name)?;
                }

                match monitor.lookup(&city).await {
                    Ok(lookup) => output::print_lookup(&lookup),
                    Err(err) => {
                        if let Some(hint) = output::lookup_hint(&err) {
                            eprintln!("{hint}");
                        }
                        let kind = err.fetch_kind().map(|k| k.as_str()).unwrap_or("lookup");
                        return Err(err).with_context(|| format!("Weather lookup failed ({kind})"));
                    }
                }
            }
        }

        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn save_config(path: Option<&Path>, config: &Config) -> Result<()> {
    match path {
        Some(path) => config.save_to(path),
        None => config.save(),
    }
}

fn configure(config: &mut Config) -> Result<()> {
    let api_key = Password::new("API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let names: Vec<String> = config.source_names().into_iter().map(str::to_owned).collect();
    let cursor = config
        .default_source
        .as_ref()
        .and_then(|current| names.iter().position(|n| n == current))
        .unwrap_or(0);

    let source = Select::new("Default source:", names)
        .with_starting_cursor(cursor)
        .prompt()
        .context("Failed to read default source")?;

    config.upsert_api_key(api_key.trim().to_string(), None)?;
    config.set_default_source(&source)?;
    Ok(())
}

async fn watch(monitor: &WeatherMonitor) -> Result<()> {
    let mut snapshots = monitor.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    monitor.scheduler().start();
    info!("monitoring started, press Ctrl-C to stop");

    let outcome = loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let snapshot = snapshots.borrow_and_update().clone();
                println!();
                output::print_snapshot(&snapshot);
            }
            signal = &mut ctrl_c => {
                break signal.context("Failed to listen for Ctrl-C");
            }
        }
    };

    monitor.scheduler().stop().await;
    info!("monitoring stopped");
    outcome
}
