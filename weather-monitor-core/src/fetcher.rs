use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::model::{Location, SlotLabel, UnitSystem, WeatherReading};
use crate::source::Source;

/// Units every request is pinned to; the temperature path only handles Celsius.
const REQUEST_UNITS: UnitSystem = UnitSystem::Metric;

/// Performs data requests against whichever [`Source`] the caller passes in.
///
/// Holds no per-call state: every call builds, sends and parses its own request.
#[derive(Debug, Clone)]
pub struct WeatherFetcher {
    api_key: String,
    http: Client,
    /// Presentation preference stamped on every reading.
    units: UnitSystem,
}

impl WeatherFetcher {
    pub fn new(api_key: String, connect_timeout: Duration, read_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .timeout(connect_timeout + read_timeout)
            .build()
            .context("Failed to build HTTP client for weather requests")?;

        Ok(Self::with_client(api_key, http))
    }

    pub fn with_client(api_key: String, http: Client) -> Self {
        Self { api_key, http, units: UnitSystem::default() }
    }

    pub fn with_units(mut self, units: UnitSystem) -> Self {
        self.units = units;
        self
    }

    pub async fn current(&self, location: &Location, source: &Source) -> Result<WeatherReading, FetchError> {
        let body = self.fetch(location, source, "weather").await?;
        parse_current(&body)
            .map(|reading| reading.with_units(self.units))
            .inspect_err(|err| warn!(source = source.name(), kind = %err.kind(), "current weather unusable"))
    }

    /// At most `count` readings; fewer when the response carries fewer entries.
    pub async fn forecast(
        &self,
        location: &Location,
        source: &Source,
        count: usize,
    ) -> Result<Vec<WeatherReading>, FetchError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let body = self.fetch(location, source, "forecast").await?;
        parse_forecast(&body, count)
            .map(|readings| readings.into_iter().map(|r| r.with_units(self.units)).collect())
            .inspect_err(|err| warn!(source = source.name(), kind = %err.kind(), "forecast unusable"))
    }

    async fn fetch(&self, location: &Location, source: &Source, endpoint: &str) -> Result<String, FetchError> {
        let url = endpoint_url(source.base_url(), endpoint);
        let host = source.hostname().unwrap_or_else(|| source.base_url().to_string());

        // The credential is a query parameter, so only the bare URL is logged.
        debug!(source = source.name(), %url, query = location.query(), "requesting weather data");

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", location.query()),
                ("appid", self.api_key.as_str()),
                ("units", REQUEST_UNITS.as_query()),
            ])
            .send()
            .await
            .map_err(|err| classify_transport(&err, &host))
            .inspect_err(|err| warn!(source = source.name(), kind = %err.kind(), "weather request failed"))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let err = classify_status(status, location, &body);
            warn!(source = source.name(), code = status.as_u16(), kind = %err.kind(), "weather service rejected request");
            return Err(err);
        }

        res.text().await.map_err(|err| classify_transport(&err, &host))
    }
}

/// Map a non-success HTTP status to its category.
pub fn classify_status(status: StatusCode, location: &Location, body: &str) -> FetchError {
    match status {
        StatusCode::NOT_FOUND => FetchError::NotFound { query: location.query().to_string() },
        StatusCode::UNAUTHORIZED => FetchError::AuthFailure,
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
        s if s.is_server_error() => FetchError::ServiceUnavailable {
            message: format!("HTTP {}: {}", s.as_u16(), truncate_body(body)),
        },
        s => FetchError::NetworkError {
            message: format!("Failed to fetch weather data. HTTP Error: {}", s.as_u16()),
        },
    }
}

fn classify_transport(err: &reqwest::Error, host: &str) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_connect() {
        FetchError::Unreachable { host: host.to_string() }
    } else {
        FetchError::NetworkError { message: err.to_string() }
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

/// Shared shape of the current-conditions body and each forecast `list` entry.
#[derive(Debug, Deserialize)]
struct OwEntry {
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

pub fn parse_current(body: &str) -> Result<WeatherReading, FetchError> {
    let value = parse_body(body)?;
    parse_entry(&value, SlotLabel::Current)
}

pub fn parse_forecast(body: &str, count: usize) -> Result<Vec<WeatherReading>, FetchError> {
    let value = parse_body(body)?;

    let list = value
        .get("list")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::malformed("forecast response has no 'list' array"))?;

    list.iter()
        .take(count)
        .enumerate()
        .map(|(i, entry)| parse_entry(entry, SlotLabel::Forecast(i + 1)))
        .collect()
}

/// Decode the body and reject embedded error codes before any field extraction.
fn parse_body(body: &str) -> Result<Value, FetchError> {
    if body.trim().is_empty() {
        return Err(FetchError::malformed("empty response from weather service"));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|err| FetchError::malformed(format!("invalid JSON: {err}")))?;

    if let Some(cod) = value.get("cod") {
        let code = match cod {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };

        if code != Some(200) {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error from weather service");
            return Err(FetchError::ServiceUnavailable {
                message: format!("Weather service error ({cod}): {message}"),
            });
        }
    }

    Ok(value)
}

fn parse_entry(value: &Value, slot: SlotLabel) -> Result<WeatherReading, FetchError> {
    let entry = OwEntry::deserialize(value)
        .map_err(|err| FetchError::malformed(format!("unexpected payload: {err}")))?;

    let description = entry
        .weather
        .into_iter()
        .next()
        .map(|w| w.description)
        .ok_or_else(|| FetchError::malformed("payload has no weather condition entry"))?;

    Ok(WeatherReading::from_raw(
        entry.main.temp,
        entry.main.humidity,
        entry.wind.speed,
        description,
        slot,
        REQUEST_UNITS,
    ))
}

fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), endpoint)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
