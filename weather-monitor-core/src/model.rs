use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LocationError;

/// Hint text shown in an empty location field; never a real query.
pub const LOCATION_PLACEHOLDER: &str = "Enter city name";

/// Readings above this are assumed to be Fahrenheit and converted.
///
/// Known limitation: a genuine Celsius reading above 50 °C is mis-converted.
pub const FAHRENHEIT_HEURISTIC_THRESHOLD: f64 = 50.0;

/// City or place query handed to the remote API as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    query: String,
}

impl Location {
    pub fn new(query: &str) -> Result<Self, LocationError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(LocationError::Empty);
        }
        if trimmed == LOCATION_PLACEHOLDER {
            return Err(LocationError::Placeholder(trimmed.to_string()));
        }

        Ok(Self { query: trimmed.to_string() })
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query)
    }
}

/// Unit preference a reading is presented in. Requests stay pinned to metric
/// and readings always store Celsius; this only changes how they are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn as_query(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "metric",
            UnitSystem::Imperial => "imperial",
        }
    }
}

/// Time slot a reading describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotLabel {
    Current,
    /// 1-based position in the forecast list.
    Forecast(usize),
}

impl fmt::Display for SlotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotLabel::Current => f.write_str("Current"),
            SlotLabel::Forecast(n) => write!(f, "Forecast Day {n}"),
        }
    }
}

/// One normalized weather data point.
///
/// Only built through [`WeatherReading::from_raw`], so the stored temperature
/// is always Celsius.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReading {
    temperature_c: f64,
    humidity_pct: f64,
    wind_speed_mps: f64,
    description: String,
    slot: SlotLabel,
    units: UnitSystem,
}

impl WeatherReading {
    /// Build a reading from a raw upstream temperature, applying the
    /// Fahrenheit heuristic so the stored value is always Celsius.
    pub fn from_raw(
        raw_temperature: f64,
        humidity_pct: f64,
        wind_speed_mps: f64,
        description: String,
        slot: SlotLabel,
        units: UnitSystem,
    ) -> Self {
        Self {
            temperature_c: normalize_temperature(raw_temperature),
            humidity_pct,
            wind_speed_mps,
            description,
            slot,
            units,
        }
    }

    /// Same reading, presented in `units`.
    pub fn with_units(mut self, units: UnitSystem) -> Self {
        self.units = units;
        self
    }

    pub fn temperature_celsius(&self) -> f64 {
        self.temperature_c
    }

    pub fn temperature_fahrenheit(&self) -> f64 {
        celsius_to_fahrenheit(self.temperature_c)
    }

    /// Percentage; 0–100 expected, not clamped.
    pub fn humidity_pct(&self) -> f64 {
        self.humidity_pct
    }

    pub fn wind_speed_mps(&self) -> f64 {
        self.wind_speed_mps
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn slot(&self) -> SlotLabel {
        self.slot
    }

    pub fn units(&self) -> UnitSystem {
        self.units
    }
}

impl fmt::Display for WeatherReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Date: {}", self.slot)?;
        match self.units {
            UnitSystem::Metric => writeln!(f, "Temperature: {:.1}°C", self.temperature_c)?,
            UnitSystem::Imperial => writeln!(f, "Temperature: {:.1}°F", self.temperature_fahrenheit())?,
        }
        writeln!(f, "Humidity: {}%", self.humidity_pct)?;
        writeln!(f, "Wind Speed: {} m/s", self.wind_speed_mps)?;
        write!(f, "Description: {}", self.description)
    }
}

/// Apply the >50 ⇒ Fahrenheit heuristic.
pub fn normalize_temperature(raw: f64) -> f64 {
    if raw > FAHRENHEIT_HEURISTIC_THRESHOLD {
        fahrenheit_to_celsius(raw)
    } else {
        raw
    }
}

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}
