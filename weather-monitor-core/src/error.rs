use std::fmt;

use thiserror::Error;

/// Errors raised by [`SourceRegistry`](crate::SourceRegistry) selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Source index {index} is out of range (registry holds {len} sources)")]
    InvalidIndex { index: usize, len: usize },

    #[error("Unknown source '{name}'")]
    UnknownSource { name: String },
}

/// Rejected location queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Please enter a city name")]
    Empty,

    #[error("Please enter a valid city name (got placeholder text '{0}')")]
    Placeholder(String),
}

/// Category of a failed weather fetch. This is what callers dispatch on;
/// the message carried by [`FetchError`] is for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    NotFound,
    Timeout,
    Unreachable,
    AuthFailure,
    RateLimited,
    ServiceUnavailable,
    MalformedResponse,
    NetworkError,
}

impl FetchErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::NotFound => "not-found",
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::Unreachable => "unreachable",
            FetchErrorKind::AuthFailure => "auth-failure",
            FetchErrorKind::RateLimited => "rate-limited",
            FetchErrorKind::ServiceUnavailable => "service-unavailable",
            FetchErrorKind::MalformedResponse => "malformed-response",
            FetchErrorKind::NetworkError => "network-error",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified weather fetch failure. Exactly one is produced per failed call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("City '{query}' not found. Please check the spelling and try again.")]
    NotFound { query: String },

    #[error("Request timeout. Please check your internet connection and try again.")]
    Timeout,

    #[error("Unable to connect to weather service at {host}. Please check your internet connection.")]
    Unreachable { host: String },

    #[error("API authentication failed. Please check the API key configuration.")]
    AuthFailure,

    #[error("Too many requests. Please wait a moment and try again.")]
    RateLimited,

    #[error("Weather service is temporarily unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Failed to parse weather data: {message}")]
    MalformedResponse { message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::NotFound { .. } => FetchErrorKind::NotFound,
            FetchError::Timeout => FetchErrorKind::Timeout,
            FetchError::Unreachable { .. } => FetchErrorKind::Unreachable,
            FetchError::AuthFailure => FetchErrorKind::AuthFailure,
            FetchError::RateLimited => FetchErrorKind::RateLimited,
            FetchError::ServiceUnavailable { .. } => FetchErrorKind::ServiceUnavailable,
            FetchError::MalformedResponse { .. } => FetchErrorKind::MalformedResponse,
            FetchError::NetworkError { .. } => FetchErrorKind::NetworkError,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        FetchError::MalformedResponse { message: message.into() }
    }
}

/// Errors from a user-initiated lookup through [`WeatherMonitor`](crate::WeatherMonitor).
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("No weather source is selected")]
    NoActiveSource,

    #[error("Weather source '{name}' is currently offline")]
    SourceOffline { name: String },

    #[error(transparent)]
    InvalidLocation(#[from] LocationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl LookupError {
    /// The fetch category, when the failure reached the network layer or was
    /// short-circuited against an offline source.
    pub fn fetch_kind(&self) -> Option<FetchErrorKind> {
        match self {
            LookupError::Fetch(err) => Some(err.kind()),
            LookupError::SourceOffline { .. } => Some(FetchErrorKind::Unreachable),
            _ => None,
        }
    }
}
