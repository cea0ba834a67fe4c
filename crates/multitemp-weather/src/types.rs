use std::time::Duration;

/// Offset between the Celsius and Kelvin scales
pub const KELVIN_OFFSET: f64 = 273.15;

/// Convert a Celsius reading to Kelvin
pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + KELVIN_OFFSET
}

/// Errors produced by temperature sources and by the aggregator.
///
/// The aggregator passes source errors through untouched, so a failed
/// aggregation and a failed source share this one type.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{provider} returned HTTP {status}")]
    Status { provider: String, status: u16 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),

    #[error("{provider} timed out after {after:?}")]
    Timeout { provider: String, after: Duration },

    #[error("{name}: {source}")]
    Provider {
        name: String,
        source: Box<WeatherError>,
    },

    #[error("No temperature sources configured")]
    NoSources,

    #[error("{0}")]
    Unavailable(String),
}
