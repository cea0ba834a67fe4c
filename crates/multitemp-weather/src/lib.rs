//! Temperature sources for Multitemp
//!
//! Each remote weather provider is a [`TemperatureSource`]. A
//! [`MultiWeatherProvider`] queries several of them at once and averages the
//! answers, failing fast when any one of them fails.

pub mod aggregate;
pub mod provider;
pub mod retry;
pub mod source;
pub mod types;

pub use aggregate::{AggregationStrategy, MultiWeatherProvider};
pub use provider::{HttpSettings, OpenWeatherMap, WeatherUnderground};
pub use retry::RetryConfig;
pub use source::{SourceExt, Tagged, TemperatureSource, WithTimeout};
pub use types::*;
