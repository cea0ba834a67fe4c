//! HTTP-backed temperature sources.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use crate::retry::{with_retry, RetryConfig};
use crate::source::TemperatureSource;
use crate::types::{celsius_to_kelvin, WeatherError};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("multitemp/", env!("CARGO_PKG_VERSION"));

/// Client settings shared by the HTTP providers
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            retry: RetryConfig::default(),
        }
    }
}

/// Plumbing shared by every provider: one client, one base URL, one retry policy.
#[derive(Debug, Clone)]
struct HttpBackend {
    name: &'static str,
    client: Arc<Client>,
    base_url: Url,
    retry: RetryConfig,
}

impl HttpBackend {
    fn new(name: &'static str, base_url: &str, settings: HttpSettings) -> Result<Self, WeatherError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| WeatherError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(WeatherError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            name,
            client: Arc::new(client),
            base_url,
            retry: settings.retry,
        })
    }

    /// Base URL with `segments` appended; each segment is percent-encoded.
    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, WeatherError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| WeatherError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, WeatherError> {
        let response = with_retry(&self.retry, || self.client.get(url.clone()).send()).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status {
                provider: self.name.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| WeatherError::Parse(format!("{}: {}", self.name, e)))
    }
}

// {
//     "name": "Tokyo",
//     "main": { "temp": 296.69, "pressure": 1014, "humidity": 83 }
// }
#[derive(Debug, Deserialize)]
struct OpenWeatherMapResponse {
    main: OpenWeatherMapMain,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherMapMain {
    #[serde(rename = "temp")]
    kelvin: f64,
}

/// OpenWeatherMap current-conditions endpoint. Reports kelvin natively.
#[derive(Debug, Clone)]
pub struct OpenWeatherMap {
    http: HttpBackend,
    api_key: String,
}

impl OpenWeatherMap {
    pub const NAME: &'static str = "openweathermap";
    pub const DEFAULT_BASE_URL: &'static str = "http://api.openweathermap.org";

    pub fn new(api_key: impl Into<String>) -> Result<Self, WeatherError> {
        Self::with_base_url(Self::DEFAULT_BASE_URL, api_key, HttpSettings::default())
    }

    pub fn with_base_url(
        base_url: &str,
        api_key: impl Into<String>,
        settings: HttpSettings,
    ) -> Result<Self, WeatherError> {
        Ok(Self {
            http: HttpBackend::new(Self::NAME, base_url, settings)?,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl TemperatureSource for OpenWeatherMap {
    fn name(&self) -> &str {
        Self::NAME
    }

    #[instrument(skip(self), level = "debug")]
    async fn temperature(&self, city: &str) -> Result<f64, WeatherError> {
        let mut url = self.http.url(["data", "2.5", "weather"])?;
        url.query_pairs_mut()
            .append_pair("APPID", &self.api_key)
            .append_pair("q", city);

        let data: OpenWeatherMapResponse = self.http.get_json(url).await?;
        let kelvin = data.main.kelvin;

        tracing::info!("openWeatherMap: {}: {:.2}", city, kelvin);
        Ok(kelvin)
    }
}

// { "current_observation": { "temp_c": 23.5, "temp_f": 74.3 } }
#[derive(Debug, Deserialize)]
struct WeatherUndergroundResponse {
    current_observation: WeatherUndergroundObservation,
}

#[derive(Debug, Deserialize)]
struct WeatherUndergroundObservation {
    #[serde(rename = "temp_c")]
    celsius: f64,
}

/// Weather Underground conditions endpoint. Reports Celsius, converted here.
#[derive(Debug, Clone)]
pub struct WeatherUnderground {
    http: HttpBackend,
    api_key: String,
}

impl WeatherUnderground {
    pub const NAME: &'static str = "wunderground";
    pub const DEFAULT_BASE_URL: &'static str = "http://api.wunderground.com";

    pub fn new(api_key: impl Into<String>) -> Result<Self, WeatherError> {
        Self::with_base_url(Self::DEFAULT_BASE_URL, api_key, HttpSettings::default())
    }

    pub fn with_base_url(
        base_url: &str,
        api_key: impl Into<String>,
        settings: HttpSettings,
    ) -> Result<Self, WeatherError> {
        Ok(Self {
            http: HttpBackend::new(Self::NAME, base_url, settings)?,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl TemperatureSource for WeatherUnderground {
    fn name(&self) -> &str {
        Self::NAME
    }

    #[instrument(skip(self), level = "debug")]
    async fn temperature(&self, city: &str) -> Result<f64, WeatherError> {
        let file = format!("{}.json", city);
        let url = self
            .http
            .url(["api", self.api_key.as_str(), "conditions", "q", file.as_str()])?;

        let data: WeatherUndergroundResponse = self.http.get_json(url).await?;
        let kelvin = celsius_to_kelvin(data.current_observation.celsius);

        tracing::info!("weatherUnderground: {}: {:.2}", city, kelvin);
        Ok(kelvin)
    }
}
