//! Turns configuration into a ready-to-use aggregator.

use std::sync::Arc;
use std::time::Duration;

use multitemp_core::{AggregatorConfig, Config, Strategy};
use multitemp_weather::{
    AggregationStrategy, HttpSettings, MultiWeatherProvider, OpenWeatherMap, RetryConfig,
    SourceExt, TemperatureSource, WeatherError, WeatherUnderground,
};

fn http_settings(config: &AggregatorConfig) -> HttpSettings {
    HttpSettings {
        timeout: Duration::from_secs(config.http_timeout_secs),
        retry: RetryConfig::new(
            config.max_retries,
            config.retry_initial_delay_ms,
            config.retry_max_delay_ms,
        ),
    }
}

fn strategy(strategy: Strategy) -> AggregationStrategy {
    match strategy {
        Strategy::Concurrent => AggregationStrategy::Concurrent,
        Strategy::Sequential => AggregationStrategy::Sequential,
    }
}

/// One source per enabled provider, each bounded by the source timeout.
///
/// # Errors
///
/// Fails on an unusable base URL or when no provider is enabled.
pub fn build_aggregator(config: &Config) -> Result<MultiWeatherProvider, WeatherError> {
    let settings = http_settings(&config.aggregator);
    let deadline = Duration::from_secs(config.aggregator.source_timeout_secs);
    let providers = &config.providers;

    let mut sources: Vec<Arc<dyn TemperatureSource>> = Vec::new();

    if providers.openweathermap.enabled {
        let owm = OpenWeatherMap::with_base_url(
            &providers.openweathermap.base_url,
            providers.openweathermap.api_key.clone(),
            settings.clone(),
        )?;
        sources.push(Arc::new(owm.with_timeout(deadline)));
    }

    if providers.wunderground.enabled {
        let wu = WeatherUnderground::with_base_url(
            &providers.wunderground.base_url,
            providers.wunderground.api_key.clone(),
            settings,
        )?;
        sources.push(Arc::new(wu.with_timeout(deadline)));
    }

    Ok(MultiWeatherProvider::new(sources)?.with_strategy(strategy(config.aggregator.strategy)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_builds_both_providers() {
        let aggregator = build_aggregator(&Config::default()).unwrap();
        assert_eq!(
            aggregator.source_names(),
            vec![OpenWeatherMap::NAME, WeatherUnderground::NAME]
        );
        assert_eq!(aggregator.strategy(), AggregationStrategy::Concurrent);
    }

    #[test]
    fn test_disabled_provider_is_skipped() {
        let mut config = Config::default();
        config.providers.openweathermap.enabled = false;
        config.aggregator.strategy = Strategy::Sequential;

        let aggregator = build_aggregator(&config).unwrap();
        assert_eq!(aggregator.source_names(), vec![WeatherUnderground::NAME]);
        assert_eq!(aggregator.strategy(), AggregationStrategy::Sequential);
    }

    #[test]
    fn test_no_enabled_providers_is_an_error() {
        let mut config = Config::default();
        config.providers.openweathermap.enabled = false;
        config.providers.wunderground.enabled = false;

        assert!(matches!(
            build_aggregator(&config),
            Err(WeatherError::NoSources)
        ));
    }

    #[test]
    fn test_bad_base_url_is_an_error() {
        let mut config = Config::default();
        config.providers.wunderground.base_url = "::nope::".to_string();

        assert!(matches!(
            build_aggregator(&config),
            Err(WeatherError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_http_settings_follow_config() {
        let mut config = AggregatorConfig::default();
        config.http_timeout_secs = 3;
        config.max_retries = 0;

        let settings = http_settings(&config);
        assert_eq!(settings.timeout, Duration::from_secs(3));
        assert_eq!(settings.retry.max_retries, 0);
    }
}
