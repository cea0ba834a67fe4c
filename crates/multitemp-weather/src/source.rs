//! The temperature source capability and wrappers that layer policy on top.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::types::WeatherError;

/// Anything that can report the current temperature of a city.
///
/// Implementations must return kelvin and must report every failure
/// (transport, bad status, undecodable payload) as an `Err`.
#[async_trait]
pub trait TemperatureSource: Send + Sync {
    /// Short identifier used in logs and tagged errors
    fn name(&self) -> &str;

    /// Current temperature of `city`, in kelvin
    async fn temperature(&self, city: &str) -> Result<f64, WeatherError>;
}

#[async_trait]
impl<S: TemperatureSource + ?Sized> TemperatureSource for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn temperature(&self, city: &str) -> Result<f64, WeatherError> {
        (**self).temperature(city).await
    }
}

/// Fails a source with [`WeatherError::Timeout`] once a deadline passes.
#[derive(Debug, Clone)]
pub struct WithTimeout<S> {
    inner: S,
    after: Duration,
}

impl<S> WithTimeout<S> {
    pub fn new(inner: S, after: Duration) -> Self {
        Self { inner, after }
    }
}

#[async_trait]
impl<S: TemperatureSource> TemperatureSource for WithTimeout<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn temperature(&self, city: &str) -> Result<f64, WeatherError> {
        match tokio::time::timeout(self.after, self.inner.temperature(city)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    source = self.inner.name(),
                    "No answer for {} within {:?}",
                    city,
                    self.after
                );
                Err(WeatherError::Timeout {
                    provider: self.inner.name().to_string(),
                    after: self.after,
                })
            }
        }
    }
}

/// Wraps every error from the inner source in [`WeatherError::Provider`]
/// so callers can tell which source failed.
#[derive(Debug, Clone)]
pub struct Tagged<S> {
    inner: S,
}

impl<S> Tagged<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: TemperatureSource> TemperatureSource for Tagged<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn temperature(&self, city: &str) -> Result<f64, WeatherError> {
        self.inner
            .temperature(city)
            .await
            .map_err(|e| WeatherError::Provider {
                name: self.inner.name().to_string(),
                source: Box::new(e),
            })
    }
}

/// Builder-style helpers for wrapping sources.
pub trait SourceExt: TemperatureSource + Sized {
    fn with_timeout(self, after: Duration) -> WithTimeout<Self> {
        WithTimeout::new(self, after)
    }

    fn tagged(self) -> Tagged<Self> {
        Tagged::new(self)
    }
}

impl<S: TemperatureSource + Sized> SourceExt for S {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow {
        delay: Duration,
        outcome: Result<f64, &'static str>,
    }

    #[async_trait]
    impl TemperatureSource for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn temperature(&self, _city: &str) -> Result<f64, WeatherError> {
            tokio::time::sleep(self.delay).await;
            self.outcome
                .map_err(|msg| WeatherError::Unavailable(msg.to_string()))
        }
    }

    #[tokio::test]
    async fn test_timeout_passes_through_fast_answer() {
        let source = Slow {
            delay: Duration::from_millis(5),
            outcome: Ok(280.0),
        }
        .with_timeout(Duration::from_secs(1));

        assert_eq!(source.temperature("Oslo").await.unwrap(), 280.0);
    }

    #[tokio::test]
    async fn test_timeout_expires() {
        let source = Slow {
            delay: Duration::from_millis(500),
            outcome: Ok(280.0),
        }
        .with_timeout(Duration::from_millis(20));

        let err = source.temperature("Oslo").await.unwrap_err();
        match err {
            WeatherError::Timeout { provider, after } => {
                assert_eq!(provider, "slow");
                assert_eq!(after, Duration::from_millis(20));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tagged_names_the_failing_source() {
        let source = Slow {
            delay: Duration::ZERO,
            outcome: Err("provider unavailable"),
        }
        .tagged();

        let err = source.temperature("Oslo").await.unwrap_err();
        assert_eq!(err.to_string(), "slow: provider unavailable");
        assert!(matches!(err, WeatherError::Provider { ref name, .. } if name == "slow"));
    }

    #[tokio::test]
    async fn test_tagged_leaves_success_alone() {
        let source = Slow {
            delay: Duration::ZERO,
            outcome: Ok(300.5),
        }
        .tagged();

        assert_eq!(source.temperature("Oslo").await.unwrap(), 300.5);
    }

    #[tokio::test]
    async fn test_wrappers_compose_over_shared_source() {
        let shared: Arc<dyn TemperatureSource> = Arc::new(Slow {
            delay: Duration::from_millis(200),
            outcome: Ok(1.0),
        });
        let source = shared.with_timeout(Duration::from_millis(10)).tagged();

        let err = source.temperature("Oslo").await.unwrap_err();
        assert_eq!(source.name(), "slow");
        assert!(matches!(
            err,
            WeatherError::Provider { source, .. } if matches!(*source, WeatherError::Timeout { .. })
        ));
    }
}
