//! Averaging temperatures across several sources.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::source::TemperatureSource;
use crate::types::WeatherError;

/// How [`MultiWeatherProvider`] walks its sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationStrategy {
    /// Query every source at once; latency is that of the slowest source.
    #[default]
    Concurrent,
    /// Query sources one after another; latency is the sum of all sources.
    Sequential,
}

/// Averages the temperature reported by a fixed set of sources.
///
/// Any single source failure fails the whole call with that source's error.
/// There is no partial average. Cloning is cheap and clones share sources.
#[derive(Clone)]
pub struct MultiWeatherProvider {
    sources: Arc<[Arc<dyn TemperatureSource>]>,
    strategy: AggregationStrategy,
}

impl fmt::Debug for MultiWeatherProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiWeatherProvider")
            .field("sources", &self.source_names())
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl MultiWeatherProvider {
    pub fn new(sources: Vec<Arc<dyn TemperatureSource>>) -> Result<Self, WeatherError> {
        if sources.is_empty() {
            return Err(WeatherError::NoSources);
        }

        Ok(Self {
            sources: sources.into(),
            strategy: AggregationStrategy::default(),
        })
    }

    pub fn with_strategy(mut self, strategy: AggregationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> AggregationStrategy {
        self.strategy
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Mean temperature of `city` across all sources, in kelvin.
    ///
    /// # Errors
    ///
    /// Returns the first source error observed, unchanged.
    #[instrument(skip(self), fields(sources = self.sources.len(), strategy = ?self.strategy))]
    pub async fn temperature(&self, city: &str) -> Result<f64, WeatherError> {
        let mean = match self.strategy {
            AggregationStrategy::Concurrent => self.concurrent(city).await?,
            AggregationStrategy::Sequential => self.sequential(city).await?,
        };

        tracing::debug!("Mean temperature for {}: {:.2}", city, mean);
        Ok(mean)
    }

    async fn concurrent(&self, city: &str) -> Result<f64, WeatherError> {
        let n = self.sources.len();
        let city: Arc<str> = Arc::from(city);

        // Room for every outcome, so late senders never wait on a receiver
        // that has already gone away.
        let (tx, mut rx) = mpsc::channel::<Result<f64, WeatherError>>(n);
        let mut tasks = AbortOnDrop(Vec::with_capacity(n));

        for source in self.sources.iter() {
            let source = Arc::clone(source);
            let city = Arc::clone(&city);
            let tx = tx.clone();

            tasks.0.push(tokio::spawn(async move {
                let outcome = source.temperature(&city).await;
                match &outcome {
                    Ok(kelvin) => tracing::debug!(source = source.name(), kelvin, "source reported"),
                    Err(e) => tracing::debug!(source = source.name(), error = %e, "source failed"),
                }
                let _ = tx.send(outcome).await;
            }));
        }
        drop(tx);

        let mut sum = 0.0;
        for _ in 0..n {
            match rx.recv().await {
                Some(Ok(kelvin)) => sum += kelvin,
                Some(Err(e)) => {
                    tracing::warn!("Aborting aggregation for {}: {}", city, e);
                    return Err(e);
                }
                None => {
                    return Err(WeatherError::Unavailable(
                        "a temperature source stopped without reporting".to_string(),
                    ));
                }
            }
        }

        Ok(sum / n as f64)
    }

    async fn sequential(&self, city: &str) -> Result<f64, WeatherError> {
        let mut sum = 0.0;

        for source in self.sources.iter() {
            sum += source.temperature(city).await.map_err(|e| {
                tracing::warn!("Aborting aggregation for {} at {}: {}", city, source.name(), e);
                e
            })?;
        }

        Ok(sum / self.sources.len() as f64)
    }
}

/// Aborts still-running source tasks when the aggregation returns early or
/// its future is dropped.
struct AbortOnDrop(Vec<JoinHandle<()>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}
