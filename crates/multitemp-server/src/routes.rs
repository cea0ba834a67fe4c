use std::time::Instant;

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use multitemp_weather::{MultiWeatherProvider, WeatherError};
use serde::{Deserialize, Serialize};
use tracing::{instrument, Instrument};

/// Shared by every request; the aggregator is immutable and cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    aggregator: MultiWeatherProvider,
}

impl AppState {
    pub fn new(aggregator: MultiWeatherProvider) -> Self {
        Self { aggregator }
    }
}

/// Body of a successful `/weather/{city}` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    /// Mean temperature in kelvin
    pub temp: f64,
    /// Time spent aggregating, human readable
    pub took: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(hello))
        // Everything after the prefix is the city, slashes included.
        .route("/weather/{*city}", get(weather))
        .layer(middleware::from_fn(trace_request))
        .with_state(state)
}

/// Wraps each request in a span carrying its method and path.
async fn trace_request(req: Request, next: Next) -> Response {
    let span = tracing::info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path()
    );
    next.run(req).instrument(span).await
}

async fn hello() -> &'static str {
    "hello!"
}

#[instrument(skip(state))]
async fn weather(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Result<Json<WeatherReport>, ApiError> {
    let begin = Instant::now();
    let temp = state.aggregator.temperature(&city).await?;
    let took = begin.elapsed();

    tracing::info!("{}: {:.2} K in {:?}", city, temp, took);
    Ok(Json(WeatherReport {
        city,
        temp,
        took: format!("{:?}", took),
    }))
}

/// A failed aggregation. Upstream failures are our failures, so always 500.
#[derive(Debug)]
pub struct ApiError(WeatherError);

impl From<WeatherError> for ApiError {
    fn from(err: WeatherError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!("Weather request failed: {}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}
