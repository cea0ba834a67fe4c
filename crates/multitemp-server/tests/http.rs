//! End-to-end tests: real server on a loopback port, fake temperature sources.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use multitemp_server::{serve_on, WeatherReport};
use multitemp_weather::{MultiWeatherProvider, TemperatureSource, WeatherError};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

struct Fixed(Result<f64, &'static str>);

#[async_trait]
impl TemperatureSource for Fixed {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn temperature(&self, city: &str) -> Result<f64, WeatherError> {
        if city.is_empty() {
            return Err(WeatherError::Unavailable("empty city".to_string()));
        }
        self.0
            .map_err(|msg| WeatherError::Unavailable(msg.to_string()))
    }
}

struct TestServer {
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn start(sources: Vec<Arc<dyn TemperatureSource>>) -> Self {
        let aggregator = MultiWeatherProvider::new(sources).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(serve_on(listener, aggregator, async move {
            let _ = rx.await;
        }));

        Self {
            base_url,
            shutdown: Some(tx),
            handle,
        }
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not shut down")
            .unwrap()
            .unwrap();
    }
}

#[tokio::test]
async fn test_root_says_hello() {
    let server = TestServer::start(vec![Arc::new(Fixed(Ok(290.0)))]).await;

    let response = reqwest::get(format!("{}/", server.base_url)).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "hello!");

    server.stop().await;
}

#[tokio::test]
async fn test_weather_returns_mean_as_json() {
    let server = TestServer::start(vec![
        Arc::new(Fixed(Ok(290.0))),
        Arc::new(Fixed(Ok(300.0))),
        Arc::new(Fixed(Ok(295.0))),
    ])
    .await;

    let response = reqwest::get(format!("{}/weather/Tokyo", server.base_url))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("application/json"));

    let report: WeatherReport = response.json().await.unwrap();
    assert_eq!(report.city, "Tokyo");
    assert_eq!(report.temp, 295.0);
    assert!(!report.took.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_weather_city_is_percent_decoded() {
    let server = TestServer::start(vec![Arc::new(Fixed(Ok(280.0)))]).await;

    let body: serde_json::Value = reqwest::get(format!("{}/weather/New%20York", server.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["city"], "New York");
    assert_eq!(body["temp"], 280.0);

    server.stop().await;
}

#[tokio::test]
async fn test_source_failure_is_server_error() {
    let server = TestServer::start(vec![
        Arc::new(Fixed(Ok(290.0))),
        Arc::new(Fixed(Err("provider unavailable"))),
    ])
    .await;

    let response = reqwest::get(format!("{}/weather/Tokyo", server.base_url))
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), "provider unavailable");

    server.stop().await;
}

#[tokio::test]
async fn test_missing_city_is_never_a_report() {
    let server = TestServer::start(vec![Arc::new(Fixed(Ok(290.0)))]).await;

    let response = reqwest::get(format!("{}/weather/", server.base_url))
        .await
        .unwrap();
    assert!(
        response.status().is_client_error() || response.status().is_server_error(),
        "got {}",
        response.status()
    );

    server.stop().await;
}

#[tokio::test]
async fn test_city_may_span_several_segments() {
    let server = TestServer::start(vec![Arc::new(Fixed(Ok(281.0)))]).await;

    let report: WeatherReport = reqwest::get(format!("{}/weather/US/New York", server.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report.city, "US/New York");
    assert_eq!(report.temp, 281.0);

    server.stop().await;
}

/// Remembers the name and fields of every span opened.
#[derive(Clone, Default)]
struct SpanRecorder(Arc<Mutex<Vec<(String, Vec<(String, String)>)>>>);

impl SpanRecorder {
    fn requests(&self) -> Vec<Vec<(String, String)>> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == "request")
            .map(|(_, fields)| fields.clone())
            .collect()
    }
}

struct FieldCollector(Vec<(String, String)>);

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{:?}", value)));
    }
}

impl<S: Subscriber> Layer<S> for SpanRecorder {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        let mut fields = FieldCollector(Vec::new());
        attrs.record(&mut fields);
        self.0
            .lock()
            .unwrap()
            .push((attrs.metadata().name().to_string(), fields.0));
    }
}

fn has_field(fields: &[(String, String)], name: &str, value: &str) -> bool {
    fields.iter().any(|(n, v)| n == name && v == value)
}

// Current-thread runtime: the server task and the client share this thread,
// so the thread-local subscriber sees every span.
#[tokio::test]
async fn test_every_request_gets_a_span_with_method_and_path() {
    let recorder = SpanRecorder::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(recorder.clone()));

    let server = TestServer::start(vec![Arc::new(Fixed(Ok(290.0)))]).await;

    let hello = reqwest::get(format!("{}/", server.base_url)).await.unwrap();
    assert_eq!(hello.status(), 200);
    let weather = reqwest::get(format!("{}/weather/Tokyo", server.base_url))
        .await
        .unwrap();
    assert_eq!(weather.status(), 200);

    server.stop().await;

    let requests = recorder.requests();
    assert!(
        requests
            .iter()
            .any(|f| has_field(f, "method", "GET") && has_field(f, "path", "/")),
        "no span for GET /: {:?}",
        requests
    );
    assert!(
        requests
            .iter()
            .any(|f| has_field(f, "method", "GET") && has_field(f, "path", "/weather/Tokyo")),
        "no span for GET /weather/Tokyo: {:?}",
        requests
    );
}
