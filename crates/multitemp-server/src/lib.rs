//! HTTP front end for Multitemp.

pub mod routes;
pub mod sources;

pub use routes::{router, AppState, WeatherReport};
pub use sources::build_aggregator;

use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use multitemp_core::Config;
use multitemp_weather::MultiWeatherProvider;
use tokio::net::TcpListener;

/// Build providers from `config`, bind, and serve until Ctrl-C.
pub async fn serve(config: Config) -> Result<()> {
    let aggregator = build_aggregator(&config).context("Failed to set up weather providers")?;
    tracing::info!(
        "Aggregating {:?} with {:?} strategy",
        aggregator.source_names(),
        aggregator.strategy()
    );

    let addr: SocketAddr = config
        .server
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address {}", config.server.listen_addr))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    serve_on(listener, aggregator, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_on<F>(
    listener: TcpListener,
    aggregator: MultiWeatherProvider,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(AppState::new(aggregator)))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
