use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use multitemp_core::{Config, ConfigError};

/// Report the average current temperature of a city across weather providers
#[derive(Debug, Parser)]
#[command(name = "multitemp", version, about)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, env = "MULTITEMP_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config file
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    multitemp_core::init()?;

    let (mut config, _) = Config::load_validated(cli.config.as_deref()).inspect_err(|e| {
        if let Some(config_err) = ConfigError::find(e) {
            tracing::error!("{}", config_err.user_message());
        }
    })?;
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen;
    }

    tracing::info!("Multitemp starting");

    multitemp_server::serve(config).await
}
