use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

pub const OPENWEATHERMAP_KEY_ENV: &str = "OPENWEATHERMAP_API_KEY";
pub const WUNDERGROUND_KEY_ENV: &str = "WUNDERGROUND_API_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Join all errors into a single line
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub aggregator: AggregatorConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// How the aggregator walks its sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Concurrent,
    Sequential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default)]
    pub strategy: Strategy,

    /// Deadline for a single source, after which it counts as failed
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,

    /// Timeout applied to each HTTP request a provider makes
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_source_timeout_secs() -> u64 {
    10
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_initial_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            source_timeout_secs: default_source_timeout_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            max_retries: default_max_retries(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

/// Settings for one remote weather provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub api_key: String,
    pub base_url: String,
}

fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    /// Check if the API key is set (not a placeholder)
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty() && !self.api_key.starts_with("YOUR_")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_openweathermap")]
    pub openweathermap: ProviderConfig,

    #[serde(default = "default_wunderground")]
    pub wunderground: ProviderConfig,
}

fn default_openweathermap() -> ProviderConfig {
    ProviderConfig {
        enabled: true,
        api_key: "YOUR_OPENWEATHERMAP_API_KEY".to_string(),
        base_url: "http://api.openweathermap.org".to_string(),
    }
}

fn default_wunderground() -> ProviderConfig {
    ProviderConfig {
        enabled: true,
        api_key: "YOUR_WUNDERGROUND_API_KEY".to_string(),
        base_url: "http://api.wunderground.com".to_string(),
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openweathermap: default_openweathermap(),
            wunderground: default_wunderground(),
        }
    }
}

impl ProvidersConfig {
    /// Number of providers that will be queried
    pub fn enabled_count(&self) -> usize {
        [&self.openweathermap, &self.wunderground]
            .iter()
            .filter(|p| p.enabled)
            .count()
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_or_create(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing out defaults first if it is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("Writing default configuration to {}", path.display());
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config.with_env_overrides());
        }

        Self::load_from(path)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
            .context("Failed to parse config file")?;

        Ok(config.with_env_overrides())
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged; errors fail the load.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Replace API keys with values from the environment when present
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Replace API keys with whatever `lookup` returns for their variable names
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup(OPENWEATHERMAP_KEY_ENV) {
            self.providers.openweathermap.api_key = key;
        }
        if let Some(key) = lookup(WUNDERGROUND_KEY_ENV) {
            self.providers.wunderground.api_key = key;
        }
        self
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if let Err(e) = self.server.listen_addr.parse::<SocketAddr>() {
            result.add_error(
                "server.listen_addr",
                format!("Invalid socket address: {}", e),
            );
        }

        if self.aggregator.source_timeout_secs == 0 {
            result.add_error(
                "aggregator.source_timeout_secs",
                "Source timeout must be greater than 0",
            );
        }

        if self.aggregator.http_timeout_secs == 0 {
            result.add_error(
                "aggregator.http_timeout_secs",
                "HTTP timeout must be greater than 0",
            );
        } else if self.aggregator.http_timeout_secs > self.aggregator.source_timeout_secs {
            result.add_warning(
                "aggregator.http_timeout_secs",
                "HTTP timeout exceeds the source timeout; retries will be cut short",
            );
        }

        if self.aggregator.max_retries > 10 {
            result.add_warning("aggregator.max_retries", "More than 10 retries configured");
        }

        if self.aggregator.retry_initial_delay_ms > self.aggregator.retry_max_delay_ms {
            result.add_warning(
                "aggregator.retry_initial_delay_ms",
                "Initial retry delay is larger than the maximum delay",
            );
        }

        if self.providers.enabled_count() == 0 {
            result.add_error("providers", "At least one provider must be enabled");
        }

        for (name, provider) in [
            ("providers.openweathermap", &self.providers.openweathermap),
            ("providers.wunderground", &self.providers.wunderground),
        ] {
            if !provider.enabled {
                continue;
            }
            self.validate_url(&provider.base_url, &format!("{}.base_url", name), &mut result);
            if !provider.has_api_key() {
                result.add_warning(
                    format!("{}.api_key", name),
                    "API key not configured - requests will likely be rejected",
                );
            }
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the default configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("multitemp");

        Ok(config_dir.join("config.toml"))
    }
}
