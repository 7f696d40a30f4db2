//! Agent configuration
//!
//! Connection settings for the ElasTest installation plus the tunables of
//! the readiness poll and the log relay.

use elastest_core::domain::{CatalogError, TssCatalog};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::relay::IndexerTransport;
use crate::service::PollPolicy;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingVar(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Agent configuration
#[derive(Clone)]
pub struct Config {
    /// ElasTest base URL (e.g., "http://localhost:37000")
    pub elastest_url: String,

    /// Basic auth user, empty when the installation is open
    pub username: String,

    /// Basic auth password, empty when the installation is open
    pub password: String,

    /// Delay between two readiness checks
    pub poll_interval: Duration,

    /// Maximum time to wait for the external job to become ready
    pub ready_timeout: Duration,

    /// Optional TOML file replacing the built-in service catalog
    pub tss_catalog_path: Option<PathBuf>,

    /// How console lines reach the log indexer
    pub indexer_transport: IndexerTransport,

    /// Limit for one connect or send to the log indexer
    pub indexer_timeout: Duration,

    /// How long teardown waits for queued log lines
    pub relay_drain_timeout: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(elastest_url: String) -> Self {
        Self {
            elastest_url,
            username: String::new(),
            password: String::new(),
            poll_interval: Duration::from_millis(500),
            ready_timeout: Duration::from_secs(600),
            tss_catalog_path: None,
            indexer_transport: IndexerTransport::Tcp,
            indexer_timeout: Duration::from_secs(5),
            relay_drain_timeout: Duration::from_secs(10),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - ELASTEST_URL (required)
    /// - ELASTEST_USERNAME / ELASTEST_PASSWORD (optional)
    /// - ELASTEST_POLL_INTERVAL_MS (optional, default: 500)
    /// - ELASTEST_READY_TIMEOUT_SECS (optional, default: 600)
    /// - ELASTEST_TSS_CATALOG (optional, path to a TOML catalog)
    /// - ELASTEST_INDEXER_TRANSPORT (optional, "tcp" or "http", default: tcp)
    /// - ELASTEST_INDEXER_TIMEOUT_SECS (optional, default: 5)
    /// - ELASTEST_RELAY_DRAIN_SECS (optional, default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`Self::from_env`], reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let elastest_url =
            lookup("ELASTEST_URL").ok_or(ConfigError::MissingVar("ELASTEST_URL"))?;

        let mut config = Self::new(elastest_url);

        config.username = lookup("ELASTEST_USERNAME").unwrap_or_default();
        config.password = lookup("ELASTEST_PASSWORD").unwrap_or_default();

        if let Some(ms) = parse_number(&lookup, "ELASTEST_POLL_INTERVAL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }

        if let Some(secs) = parse_number(&lookup, "ELASTEST_READY_TIMEOUT_SECS")? {
            config.ready_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_number(&lookup, "ELASTEST_INDEXER_TIMEOUT_SECS")? {
            config.indexer_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_number(&lookup, "ELASTEST_RELAY_DRAIN_SECS")? {
            config.relay_drain_timeout = Duration::from_secs(secs);
        }

        config.tss_catalog_path = lookup("ELASTEST_TSS_CATALOG")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        if let Some(transport) = lookup("ELASTEST_INDEXER_TRANSPORT") {
            config.indexer_transport = transport.parse().map_err(ConfigError::Invalid)?;
        }

        Ok(config)
    }

    /// Loads and validates configuration from the environment
    ///
    /// Defaults are used only when ELASTEST_URL is not set at all; any
    /// invalid value is an error.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|name| std::env::var(name).ok())
    }

    /// Like [`Self::load`], reading variables through `lookup`
    pub fn load_from<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = match Self::from_lookup(lookup) {
            Ok(config) => config,
            Err(ConfigError::MissingVar(name)) => {
                info!("{} not set, using default configuration", name);
                Self::default()
            }
            Err(e) => return Err(e),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.elastest_url.is_empty() {
            return Err(ConfigError::Invalid("elastest_url cannot be empty".into()));
        }

        if !self.elastest_url.starts_with("http://") && !self.elastest_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid(
                "elastest_url must start with http:// or https://".into(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "poll_interval must be greater than 0".into(),
            ));
        }

        if self.indexer_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "indexer_timeout must be greater than 0".into(),
            ));
        }

        if self.ready_timeout < self.poll_interval {
            return Err(ConfigError::Invalid(
                "ready_timeout must not be shorter than poll_interval".into(),
            ));
        }

        Ok(())
    }

    /// Whether requests to ElasTest carry credentials
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    /// The readiness poll policy described by this configuration
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: self.poll_interval,
            timeout: self.ready_timeout,
        }
    }

    /// Loads the service catalog, falling back to the built-in table
    pub fn load_catalog(&self) -> Result<TssCatalog, ConfigError> {
        match &self.tss_catalog_path {
            Some(path) => Ok(TssCatalog::load(path)?),
            None => Ok(TssCatalog::builtin()),
        }
    }
}

/// Parses an optional numeric variable; a present but malformed value is an error
fn parse_number<F>(lookup: &F, name: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(None);
    };

    value
        .trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::Invalid(format!("{} must be a number, got '{}'", name, value)))
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://localhost:37000".to_string())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("elastest_url", &self.elastest_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("poll_interval", &self.poll_interval)
            .field("ready_timeout", &self.ready_timeout)
            .field("tss_catalog_path", &self.tss_catalog_path)
            .field("indexer_transport", &self.indexer_transport)
            .field("indexer_timeout", &self.indexer_timeout)
            .field("relay_drain_timeout", &self.relay_drain_timeout)
            .finish()
    }
}
