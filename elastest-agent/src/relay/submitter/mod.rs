//! Submitters
//!
//! Transports pushing formatted payloads to the log indexer.

mod http;
mod tcp;

pub use http::HttpSubmitter;
pub use tcp::TcpSubmitter;

use async_trait::async_trait;
use elastest_core::domain::ExternalJob;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Limit applied to one connect or send unless configured otherwise
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised by submitters
#[derive(Debug, Error)]
pub enum SubmitterError {
    /// The indexer endpoint is missing or invalid
    #[error("Invalid indexer configuration: {0}")]
    Configuration(String),

    #[error("I/O error talking to the indexer: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error talking to the indexer: {0}")]
    Http(#[from] reqwest::Error),

    /// The indexer answered with a non-success status
    #[error("Indexer rejected the payload (status {0})")]
    Rejected(u16),

    /// Connecting or sending took longer than the configured limit
    #[error("Indexer did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Failed to serialize the payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Kind of indexer a submitter talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerType {
    Logstash,
}

impl fmt::Display for IndexerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexerType::Logstash => write!(f, "logstash"),
        }
    }
}

/// Transport used to reach the indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerTransport {
    /// Newline-delimited JSON over a TCP connection
    Tcp,
    /// One HTTP POST per payload
    Http,
}

impl FromStr for IndexerTransport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "http" => Ok(Self::Http),
            other => Err(format!("unknown indexer transport '{}'", other)),
        }
    }
}

/// Pushes formatted payloads to a log indexer
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Sends one payload; the payload is not retried on failure
    async fn push(&self, payload: &str) -> Result<(), SubmitterError>;

    /// Human readable endpoint, `host:port`
    fn description(&self) -> String;

    fn indexer_type(&self) -> IndexerType {
        IndexerType::Logstash
    }
}

/// Host and port of an indexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: &str, port: u16) -> Result<Self, SubmitterError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(SubmitterError::Configuration("host name is required".into()));
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Builds the submitter for the indexer advertised by a ready job
///
/// The job's `servicesIp` and `logstashPort` select the endpoint.
/// Credentials are only used by the HTTP transport. `timeout` bounds every
/// connect and send.
pub fn submitter_for(
    job: &ExternalJob,
    transport: IndexerTransport,
    username: &str,
    password: &str,
    timeout: Duration,
) -> Result<Arc<dyn Submitter>, SubmitterError> {
    let host = job.services_ip().unwrap_or_default();
    let port = job
        .logstash_port()
        .ok_or_else(|| SubmitterError::Configuration("logstash port is missing".into()))?;
    let port = port
        .trim()
        .parse::<u16>()
        .map_err(|_| SubmitterError::Configuration(format!("invalid logstash port '{}'", port)))?;

    let submitter: Arc<dyn Submitter> = match transport {
        IndexerTransport::Tcp => {
            Arc::new(TcpSubmitter::new(host, port)?.with_timeout(timeout))
        }
        IndexerTransport::Http => Arc::new(
            HttpSubmitter::with_timeout(host, port, timeout)?
                .with_credentials(username, password),
        ),
    };

    Ok(submitter)
}
