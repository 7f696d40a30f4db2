//! TCP submitter
//!
//! Writes newline-delimited JSON to a Logstash `tcp` input. The connection
//! is opened lazily and re-opened after a failure. Connecting and writing
//! are each bounded by the submitter's timeout.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

use super::{DEFAULT_TIMEOUT, Endpoint, Submitter, SubmitterError};

pub struct TcpSubmitter {
    endpoint: Endpoint,
    timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl TcpSubmitter {
    /// Creates a submitter for `host:port`; no connection is made yet
    pub fn new(host: &str, port: u16) -> Result<Self, SubmitterError> {
        Ok(Self {
            endpoint: Endpoint::new(host, port)?,
            timeout: DEFAULT_TIMEOUT,
            stream: Mutex::new(None),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn connect(&self) -> Result<TcpStream, SubmitterError> {
        debug!("Connecting to log indexer at {}", self.endpoint);
        let address = (self.endpoint.host.as_str(), self.endpoint.port);
        let stream = timeout(self.timeout, TcpStream::connect(address))
            .await
            .map_err(|_| SubmitterError::Timeout(self.timeout))??;
        Ok(stream)
    }
}

#[async_trait]
impl Submitter for TcpSubmitter {
    async fn push(&self, payload: &str) -> Result<(), SubmitterError> {
        let mut guard = self.stream.lock().await;

        let stream = match guard.take() {
            Some(stream) => stream,
            None => self.connect().await?,
        };
        let stream = guard.insert(stream);

        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.extend_from_slice(payload.as_bytes());
        frame.push(b'\n');

        let written = match timeout(self.timeout, stream.write_all(&frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SubmitterError::Io(e)),
            Err(_) => Err(SubmitterError::Timeout(self.timeout)),
        };

        if written.is_err() {
            // Next push reconnects
            *guard = None;
        }

        written
    }

    fn description(&self) -> String {
        self.endpoint.to_string()
    }
}
