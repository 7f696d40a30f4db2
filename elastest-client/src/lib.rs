//! ElasTest HTTP Client
//!
//! A small, type-safe HTTP client for the ElasTest external job API and the
//! EIM (fault injection) API.
//!
//! A client value is immutable: credentials and URLs are fixed when it is
//! built. To change the connection settings, build a new client.
//!
//! # Example
//!
//! ```no_run
//! use elastest_client::ElasTestClient;
//! use elastest_core::domain::ExternalJob;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), elastest_client::ClientError> {
//!     let client = ElasTestClient::new("http://localhost:37000")
//!         .with_credentials("user", "secret");
//!
//!     let job = client.create_external_job(&ExternalJob::new("my-job")).await?;
//!     println!("Execution {} at {:?}", job.t_job_exec_id(), job.execution_url());
//!     Ok(())
//! }
//! ```

pub mod eim;
pub mod error;
mod external_jobs;

// Re-export commonly used types
pub use eim::EimClient;
pub use error::{ClientError, Result};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// Path of the external job collection, relative to the platform URL
pub const EXTERNAL_JOB_PATH: &str = "/api/external/tjob";

/// HTTP client for the ElasTest external job API
#[derive(Debug, Clone)]
pub struct ElasTestClient {
    /// Base URL of the platform (e.g., "http://localhost:37000")
    base_url: String,
    /// Value of the Authorization header, when credentials are configured
    auth_header: Option<String>,
    /// HTTP client instance
    client: Client,
}

impl ElasTestClient {
    /// Create a new client without credentials
    ///
    /// # Example
    /// ```
    /// use elastest_client::ElasTestClient;
    ///
    /// let client = ElasTestClient::new("http://localhost:37000/");
    /// assert_eq!(client.base_url(), "http://localhost:37000");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header: None,
            client,
        }
    }

    /// Attach HTTP Basic credentials to every request
    ///
    /// Credentials are only used when both values are non-empty.
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.auth_header = basic_auth_header(username, password);
        self
    }

    /// Get the base URL of the platform
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the external job collection
    pub fn external_job_url(&self) -> String {
        format!("{}{}", self.base_url, EXTERNAL_JOB_PATH)
    }

    /// Whether requests carry an Authorization header
    pub fn has_credentials(&self) -> bool {
        self.auth_header.is_some()
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_header {
            Some(value) => request.header(reqwest::header::AUTHORIZATION, value),
            None => request,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response whose body is not needed
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

/// Builds `Basic base64(user:pass)`, or `None` unless both parts are non-empty
pub fn basic_auth_header(username: &str, password: &str) -> Option<String> {
    if username.is_empty() || password.is_empty() {
        return None;
    }
    let credentials = STANDARD.encode(format!("{}:{}", username, password));
    Some(format!("Basic {}", credentials))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ElasTestClient::new("http://localhost:37000");
        assert_eq!(client.base_url(), "http://localhost:37000");
        assert_eq!(
            client.external_job_url(),
            "http://localhost:37000/api/external/tjob"
        );
        assert!(!client.has_credentials());
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = ElasTestClient::new("http://localhost:37000/");
        assert_eq!(client.base_url(), "http://localhost:37000");
    }

    #[test]
    fn test_basic_auth_header_requires_both_parts() {
        assert_eq!(
            basic_auth_header("user", "pass"),
            Some("Basic dXNlcjpwYXNz".to_string())
        );
        assert_eq!(basic_auth_header("user", ""), None);
        assert_eq!(basic_auth_header("", "pass"), None);
        assert_eq!(basic_auth_header("", ""), None);
    }

    #[test]
    fn test_with_credentials() {
        assert!(
            ElasTestClient::new("http://et")
                .with_credentials("user", "pass")
                .has_credentials()
        );
        assert!(
            !ElasTestClient::new("http://et")
                .with_credentials("user", "")
                .has_credentials()
        );
    }
}
