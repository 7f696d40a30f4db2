//! External jobs repository
//!
//! Handles communication with ElasTest for external job operations:
//! - Creating the external job for a build
//! - Fetching its status while waiting for readiness
//! - Sending the final state

use async_trait::async_trait;
use elastest_client::{ElasTestClient, Result};
use elastest_core::domain::ExternalJob;

/// Repository trait for external job operations
#[async_trait]
pub trait ExternalJobRepository: Send + Sync {
    /// Creates the external job and returns the platform's record
    async fn create(&self, job: &ExternalJob) -> Result<ExternalJob>;

    /// Fetches the current state of a created job
    async fn fetch_status(&self, job: &ExternalJob) -> Result<ExternalJob>;

    /// Sends the final state of a job
    async fn report_final(&self, job: &ExternalJob) -> Result<()>;
}

/// HTTP implementation of ExternalJobRepository
pub struct HttpExternalJobRepository {
    client: ElasTestClient,
}

impl HttpExternalJobRepository {
    /// Creates a repository for the given ElasTest installation
    ///
    /// # Arguments
    /// * `elastest_url` - Base URL of the platform
    /// * `username` / `password` - Basic auth, ignored unless both are non-empty
    pub fn new(elastest_url: &str, username: &str, password: &str) -> Self {
        Self {
            client: ElasTestClient::new(elastest_url).with_credentials(username, password),
        }
    }

    pub fn client(&self) -> &ElasTestClient {
        &self.client
    }
}

#[async_trait]
impl ExternalJobRepository for HttpExternalJobRepository {
    async fn create(&self, job: &ExternalJob) -> Result<ExternalJob> {
        self.client.create_external_job(job).await
    }

    async fn fetch_status(&self, job: &ExternalJob) -> Result<ExternalJob> {
        self.client.get_external_job(job).await
    }

    async fn report_final(&self, job: &ExternalJob) -> Result<()> {
        self.client.update_external_job(job).await
    }
}
