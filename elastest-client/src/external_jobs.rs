//! External job API endpoints

use crate::ElasTestClient;
use crate::error::{ClientError, Result};
use elastest_core::domain::ExternalJob;
use tracing::debug;

impl ElasTestClient {
    // =============================================================================
    // External Job Lifecycle
    // =============================================================================

    /// Register a build as an external job
    ///
    /// # Arguments
    /// * `job` - The job to create, usually unassigned
    ///
    /// # Returns
    /// The platform's record, with execution id and URLs filled in
    pub async fn create_external_job(&self, job: &ExternalJob) -> Result<ExternalJob> {
        let url = self.external_job_url();
        debug!("Creating external job '{}' at {}", job.job_name(), url);

        let response = self
            .authorize(self.client.post(&url))
            .json(job)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Fetch the current state of an external job
    ///
    /// # Arguments
    /// * `job` - A job previously returned by [`Self::create_external_job`]
    pub async fn get_external_job(&self, job: &ExternalJob) -> Result<ExternalJob> {
        if job.t_job_exec_id() == 0 {
            return Err(ClientError::InvalidRequest(format!(
                "external job '{}' has no execution id yet",
                job.job_name()
            )));
        }

        let url = format!("{}/{}", self.external_job_url(), job.t_job_exec_id());
        let response = self.authorize(self.client.get(&url)).send().await?;

        self.handle_response(response).await
    }

    /// Push the final state of an external job
    ///
    /// The response body is ignored; a non-success status is still an error.
    pub async fn update_external_job(&self, job: &ExternalJob) -> Result<()> {
        let url = self.external_job_url();
        debug!(
            "Sending final state of execution {} to {}",
            job.t_job_exec_id(),
            url
        );

        let response = self
            .authorize(self.client.put(&url))
            .json(job)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn assigned(exec_id: i64, ready: bool) -> serde_json::Value {
        json!({
            "jobName": "my-job",
            "executionUrl": "http://et/#/exec/1",
            "analyzerUrl": "http://et/#/loganalyzer",
            "tJobExecId": exec_id,
            "logstashPort": "5002",
            "servicesIp": "10.0.0.2",
            "ready": ready,
            "envVars": { "ET_SUT_HOST": "10.0.0.9" }
        })
    }

    fn assigned_job(exec_id: i64) -> ExternalJob {
        serde_json::from_value(assigned(exec_id, false)).unwrap()
    }

    #[tokio::test]
    async fn test_create_posts_job_and_parses_reply() {
        let server = MockServer::start().await;
        let job = ExternalJob::new("my-job");

        Mock::given(method("POST"))
            .and(path("/api/external/tjob"))
            .and(body_json(serde_json::to_value(&job).unwrap()))
            .respond_with(ResponseTemplate::new(200).set_body_json(assigned(17, false)))
            .expect(1)
            .mount(&server)
            .await;

        let client = ElasTestClient::new(server.uri());
        let created = client.create_external_job(&job).await.unwrap();

        assert_eq!(created.t_job_exec_id(), 17);
        assert_eq!(created.services_ip(), Some("10.0.0.2"));
        assert_eq!(
            created.env_vars().get("ET_SUT_HOST").map(String::as_str),
            Some("10.0.0.9")
        );
    }

    #[tokio::test]
    async fn test_credentials_are_sent_as_basic_auth() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/external/tjob"))
            .and(header("Authorization", "Basic dXNlcjpwYXNz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(assigned(1, false)))
            .expect(1)
            .mount(&server)
            .await;

        let client = ElasTestClient::new(server.uri()).with_credentials("user", "pass");
        client
            .create_external_job(&ExternalJob::new("my-job"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_auth_header_without_full_credentials() {
        for (user, pass) in [("", ""), ("user", ""), ("", "pass")] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(assigned(1, false)))
                .mount(&server)
                .await;

            let client = ElasTestClient::new(server.uri()).with_credentials(user, pass);
            client
                .create_external_job(&ExternalJob::new("my-job"))
                .await
                .unwrap();

            let requests = server.received_requests().await.unwrap();
            assert_eq!(requests.len(), 1);
            assert!(!requests[0].headers.contains_key("authorization"));
        }
    }

    #[tokio::test]
    async fn test_create_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = ElasTestClient::new(server.uri())
            .create_external_job(&ExternalJob::new("my-job"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::ApiError { status: 500, ref message } if message == "boom"));
        assert!(err.is_remote_communication());
    }

    #[tokio::test]
    async fn test_create_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = ElasTestClient::new(server.uri())
            .create_external_job(&ExternalJob::new("my-job"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_create_unreachable_platform() {
        let err = ElasTestClient::new("http://127.0.0.1:1")
            .create_external_job(&ExternalJob::new("my-job"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::RequestFailed(_)));
        assert!(err.is_remote_communication());
    }

    #[tokio::test]
    async fn test_get_fetches_by_execution_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/external/tjob/17"))
            .respond_with(ResponseTemplate::new(200).set_body_json(assigned(17, true)))
            .expect(1)
            .mount(&server)
            .await;

        let client = ElasTestClient::new(server.uri());
        let status = client
            .get_external_job(&assigned_job(17))
            .await
            .unwrap();

        assert!(status.is_ready());
    }

    #[tokio::test]
    async fn test_get_requires_execution_id() {
        let err = ElasTestClient::new("http://127.0.0.1:1")
            .get_external_job(&ExternalJob::new("my-job"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_update_puts_current_state() {
        let server = MockServer::start().await;
        let mut job = assigned_job(17);
        job.set_result(true);

        Mock::given(method("PUT"))
            .and(path("/api/external/tjob"))
            .and(body_json(serde_json::to_value(&job).unwrap()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        ElasTestClient::new(server.uri())
            .update_external_job(&job)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_propagates_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = ElasTestClient::new(server.uri())
            .update_external_job(&assigned_job(17))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }
}
