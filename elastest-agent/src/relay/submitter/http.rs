//! HTTP submitter
//!
//! Posts each payload to a Logstash `http` input.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

use super::{DEFAULT_TIMEOUT, Endpoint, Submitter, SubmitterError};

pub struct HttpSubmitter {
    endpoint: Endpoint,
    url: String,
    auth_header: Option<String>,
    client: Client,
}

impl HttpSubmitter {
    pub fn new(host: &str, port: u16) -> Result<Self, SubmitterError> {
        Self::with_timeout(host, port, DEFAULT_TIMEOUT)
    }

    /// Creates a submitter whose requests give up after `timeout`
    pub fn with_timeout(host: &str, port: u16, timeout: Duration) -> Result<Self, SubmitterError> {
        let endpoint = Endpoint::new(host, port)?;
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            url: format!("http://{}/", endpoint),
            endpoint,
            auth_header: None,
            client,
        })
    }

    /// Sends Basic auth when both parts are present
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.auth_header = elastest_client::basic_auth_header(username, password);
        self
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn push(&self, payload: &str) -> Result<(), SubmitterError> {
        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string());

        if let Some(auth) = &self.auth_header {
            request = request.header(AUTHORIZATION, auth);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SubmitterError::Rejected(status.as_u16()));
        }

        Ok(())
    }

    fn description(&self) -> String {
        self.endpoint.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn submitter_for(server: &MockServer) -> HttpSubmitter {
        let address = server.address();
        HttpSubmitter::new(&address.ip().to_string(), address.port()).unwrap()
    }

    #[tokio::test]
    async fn test_push_posts_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"message":"hi"}"#))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        submitter_for(&server)
            .push(r#"{"message":"hi"}"#)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_push_with_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("Authorization", "Basic dXNlcjpwYXNz"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        submitter_for(&server)
            .with_credentials("user", "pass")
            .push("{}")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_slow_indexer_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let address = server.address();
        let submitter = HttpSubmitter::with_timeout(
            &address.ip().to_string(),
            address.port(),
            Duration::from_millis(200),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let err = submitter.push("{}").await.unwrap_err();

        assert!(matches!(err, SubmitterError::Http(ref e) if e.is_timeout()));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_rejected_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = submitter_for(&server).push("{}").await.unwrap_err();
        assert!(matches!(err, SubmitterError::Rejected(503)));
    }
}
