//! EIM (ElasTest Instrumentation Manager) client
//!
//! EIM controls agents deployed next to the system under test. The bridge only
//! uses its controllability endpoints to inject packet loss or CPU stress.

use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::error::{ClientError, Result};

/// HTTP client for the EIM controllability API
#[derive(Debug, Clone)]
pub struct EimClient {
    api_url: String,
    client: Client,
}

/// Body of a controllability request
#[derive(Debug, Serialize)]
struct ControllabilityRequest<'a> {
    exec: &'a str,
    component: &'a str,
    #[serde(rename = "packetLoss", skip_serializing_if = "Option::is_none")]
    packet_loss: Option<&'a str>,
    #[serde(rename = "stressNg", skip_serializing_if = "Option::is_none")]
    stress_ng: Option<&'a str>,
    dockerized: &'a str,
    #[serde(rename = "cronExpression")]
    cron_expression: &'a str,
}

impl<'a> ControllabilityRequest<'a> {
    fn new() -> Self {
        Self {
            exec: "EXECBEAT",
            component: "EIM",
            packet_loss: None,
            stress_ng: None,
            dockerized: "yes",
            cron_expression: "@every 60s",
        }
    }
}

impl EimClient {
    /// Creates a client for the EIM API at `api_url`
    /// (e.g. "http://172.17.0.3:8080/eim/api")
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into();
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Injects packet loss on the agent's network interface
    ///
    /// # Arguments
    /// * `agent_id` - EIM agent deployed for the system under test
    /// * `value` - Loss ratio as understood by EIM (e.g. "0.1")
    pub async fn send_packet_loss(&self, agent_id: &str, value: &str) -> Result<()> {
        let body = ControllabilityRequest {
            packet_loss: Some(value),
            ..ControllabilityRequest::new()
        };
        self.post_controllability(agent_id, "packetloss", &body).await
    }

    /// Starts a CPU burst on the agent's host
    ///
    /// # Arguments
    /// * `agent_id` - EIM agent deployed for the system under test
    /// * `value` - stress-ng load as understood by EIM
    pub async fn send_cpu_burst(&self, agent_id: &str, value: &str) -> Result<()> {
        let body = ControllabilityRequest {
            stress_ng: Some(value),
            ..ControllabilityRequest::new()
        };
        self.post_controllability(agent_id, "stress", &body).await
    }

    async fn post_controllability(
        &self,
        agent_id: &str,
        action: &str,
        body: &ControllabilityRequest<'_>,
    ) -> Result<()> {
        if agent_id.is_empty() {
            return Err(ClientError::InvalidRequest("EIM agent id is empty".into()));
        }

        let url = format!(
            "{}/agent/controllability/{}/{}",
            self.api_url, agent_id, action
        );
        info!("Sending EIM {} request to {}", action, url);

        let response = self.client.post(&url).json(body).send().await?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_packet_loss_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/eim/api/agent/controllability/agent-1/packetloss"))
            .and(body_json(json!({
                "exec": "EXECBEAT",
                "component": "EIM",
                "packetLoss": "0.2",
                "dockerized": "yes",
                "cronExpression": "@every 60s"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let eim = EimClient::new(format!("{}/eim/api/", server.uri()));
        eim.send_packet_loss("agent-1", "0.2").await.unwrap();
    }

    #[tokio::test]
    async fn test_cpu_burst_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent/controllability/agent-1/stress"))
            .and(body_json(json!({
                "exec": "EXECBEAT",
                "component": "EIM",
                "stressNg": "4",
                "dockerized": "yes",
                "cronExpression": "@every 60s"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        EimClient::new(server.uri())
            .send_cpu_burst("agent-1", "4")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failure_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = EimClient::new(server.uri())
            .send_cpu_burst("agent-1", "4")
            .await
            .unwrap_err();
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn test_empty_agent_id() {
        let err = EimClient::new("http://127.0.0.1:1")
            .send_packet_loss("", "0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }
}
