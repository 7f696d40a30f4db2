//! EIM fault injection
//!
//! A build may ask for packet loss or a CPU burst on the system under test.
//! The request only goes out when the platform advertised an EIM endpoint and
//! agent for the execution.

use elastest_client::eim::EimClient;
use std::collections::HashMap;
use tracing::{info, warn};

pub const ET_EIM_API: &str = "ET_EIM_API";
pub const ET_EIM_SUT_AGENT_ID: &str = "ET_EIM_SUT_AGENT_ID";
pub const ET_EIM_CONTROLLABILLITY_PACKETLOSS: &str = "ET_EIM_CONTROLLABILLITY_PACKETLOSS";
pub const ET_EIM_CONTROLLABILLITY_CPUBURST: &str = "ET_EIM_CONTROLLABILLITY_CPUBURST";

/// Fault injections requested for one build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EimPlan {
    pub api_url: String,
    pub agent_id: String,
    pub packet_loss: Option<String>,
    pub cpu_burst: Option<String>,
}

impl EimPlan {
    /// Builds the plan from the job's environment and the build's environment
    ///
    /// # Arguments
    /// * `et_vars` - Variables returned by the platform (`envVars`)
    /// * `build_vars` - Environment of the build itself
    ///
    /// Returns `None` unless the platform provided both `ET_EIM_API` and
    /// `ET_EIM_SUT_AGENT_ID` and the build asked for at least one injection.
    pub fn from_env(
        et_vars: &HashMap<String, String>,
        build_vars: &HashMap<String, String>,
    ) -> Option<Self> {
        let api_url = et_vars.get(ET_EIM_API)?;
        let agent_id = et_vars.get(ET_EIM_SUT_AGENT_ID)?;

        let packet_loss = build_vars.get(ET_EIM_CONTROLLABILLITY_PACKETLOSS).cloned();
        let cpu_burst = build_vars.get(ET_EIM_CONTROLLABILLITY_CPUBURST).cloned();
        if packet_loss.is_none() && cpu_burst.is_none() {
            return None;
        }

        Some(Self {
            api_url: api_url.clone(),
            agent_id: agent_id.clone(),
            packet_loss,
            cpu_burst,
        })
    }

    /// Sends the requested injections; failures are logged, never returned
    pub async fn execute(&self) {
        let eim = EimClient::new(self.api_url.as_str());

        if let Some(value) = &self.packet_loss {
            info!(
                "Sending packet loss {} to agent {} through EIM at {}",
                value,
                self.agent_id,
                eim.api_url()
            );
            if let Err(e) = eim.send_packet_loss(&self.agent_id, value).await {
                warn!("EIM packet loss request failed: {}", e);
            }
        }

        if let Some(value) = &self.cpu_burst {
            info!(
                "Sending cpu burst {} to agent {} through EIM at {}",
                value,
                self.agent_id,
                eim.api_url()
            );
            if let Err(e) = eim.send_cpu_burst(&self.agent_id, value).await {
                warn!("EIM cpu burst request failed: {}", e);
            }
        }
    }
}
