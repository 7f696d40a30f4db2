//! External job domain types
//!
//! An external job is ElasTest's record of one CI build: the TJob execution it
//! was bound to, where its results can be browsed, where its logs must be
//! shipped and which environment variables the build should see.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use super::tss::TestSupportService;

/// Binding between one build and an ElasTest TJob execution
///
/// Structure shared between the client (sends/receives it) and the agent
/// (tracks it per build). Field names follow the platform's JSON schema.
///
/// The job name is fixed at construction and the execution id cannot be
/// changed once the platform has assigned one. Readiness only moves forward,
/// see [`ExternalJob::advance`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalJob {
    #[serde(rename = "jobName")]
    job_name: String,

    #[serde(rename = "executionUrl", default)]
    execution_url: Option<String>,

    #[serde(rename = "analyzerUrl", default)]
    log_analyzer_url: Option<String>,

    #[serde(rename = "tJobExecId", default, deserialize_with = "null_as_default")]
    t_job_exec_id: i64,

    #[serde(rename = "logstashPort", default)]
    logstash_port: Option<String>,

    #[serde(rename = "servicesIp", default)]
    services_ip: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    ready: bool,

    #[serde(rename = "envVars", default, deserialize_with = "null_as_default")]
    env_vars: HashMap<String, String>,

    #[serde(rename = "tSServices", default, deserialize_with = "null_as_default")]
    tss: Vec<TestSupportService>,

    #[serde(default)]
    result: Option<i32>,

    #[serde(rename = "buildUrl", default)]
    build_url: Option<String>,
}

impl ExternalJob {
    /// Creates an unassigned job for the given CI job name
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            execution_url: None,
            log_analyzer_url: None,
            t_job_exec_id: 0,
            logstash_port: None,
            services_ip: None,
            ready: false,
            env_vars: HashMap::new(),
            tss: Vec::new(),
            result: None,
            build_url: None,
        }
    }

    /// Sets the test support services requested for this execution
    pub fn with_test_support_services(mut self, tss: Vec<TestSupportService>) -> Self {
        self.tss = tss;
        self
    }

    /// Sets the link back to the build on the CI server
    pub fn with_build_url(mut self, build_url: impl Into<String>) -> Self {
        self.build_url = Some(build_url.into());
        self
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn execution_url(&self) -> Option<&str> {
        self.execution_url.as_deref()
    }

    pub fn log_analyzer_url(&self) -> Option<&str> {
        self.log_analyzer_url.as_deref()
    }

    /// Execution id assigned by the platform, 0 while unassigned
    pub fn t_job_exec_id(&self) -> i64 {
        self.t_job_exec_id
    }

    pub fn logstash_port(&self) -> Option<&str> {
        self.logstash_port.as_deref()
    }

    pub fn services_ip(&self) -> Option<&str> {
        self.services_ip.as_deref()
    }

    /// Environment variables the platform wants injected into the build
    pub fn env_vars(&self) -> &HashMap<String, String> {
        &self.env_vars
    }

    pub fn test_support_services(&self) -> &[TestSupportService] {
        &self.tss
    }

    pub fn result(&self) -> Option<i32> {
        self.result
    }

    pub fn build_url(&self) -> Option<&str> {
        self.build_url.as_deref()
    }

    /// Whether the platform is ready to receive this build's logs
    ///
    /// Requires both the platform's ready flag and an execution URL.
    pub fn is_ready(&self) -> bool {
        self.ready && self.execution_url.is_some()
    }

    /// Records the build outcome sent with the final report (0 success, 1 failure)
    pub fn set_result(&mut self, success: bool) {
        self.result = Some(if success { 0 } else { 1 });
    }

    /// Folds a freshly fetched status into this job
    ///
    /// The fetched record wins for every server-side field, except that the
    /// job name never changes, an assigned execution id is kept, readiness
    /// never reverts and values the status response omits are retained.
    pub fn advance(&self, fetched: ExternalJob) -> ExternalJob {
        let mut next = fetched;

        next.job_name = self.job_name.clone();
        if self.t_job_exec_id != 0 {
            next.t_job_exec_id = self.t_job_exec_id;
        }
        next.ready |= self.ready;
        next.execution_url = next.execution_url.or_else(|| self.execution_url.clone());
        next.log_analyzer_url = next
            .log_analyzer_url
            .or_else(|| self.log_analyzer_url.clone());
        next.logstash_port = next.logstash_port.or_else(|| self.logstash_port.clone());
        next.services_ip = next.services_ip.or_else(|| self.services_ip.clone());
        next.build_url = next.build_url.or_else(|| self.build_url.clone());
        next.result = next.result.or(self.result);
        if next.env_vars.is_empty() {
            next.env_vars = self.env_vars.clone();
        }
        if next.tss.is_empty() {
            next.tss = self.tss.clone();
        }

        next
    }

    /// Serializes the job to its JSON wire representation
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Treats an explicit JSON `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
