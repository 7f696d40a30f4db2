//! Test doubles shared by the unit tests

use async_trait::async_trait;
use elastest_client::{ClientError, Result};
use elastest_core::domain::ExternalJob;
use serde_json::json;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::repository::ExternalJobRepository;

fn remote_job(exec_id: i64, ready: bool, indexer: Option<SocketAddr>) -> ExternalJob {
    serde_json::from_value(json!({
        "jobName": "remote",
        "executionUrl": format!("http://et/#/exec/{}", exec_id),
        "analyzerUrl": format!("http://et/#/loganalyzer?exec={}", exec_id),
        "tJobExecId": exec_id,
        "logstashPort": indexer.map(|addr| addr.port().to_string()),
        "servicesIp": indexer.map(|addr| addr.ip().to_string()),
        "ready": ready,
        "envVars": { "ET_SUT_HOST": "10.0.0.9" }
    }))
    .expect("valid external job")
}

/// Job as returned by the platform before it is ready
pub fn unready_job(exec_id: i64) -> ExternalJob {
    remote_job(exec_id, false, None)
}

/// Job as returned by the platform once it is ready, without a log indexer
pub fn ready_job(exec_id: i64) -> ExternalJob {
    remote_job(exec_id, true, None)
}

/// Ready job whose log indexer listens at `indexer`
pub fn ready_job_with_indexer(exec_id: i64, indexer: SocketAddr) -> ExternalJob {
    remote_job(exec_id, true, Some(indexer))
}

/// Repository answering from a script and recording every call
pub struct ScriptedRepository {
    created_reply: ExternalJob,
    statuses: Mutex<VecDeque<ExternalJob>>,
    pub created: Mutex<Vec<ExternalJob>>,
    pub reported: Mutex<Vec<ExternalJob>>,
    pub create_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub fail_create: AtomicBool,
    pub fail_fetch: AtomicBool,
    pub fail_report: AtomicBool,
}

impl ScriptedRepository {
    /// `created_reply` answers every create and, once the script is
    /// exhausted, every status fetch
    pub fn new(created_reply: ExternalJob) -> Self {
        Self {
            created_reply,
            statuses: Mutex::new(VecDeque::new()),
            created: Mutex::new(Vec::new()),
            reported: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            fail_create: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            fail_report: AtomicBool::new(false),
        }
    }

    pub fn with_statuses(self, statuses: Vec<ExternalJob>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }
}

#[async_trait]
impl ExternalJobRepository for ScriptedRepository {
    async fn create(&self, job: &ExternalJob) -> Result<ExternalJob> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.created.lock().unwrap().push(job.clone());
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ClientError::api_error(500, "create failed"));
        }
        Ok(self.created_reply.clone())
    }

    async fn fetch_status(&self, _job: &ExternalJob) -> Result<ExternalJob> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ClientError::api_error(503, "unavailable"));
        }
        let next = self.statuses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.created_reply.clone()))
    }

    async fn report_final(&self, job: &ExternalJob) -> Result<()> {
        self.reported.lock().unwrap().push(job.clone());
        if self.fail_report.load(Ordering::SeqCst) {
            return Err(ClientError::api_error(500, "report failed"));
        }
        Ok(())
    }
}
