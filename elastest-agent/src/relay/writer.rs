//! Relay writer and relay task
//!
//! Lines travel from the decorators to the relay task through a bounded
//! queue. A full queue drops the line instead of blocking the build, and
//! shutdown stops waiting for the queue after a deadline.

use elastest_core::domain::ExternalJob;
use elastest_core::dto::log::LogPayload;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::filter::LogFilterDecorator;
use super::submitter::{Submitter, SubmitterError};

/// Lines a relay holds before the decorators start dropping
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Formats console lines for one execution and pushes them to the indexer
pub struct LogRelayWriter {
    submitter: Arc<dyn Submitter>,
    t_job_exec_id: i64,
}

/// Counters returned once a relay has drained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub sent: u64,
    pub dropped: u64,
}

/// Counters shared by a relay task and its decorators
#[derive(Debug, Default)]
pub(crate) struct RelayCounters {
    queued: AtomicU64,
    overflowed: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
}

impl RelayCounters {
    pub(crate) fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_overflow(&self) {
        self.overflowed.fetch_add(1, Ordering::Relaxed);
    }

    /// Lines that were queued but never pushed count as dropped
    pub(crate) fn stats(&self) -> RelayStats {
        let queued = self.queued.load(Ordering::Relaxed);
        let sent = self.sent.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let abandoned = queued.saturating_sub(sent + failed);

        RelayStats {
            sent,
            dropped: self.overflowed.load(Ordering::Relaxed) + failed + abandoned,
        }
    }
}

impl LogRelayWriter {
    pub fn new(submitter: Arc<dyn Submitter>, job: &ExternalJob) -> Self {
        Self {
            submitter,
            t_job_exec_id: job.t_job_exec_id(),
        }
    }

    /// Builds the indexer payload for a batch of lines
    ///
    /// Only the first line of the batch is used. Returns `None` for an
    /// empty batch.
    pub fn format_payload(lines: &[String], job: &ExternalJob) -> Option<String> {
        let line = lines.first()?;
        LogPayload::for_line(job.t_job_exec_id(), line).to_json().ok()
    }

    /// Pushes the first line of `lines`; an empty batch is a no-op
    pub async fn write(&self, lines: &[String]) -> Result<(), SubmitterError> {
        let Some(line) = lines.first() else {
            return Ok(());
        };

        let payload = LogPayload::for_line(self.t_job_exec_id, line).to_json()?;
        self.submitter.push(&payload).await
    }

    /// Starts the relay task with the default queue capacity
    pub fn spawn(self) -> LogRelay {
        self.spawn_with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Starts the relay task draining lines into the submitter
    pub fn spawn_with_capacity(self, capacity: usize) -> LogRelay {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(RelayCounters::default());
        let task = tokio::spawn(self.run(receiver, Arc::clone(&counters)));
        LogRelay {
            sender,
            counters,
            task,
        }
    }

    async fn run(self, mut receiver: Receiver<String>, counters: Arc<RelayCounters>) {
        let target = self.submitter.description();

        while let Some(line) = receiver.recv().await {
            match self.write(std::slice::from_ref(&line)).await {
                Ok(()) => {
                    counters.sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    warn!(
                        "Dropping log line for {} ({}): {}",
                        target,
                        self.submitter.indexer_type(),
                        e
                    );
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        debug!("Log relay to {} drained", target);
    }
}

/// Handle to a running relay task
pub struct LogRelay {
    sender: Sender<String>,
    counters: Arc<RelayCounters>,
    task: JoinHandle<()>,
}

impl LogRelay {
    /// Wraps `inner` so that every completed line is mirrored to this relay
    pub fn decorate<W: Write>(&self, inner: W) -> LogFilterDecorator<W> {
        LogFilterDecorator::new(inner, self.sender.clone(), Arc::clone(&self.counters))
    }

    /// Waits up to `deadline` for queued lines to be pushed
    ///
    /// Decorators created by [`Self::decorate`] must be finished or dropped
    /// first, otherwise the queue stays open until the deadline. Lines still
    /// queued at the deadline are abandoned and counted as dropped.
    pub async fn shutdown(self, deadline: Duration) -> RelayStats {
        let LogRelay {
            sender,
            counters,
            mut task,
        } = self;
        drop(sender);

        match tokio::time::timeout(deadline, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Log relay task failed: {}", e),
            Err(_) => {
                warn!(
                    "Log relay did not drain within {:?}, abandoning queued lines",
                    deadline
                );
                task.abort();
                let _ = task.await;
            }
        }

        counters.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::IndexerType;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSubmitter {
        payloads: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Submitter for RecordingSubmitter {
        async fn push(&self, payload: &str) -> Result<(), SubmitterError> {
            if self.fail {
                return Err(SubmitterError::Rejected(500));
            }
            self.payloads.lock().unwrap().push(payload.to_string());
            Ok(())
        }

        fn description(&self) -> String {
            "recording:0".to_string()
        }
    }

    const DRAIN: Duration = Duration::from_secs(5);

    /// Submitter whose pushes never complete
    struct StalledSubmitter;

    #[async_trait]
    impl Submitter for StalledSubmitter {
        async fn push(&self, _payload: &str) -> Result<(), SubmitterError> {
            std::future::pending().await
        }

        fn description(&self) -> String {
            "stalled:0".to_string()
        }
    }

    fn job(exec_id: i64) -> ExternalJob {
        serde_json::from_value(json!({ "jobName": "j", "tJobExecId": exec_id })).unwrap()
    }

    #[test]
    fn test_format_payload_uses_first_line() {
        let lines = vec!["hello\r\n".to_string(), "ignored".to_string()];
        assert_eq!(
            LogRelayWriter::format_payload(&lines, &job(42)).unwrap(),
            r#"{"component":"test","exec":"42","stream":"default_log","message":"hello"}"#
        );
    }

    #[test]
    fn test_format_payload_escapes_message() {
        let lines = vec![r#"say "hi" \ bye"#.to_string()];
        let payload = LogRelayWriter::format_payload(&lines, &job(1)).unwrap();
        let parsed: LogPayload = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed.message, r#"say "hi" \ bye"#);
    }

    #[test]
    fn test_format_payload_empty_batch() {
        assert!(LogRelayWriter::format_payload(&[], &job(1)).is_none());
    }

    #[tokio::test]
    async fn test_write_pushes_payload() {
        let submitter = Arc::new(RecordingSubmitter::default());
        let writer = LogRelayWriter::new(submitter.clone(), &job(7));

        writer.write(&["line".to_string()]).await.unwrap();
        writer.write(&[]).await.unwrap();

        let payloads = submitter.payloads.lock().unwrap();
        assert_eq!(payloads.len(), 1);
        assert!(payloads[0].contains(r#""exec":"7""#));
        assert_eq!(submitter.indexer_type(), IndexerType::Logstash);
    }

    #[tokio::test]
    async fn test_relay_drains_decorated_output() {
        let submitter = Arc::new(RecordingSubmitter::default());
        let relay = LogRelayWriter::new(submitter.clone(), &job(3)).spawn();

        let mut out = relay.decorate(Vec::new());
        out.write_all(b"first\nsecond\npartial").unwrap();
        out.finish().unwrap();
        assert_eq!(out.get_ref().as_slice(), b"first\nsecond\npartial");
        drop(out);

        let stats = relay.shutdown(DRAIN).await;
        assert_eq!(stats, RelayStats { sent: 3, dropped: 0 });

        let messages: Vec<String> = submitter
            .payloads
            .lock()
            .unwrap()
            .iter()
            .map(|p| serde_json::from_str::<LogPayload>(p).unwrap().message)
            .collect();
        assert_eq!(messages, vec!["first", "second", "partial"]);
    }

    #[tokio::test]
    async fn test_relay_failures_are_dropped() {
        let submitter = Arc::new(RecordingSubmitter {
            fail: true,
            ..Default::default()
        });
        let relay = LogRelayWriter::new(submitter, &job(3)).spawn();

        let mut out = relay.decorate(Vec::new());
        out.write_all(b"a\nb\n").unwrap();
        drop(out);

        let stats = relay.shutdown(DRAIN).await;
        assert_eq!(stats, RelayStats { sent: 0, dropped: 2 });
    }

    #[tokio::test]
    async fn test_shutdown_gives_up_after_deadline() {
        let relay = LogRelayWriter::new(Arc::new(StalledSubmitter), &job(3)).spawn();

        let mut out = relay.decorate(Vec::new());
        out.write_all(b"a\nb\nc\n").unwrap();
        drop(out);

        let started = std::time::Instant::now();
        let stats = relay.shutdown(Duration::from_millis(100)).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(stats, RelayStats { sent: 0, dropped: 3 });
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let relay =
            LogRelayWriter::new(Arc::new(StalledSubmitter), &job(3)).spawn_with_capacity(2);

        let mut out = relay.decorate(Vec::new());
        for i in 0..10 {
            writeln!(out, "line {}", i).unwrap();
        }
        out.finish().unwrap();
        assert_eq!(out.get_ref().len(), 70);
        drop(out);

        let stats = relay.shutdown(Duration::from_millis(100)).await;
        assert_eq!(stats, RelayStats { sent: 0, dropped: 10 });
    }
}
