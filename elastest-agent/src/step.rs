//! Build step
//!
//! Runs one build command wrapped in the ElasTest lifecycle:
//! association, readiness wait, environment injection, log relay,
//! fault injection and the final report.

use anyhow::{Context, Result, bail};
use elastest_core::domain::ExternalJob;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::eim::EimPlan;
use crate::relay::{LogRelay, LogRelayWriter, submitter_for};
use crate::service::AssociationService;

/// What to run and how to present it to ElasTest
#[derive(Debug, Clone)]
pub struct StepOptions {
    /// Stable identity of this build
    pub build_id: String,
    /// CI job name sent as the external job name
    pub job_name: String,
    /// Requested test support service codes
    pub tss: Vec<String>,
    /// Program and arguments of the build
    pub command: Vec<String>,
    /// Link back to the build, if any
    pub build_url: Option<String>,
}

pub struct BuildStep {
    service: Arc<AssociationService>,
    config: Config,
}

impl BuildStep {
    pub fn new(service: Arc<AssociationService>, config: Config) -> Self {
        Self { service, config }
    }

    /// Runs the build and returns its exit code
    ///
    /// Errors are returned only when the build could not be started:
    /// association failed, the job never became ready or the command
    /// could not be spawned. Log relay, EIM and final report failures are
    /// logged and do not change the outcome.
    pub async fn run(&self, options: StepOptions, cancel: &CancellationToken) -> Result<i32> {
        let Some((program, args)) = options.command.split_first() else {
            bail!("no build command given");
        };

        let mut job = ExternalJob::new(options.job_name.as_str());
        if let Some(url) = &options.build_url {
            job = job.with_build_url(url.as_str());
        }

        let job = self
            .service
            .associate_job(&options.build_id, job, options.tss.as_slice())
            .await
            .context("Failed to associate the build with ElasTest")?;

        if let Some(url) = job.execution_url() {
            info!("ElasTest execution: {}", url);
        }

        let job = match self
            .service
            .wait_until_ready(&options.build_id, &self.config.poll_policy(), cancel)
            .await
        {
            Ok(job) => job,
            Err(e) => {
                self.service.remove(&options.build_id);
                return Err(e).context("ElasTest did not get ready for the build");
            }
        };

        let relay = self.start_relay(&job);

        let mut child = match Command::new(program)
            .args(args)
            .envs(job.env_vars())
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                if let Some(relay) = relay {
                    relay.shutdown(self.config.relay_drain_timeout).await;
                }
                self.finalize(&options.build_id, false).await;
                return Err(e).context(format!("Failed to start '{}'", program));
            }
        };

        let mut pumps = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(forward(stdout, io::stdout(), relay.as_ref()));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(forward(stderr, io::stderr(), relay.as_ref()));
        }

        let build_vars: HashMap<String, String> = std::env::vars().collect();
        if let Some(plan) = EimPlan::from_env(job.env_vars(), &build_vars) {
            plan.execute().await;
        }

        // Output pipes and the child itself are waited on blocking threads
        let status = task::spawn_blocking(move || child.wait()).await;

        for pump in pumps {
            match pump.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Error forwarding build output: {}", e),
                Err(e) => warn!("Output forwarding task failed: {}", e),
            }
        }

        if let Some(relay) = relay {
            let stats = relay.shutdown(self.config.relay_drain_timeout).await;
            info!(
                "Relayed {} line(s) to the log indexer, {} dropped",
                stats.sent, stats.dropped
            );
        }

        let code = match status {
            Ok(Ok(status)) => status.code().unwrap_or(1),
            Ok(Err(e)) => {
                error!("Failed to wait for the build command: {}", e);
                1
            }
            Err(e) => {
                error!("Build wait task failed: {}", e);
                1
            }
        };

        self.finalize(&options.build_id, code == 0).await;

        Ok(code)
    }

    fn start_relay(&self, job: &ExternalJob) -> Option<LogRelay> {
        match submitter_for(
            job,
            self.config.indexer_transport,
            &self.config.username,
            &self.config.password,
            self.config.indexer_timeout,
        ) {
            Ok(submitter) => {
                info!("Relaying build output to {}", submitter.description());
                Some(LogRelayWriter::new(submitter, job).spawn())
            }
            Err(e) => {
                warn!("Build output will not be relayed: {}", e);
                None
            }
        }
    }

    async fn finalize(&self, build_id: &str, success: bool) {
        if let Err(e) = self.service.report_final(build_id, success).await {
            error!("Failed to send the final state of build {}: {}", build_id, e);
        }
        self.service.remove(build_id);
    }
}

/// Copies a child stream to the console, mirroring it to the relay if any
///
/// Pipe reads and console writes block, so the copy runs on the blocking pool.
fn forward<R, W>(reader: R, out: W, relay: Option<&LogRelay>) -> JoinHandle<io::Result<()>>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    match relay {
        Some(relay) => {
            let decorated = relay.decorate(out);
            task::spawn_blocking(move || pump(reader, decorated)?.finish())
        }
        None => task::spawn_blocking(move || pump(reader, out).map(|_| ())),
    }
}

fn pump<R: Read, W: Write>(mut reader: R, mut out: W) -> io::Result<W> {
    let mut buf = vec![0u8; 8192];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        out.write_all(&buf[..n])?;
        out.flush()?;
    }
    Ok(out)
}
