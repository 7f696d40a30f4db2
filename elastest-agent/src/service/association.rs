//! Association service
//!
//! Binds builds to ElasTest external jobs:
//! - Creating the external job when a build starts
//! - Waiting until the platform reports it ready
//! - Keeping the per-build record until teardown
//! - Sending the final state when the build completes
//!
//! The connection (repository + service catalog) is an immutable value held
//! in an `ArcSwap`. Reconfiguring swaps in a new value; calls already in
//! flight finish with the connection they started with.

use arc_swap::ArcSwap;
use elastest_client::ClientError;
use elastest_core::domain::{ExternalJob, TestSupportService, TssCatalog};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};
use crate::repository::{ExternalJobRepository, HttpExternalJobRepository};
use crate::service::registry::ExternalJobRegistry;

/// Errors returned by the association service
#[derive(Debug, Error)]
pub enum AssociationError {
    /// Talking to ElasTest failed
    #[error("ElasTest communication failed: {0}")]
    Remote(#[from] ClientError),

    /// No external job is registered for the build
    #[error("Build {0} is not associated with an external job")]
    NotAssociated(String),

    /// The external job did not become ready in time
    #[error("External job not ready after {0:?}")]
    TimedOut(Duration),

    /// Waiting was cancelled
    #[error("Waiting for the external job was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, AssociationError>;

/// How the readiness poll paces and bounds itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between a not-ready answer and the next check
    pub interval: Duration,
    /// Overall deadline, measured from the start of the poll
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Everything derived from the installation settings
struct Connection {
    repository: Arc<dyn ExternalJobRepository>,
    catalog: TssCatalog,
}

/// Service binding builds to external jobs
pub struct AssociationService {
    connection: ArcSwap<Connection>,
    registry: ExternalJobRegistry,
}

impl AssociationService {
    /// Creates a service over an explicit repository and catalog
    pub fn new(repository: Arc<dyn ExternalJobRepository>, catalog: TssCatalog) -> Self {
        Self {
            connection: ArcSwap::from_pointee(Connection {
                repository,
                catalog,
            }),
            registry: ExternalJobRegistry::new(),
        }
    }

    /// Creates a service talking to the installation described by `config`
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let catalog = config.load_catalog()?;
        let repository = HttpExternalJobRepository::new(
            &config.elastest_url,
            &config.username,
            &config.password,
        );

        Ok(Self::new(Arc::new(repository), catalog))
    }

    /// Re-reads the installation settings
    ///
    /// Builds a new client and catalog and swaps them in. Registered jobs are
    /// kept; only calls started after the swap use the new settings.
    pub fn refresh_configuration(&self, config: &Config) -> std::result::Result<(), ConfigError> {
        config.validate()?;
        let catalog = config.load_catalog()?;
        let repository = HttpExternalJobRepository::new(
            &config.elastest_url,
            &config.username,
            &config.password,
        );

        if config.has_credentials() {
            info!("Access to ElasTest at {} now uses credentials", config.elastest_url);
        } else {
            info!(
                "Access to ElasTest at {} now without credentials",
                config.elastest_url
            );
        }

        self.replace_connection(Arc::new(repository), catalog);
        Ok(())
    }

    /// Swaps in a new repository and catalog
    pub fn replace_connection(
        &self,
        repository: Arc<dyn ExternalJobRepository>,
        catalog: TssCatalog,
    ) {
        self.connection.store(Arc::new(Connection {
            repository,
            catalog,
        }));
    }

    pub fn registry(&self) -> &ExternalJobRegistry {
        &self.registry
    }

    /// Resolves service codes against the current catalog
    pub fn resolve_services<S: AsRef<str>>(&self, codes: &[S]) -> Vec<TestSupportService> {
        self.connection.load().catalog.resolve(codes)
    }

    // =============================================================================
    // Association Lifecycle
    // =============================================================================

    /// Creates the external job of a build and registers it
    ///
    /// # Arguments
    /// * `build_id` - Stable identity of the build
    /// * `job_name` - Name of the CI job, sent as the external job name
    /// * `service_codes` - Requested test support services; unknown codes are ignored
    ///
    /// # Returns
    /// The platform's record, as stored in the registry
    pub async fn associate<S: AsRef<str>>(
        &self,
        build_id: &str,
        job_name: &str,
        service_codes: &[S],
    ) -> Result<ExternalJob> {
        self.associate_job(build_id, ExternalJob::new(job_name), service_codes)
            .await
    }

    /// Like [`Self::associate`], starting from a prepared job
    ///
    /// Used to carry extra fields such as the build URL.
    pub async fn associate_job<S: AsRef<str>>(
        &self,
        build_id: &str,
        job: ExternalJob,
        service_codes: &[S],
    ) -> Result<ExternalJob> {
        let connection = self.connection.load_full();

        info!("Associating build {} with a TJob for '{}'", build_id, job.job_name());

        let services = connection.catalog.resolve(service_codes);
        if services.len() < service_codes.len() {
            debug!(
                "Requested {} service(s), {} known to the catalog",
                service_codes.len(),
                services.len()
            );
        }
        let job = job.with_test_support_services(services);

        let created = connection.repository.create(&job).await.map_err(|e| {
            warn!("Error creating the external job for build {}: {}", build_id, e);
            e
        })?;
        let created = job.advance(created);

        info!(
            "Build {} bound to TJob execution {}",
            build_id,
            created.t_job_exec_id()
        );
        self.registry.insert(build_id, created.clone());

        Ok(created)
    }

    /// Polls the platform until the job is ready
    ///
    /// Issues one status fetch per not-ready answer, sleeping
    /// `policy.interval` in between. Gives up after `policy.timeout` or
    /// as soon as `cancel` fires. Fetch errors are returned immediately.
    pub async fn poll_until_ready(
        &self,
        job: ExternalJob,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<ExternalJob> {
        let deadline = Instant::now() + policy.timeout;
        let mut current = job;
        let mut attempts = 0u32;

        while !current.is_ready() {
            let connection = self.connection.load_full();

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AssociationError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(AssociationError::TimedOut(policy.timeout));
                }
                fetched = connection.repository.fetch_status(&current) => fetched?,
            };

            attempts += 1;
            current = current.advance(fetched);

            if current.is_ready() {
                break;
            }

            debug!(
                "TJob execution {} not ready yet (attempt {})",
                current.t_job_exec_id(),
                attempts
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AssociationError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(AssociationError::TimedOut(policy.timeout));
                }
                _ = tokio::time::sleep(policy.interval) => {}
            }
        }

        info!(
            "TJob execution {} ready after {} check(s)",
            current.t_job_exec_id(),
            attempts
        );
        Ok(current)
    }

    /// Waits until the registered job of a build is ready and stores it
    pub async fn wait_until_ready(
        &self,
        build_id: &str,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<ExternalJob> {
        let job = self
            .lookup(build_id)
            .ok_or_else(|| AssociationError::NotAssociated(build_id.to_string()))?;

        let ready = self.poll_until_ready(job, policy, cancel).await?;
        self.registry.insert(build_id, ready.clone());

        Ok(ready)
    }

    /// Returns the job bound to a build
    pub fn lookup(&self, build_id: &str) -> Option<ExternalJob> {
        self.registry.get(build_id)
    }

    /// Forgets the job of a build
    ///
    /// Must be called once per build when it is torn down.
    pub fn remove(&self, build_id: &str) -> Option<ExternalJob> {
        let removed = self.registry.remove(build_id);
        if removed.is_none() {
            debug!("No external job registered for build {}", build_id);
        }
        removed
    }

    /// Records the build outcome and sends the job's final state
    ///
    /// The entry stays registered; failures are returned to the caller.
    pub async fn report_final(&self, build_id: &str, success: bool) -> Result<ExternalJob> {
        let job = self
            .registry
            .update(build_id, |job| job.set_result(success))
            .ok_or_else(|| AssociationError::NotAssociated(build_id.to_string()))?;

        info!(
            "Sending final state of TJob execution {} ({})",
            job.t_job_exec_id(),
            if success { "success" } else { "failure" }
        );

        let connection = self.connection.load_full();
        connection.repository.report_final(&job).await?;

        Ok(job)
    }
}
