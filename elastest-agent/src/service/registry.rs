//! External job registry
//!
//! Tracks which external job each running build is bound to. Builds run
//! concurrently and share one registry; entries live until the build's
//! teardown removes them.

use elastest_core::domain::ExternalJob;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Thread-safe map from build identity to its external job
#[derive(Debug, Default)]
pub struct ExternalJobRegistry {
    jobs: RwLock<HashMap<String, ExternalJob>>,
}

impl ExternalJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the job of a build, returning the job it replaced
    pub fn insert(&self, build_id: impl Into<String>, job: ExternalJob) -> Option<ExternalJob> {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(build_id.into(), job)
    }

    /// Returns a snapshot of the job bound to a build
    pub fn get(&self, build_id: &str) -> Option<ExternalJob> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(build_id)
            .cloned()
    }

    /// Applies `f` to the job of a build in place
    ///
    /// Returns the updated snapshot, or `None` if the build is not registered.
    pub fn update<F>(&self, build_id: &str, f: F) -> Option<ExternalJob>
    where
        F: FnOnce(&mut ExternalJob),
    {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let job = jobs.get_mut(build_id)?;
        f(job);
        Some(job.clone())
    }

    /// Removes the job of a build
    pub fn remove(&self, build_id: &str) -> Option<ExternalJob> {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(build_id)
    }

    pub fn contains(&self, build_id: &str) -> bool {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(build_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
