//! Repository layer
//!
//! Repositories are stateless HTTP adapters that abstract communication
//! with ElasTest. They provide a narrow, trait-based interface so the
//! service layer can be tested without a live platform.

mod external_jobs;

pub use external_jobs::{ExternalJobRepository, HttpExternalJobRepository};
