//! Core domain types
//!
//! This module contains the domain structures shared between the HTTP client
//! (which sends and receives them) and the agent (which tracks them per build).

pub mod external_job;
pub mod tss;

pub use external_job::ExternalJob;
pub use tss::{CatalogError, TestSupportService, TssCatalog};
