//! ElasTest build agent
//!
//! Runs CI builds as ElasTest external jobs.
//!
//! Architecture:
//! - Configuration: installation settings from the environment
//! - Repository: HTTP communication with ElasTest's external job API
//! - Services: association lifecycle and the per-build registry
//! - Relay: mirrors build output to the ElasTest log indexer
//! - Step: wraps one build command in the full lifecycle

pub mod config;
pub mod eim;
pub mod relay;
pub mod repository;
pub mod service;
pub mod step;

#[cfg(test)]
mod testing;
