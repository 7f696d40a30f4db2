//! ElasTest Core
//!
//! Core types shared by the ElasTest build bridge.
//!
//! This crate contains:
//! - Domain types: the external job a build is bound to and the
//!   test-support-service catalog
//! - DTOs: payloads sent to the platform's log indexer

pub mod domain;
pub mod dto;
