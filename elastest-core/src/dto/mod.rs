//! Data Transfer Objects
//!
//! Payloads exchanged with ElasTest services other than the external job API.

pub mod log;
