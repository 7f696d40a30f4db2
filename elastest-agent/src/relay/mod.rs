//! Log relay
//!
//! Mirrors a build's console output to the ElasTest log indexer. The build's
//! own output always goes straight to its real destination; the copy sent to
//! the indexer is best-effort and can never fail the build.
//!
//! - [`LogFilterDecorator`] wraps the build's output and splits it into lines
//! - [`LogRelayWriter`] formats lines and pushes them through a [`Submitter`]
//! - [`LogRelay`] is the running relay task connecting the two

mod filter;
mod submitter;
mod writer;

pub use filter::LogFilterDecorator;
pub use submitter::{
    HttpSubmitter, IndexerTransport, IndexerType, Submitter, SubmitterError, TcpSubmitter,
    submitter_for,
};
pub use writer::{LogRelay, LogRelayWriter, RelayStats};
