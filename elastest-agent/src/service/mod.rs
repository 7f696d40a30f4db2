//! Service layer
//!
//! Services contain the business logic of the bridge. They orchestrate
//! operations using repositories: binding builds to external jobs, waiting
//! for readiness and tracking the per-build records.

mod association;
mod registry;

pub use association::{AssociationError, AssociationService, PollPolicy};
pub use registry::ExternalJobRegistry;
