//! Book processing: the per-job pipeline and the service callers use.

mod context;
mod processor;
mod service;

pub use context::RollingContext;
pub use processor::BookProcessor;
pub use service::{Artifact, JobService, ServiceError};
