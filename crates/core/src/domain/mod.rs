// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;

// Re-exports
pub use error::DomainError;
pub use job::{ExitReason, GenerationJob, GenerationRequest, JobId, JobState};
