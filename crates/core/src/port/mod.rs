// Port Layer - Interfaces for external dependencies

pub mod auth_probe;
pub mod id_provider; // For deterministic testing
pub mod process_spawner;
pub mod request_validator;
pub mod time_provider;

// Re-exports
pub use auth_probe::AuthProbe;
pub use id_provider::IdProvider;
pub use process_spawner::{ExecutionError, GenerationProcess, ProcessExit, ProcessSpawner};
pub use request_validator::{RequestValidator, ValidationOutcome};
pub use time_provider::TimeProvider;
