// Application Layer - Use Cases and Orchestration

pub mod auth;
pub mod broker;
pub mod generation;
pub mod reclamation;
pub mod registry;
pub mod supervisor;

// Re-exports
pub use auth::{AuthOverride, AuthStatus, CachedAuthCheck};
pub use broker::{PublishOutcome, StreamBroker, Subscription};
pub use generation::{ConsistencyCheckRequest, ConsistencyReport, GenerationPorts, GenerationService};
pub use reclamation::{ReclamationScheduler, SweepStats};
pub use registry::JobRegistry;
pub use supervisor::{ProcessSupervisor, StopIntent};
