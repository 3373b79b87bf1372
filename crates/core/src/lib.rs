// Inkwell Core - Generation Job Domain, Ports & Orchestration
// NO HTTP or process-spawning dependencies (hexagonal architecture)

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use config::OrchestratorConfig;
pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
