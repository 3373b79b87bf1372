// Inkwell Infrastructure - System Adapters
// Implements: ProcessSpawner, AuthProbe

pub mod cli_auth_probe;
pub mod cli_spawner;
pub mod command_config;
mod utf8_chunker;

pub use cli_auth_probe::CliAuthProbe;
pub use cli_spawner::{CliProcess, CliProcessSpawner};
pub use command_config::{CliCommandConfig, DEFAULT_ENV_ALLOWLIST};
