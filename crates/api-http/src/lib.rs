//! HTTP Request Gateway
//!
//! Maps generation routes onto `GenerationService` and renders the chunked
//! output stream.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod types;
pub mod validation;

pub use config::GatewayConfig;
pub use error::{ApiError, ApiResult};
pub use router::build_router;
pub use state::AppState;
pub use validation::JsonShapeValidator;
