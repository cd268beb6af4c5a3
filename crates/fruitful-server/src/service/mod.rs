//! Application services, configuration and state.

pub mod cache;
mod config;
mod environment;
pub mod features;
pub mod health;
pub mod security;
mod state;

pub use crate::service::config::ServiceConfig;
pub use crate::service::environment::Environment;
pub use crate::service::state::ServiceState;
// Re-export error types from crate root for convenience
pub use crate::{Error, Result};

/// Tracing target for service construction.
pub(crate) const TRACING_TARGET_SERVICE: &str = "fruitful_server::service";
