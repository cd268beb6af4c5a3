//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── server: ServerConfig          # Host, port, shutdown
//! ├── middleware: MiddlewareConfig  # CORS, request timeout
//! ├── telemetry: TelemetryConfig    # Log level
//! └── service: ServiceConfig        # Environment, Postgres, cache, flags, admin
//! ```
//!
//! All configuration can be provided via CLI arguments or environment
//! variables, and from a `.env` file with the `dotenv` feature.
//!
//! ```bash
//! fruitful --database-url "postgresql://..." --port 8080
//! DATABASE_URL="postgresql://..." PORT=8080 fruitful
//! ```

mod middleware;
mod server;
mod telemetry;

use std::process;

use anyhow::Context;
use clap::Parser;
use fruitful_server::service::ServiceConfig;
pub use middleware::MiddlewareConfig;
use serde::{Deserialize, Serialize};
pub use server::ServerConfig;
pub use telemetry::TelemetryConfig;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_SERVER_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "fruitful")]
#[command(about = "Fruitful Planet portal API server")]
#[command(version)]
pub struct Cli {
    /// Server network and lifecycle configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// HTTP middleware configuration (CORS, timeouts).
    #[clap(flatten)]
    pub middleware: MiddlewareConfig,

    /// Logging configuration.
    #[clap(flatten)]
    pub telemetry: TelemetryConfig,

    /// Service configuration (database, cache, feature flags).
    #[clap(flatten)]
    pub service: ServiceConfig,
}

impl Cli {
    /// Loads the `.env` file (if enabled) and parses CLI arguments.
    ///
    /// The file is loaded first so clap picks its values up as environment.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Installs the tracing subscriber for the configured environment.
    pub fn init_tracing(&self) {
        self.telemetry.init_tracing(self.service.environment);
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .validate()
            .context("invalid server configuration")?;
        self.service
            .validate()
            .context("invalid service configuration")?;
        Ok(())
    }

    /// Logs configuration without secrets.
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_SERVER_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "build information"
        );

        self.server.log();
        self.middleware.log();

        let cache = &self.service.cache;
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            environment = %self.service.environment,
            database = %self.service.postgres.database_url_masked(),
            cache_backend = %cache.backend(),
            redis_url = ?cache.redis_url_masked(),
            cache_ttl_secs = cache.ttl_secs,
            rate_limit_per_minute = self.service.rate_limit_per_minute,
            admin_routes = self.service.admin_token.is_some(),
            "service configuration"
        );
    }

    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}
