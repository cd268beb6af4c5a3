#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;

use std::process;

use anyhow::Context;
use axum::Router;
use fruitful_server::handler::routes;
use fruitful_server::middleware::{
    RouterObservabilityExt, RouterRecoveryExt, RouterSecurityExt, SecurityHeadersConfig,
};
use fruitful_server::service::{Environment, ServiceState};

use crate::config::{Cli, MiddlewareConfig};
use crate::server::ServerError;

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "fruitful_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "fruitful_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "fruitful_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        if let Some(server_error) = error.downcast_ref::<ServerError>() {
            tracing::error!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                error_code = server_error.error_code(),
                recoverable = server_error.is_recoverable(),
                suggestion = server_error.suggestion(),
                "server failed"
            );
        }

        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %format!("{error:#}"),
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    cli.init_tracing();
    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        environment = %cli.service.environment,
        "starting fruitful planet server"
    );

    cli.log();
    cli.validate()?;

    let state = ServiceState::from_config(&cli.service)
        .await
        .context("failed to create service state")?;
    let router = create_router(state, &cli.middleware, cli.service.environment);

    server::serve(router, cli.server).await?;

    Ok(())
}

/// Creates the router with all middleware layers applied.
///
/// Middleware is applied in reverse order (last added = outermost):
/// 1. Recovery (outermost) - catches panics and enforces timeouts
/// 2. Observability - request IDs, tracing spans, 5xx logging
/// 3. Security - CORS, security headers, compression, body limits
/// 4. Routes (innermost) - rate limiting, response caching, handlers
fn create_router(
    state: ServiceState,
    middleware: &MiddlewareConfig,
    environment: Environment,
) -> Router {
    routes(state)
        .with_security(&middleware.cors, &SecurityHeadersConfig::default(), environment)
        .with_observability()
        .with_recovery(&middleware.recovery)
}
