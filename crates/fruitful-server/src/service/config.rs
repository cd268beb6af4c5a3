#[cfg(feature = "config")]
use clap::Args;
use fruitful_postgres::{PgClient, PgConfig};
use serde::{Deserialize, Serialize};

use crate::service::cache::CacheConfig;
use crate::service::features::FeatureConfig;
use crate::service::security::{AdminToken, DEFAULT_REQUESTS_PER_MINUTE, RateLimitConfig};
use crate::service::{Environment, TRACING_TARGET_SERVICE};
use crate::{Error, Result};

/// App [`state`] configuration.
///
/// [`state`]: crate::service::ServiceState
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct ServiceConfig {
    /// Deployment environment, read from `NODE_ENV` as deployed portals set it.
    #[cfg_attr(
        feature = "config",
        arg(
            long,
            env = "NODE_ENV",
            value_enum,
            ignore_case = true,
            default_value_t = Environment::Development
        )
    )]
    #[serde(default)]
    pub environment: Environment,

    /// Postgres connection settings.
    #[cfg_attr(feature = "config", command(flatten))]
    pub postgres: PgConfig,

    /// Cache settings.
    #[cfg_attr(feature = "config", command(flatten))]
    pub cache: CacheConfig,

    /// Inputs for the default feature flags.
    #[cfg_attr(feature = "config", command(flatten))]
    pub features: FeatureConfig,

    /// Requests allowed per client IP and minute on `/api` routes.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "RATE_LIMIT_PER_MINUTE", default_value_t = DEFAULT_REQUESTS_PER_MINUTE)
    )]
    pub rate_limit_per_minute: u32,

    /// Bearer token for the administrative routes; they are not mounted without it.
    #[cfg_attr(feature = "config", arg(long, env = "ADMIN_TOKEN", hide_env_values = true))]
    #[serde(default, skip_serializing)]
    pub admin_token: Option<String>,
}

impl ServiceConfig {
    /// Validates every nested configuration.
    pub fn validate(&self) -> Result<()> {
        self.postgres.validate()?;
        self.cache.validate()?;

        if self.rate_limit_per_minute == 0 {
            return Err(Error::config("rate limit must allow at least 1 request per minute"));
        }

        if self.admin_token.is_some() && self.admin_token().is_none() {
            return Err(Error::config("admin token must not be blank"));
        }

        Ok(())
    }

    /// Returns the configured rate limit.
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig::per_minute(self.rate_limit_per_minute)
    }

    /// Returns the admin token, if a non-blank one is configured.
    pub fn admin_token(&self) -> Option<AdminToken> {
        self.admin_token.as_deref().and_then(AdminToken::new)
    }

    /// Creates the Postgres client and checks connectivity once.
    ///
    /// The pool connects lazily, so an unreachable database only logs a
    /// warning here and is reported by the readiness probe afterwards.
    pub async fn connect_postgres(&self) -> Result<PgClient> {
        let pg_client = PgClient::new(self.postgres.clone()).map_err(|e| {
            Error::internal("postgres", "Failed to create database client").with_source(e)
        })?;

        match pg_client.ping().await {
            Ok(()) => tracing::info!(
                target: TRACING_TARGET_SERVICE,
                database = %self.postgres.database_url_masked(),
                "database connection established"
            ),
            Err(error) => tracing::warn!(
                target: TRACING_TARGET_SERVICE,
                database = %self.postgres.database_url_masked(),
                error = %error,
                "database not reachable at startup"
            ),
        }

        Ok(pg_client)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            postgres: PgConfig::default(),
            cache: CacheConfig::default(),
            features: FeatureConfig::default(),
            rate_limit_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            admin_token: None,
        }
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("environment", &self.environment)
            .field("postgres", &self.postgres)
            .field("cache", &self.cache)
            .field("features", &self.features)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("admin_token", &self.admin_token())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.admin_token().is_none());
        assert_eq!(config.rate_limit().capacity, 100);
    }

    #[test]
    fn rejects_blank_admin_token() {
        let config = ServiceConfig {
            admin_token: Some("  ".into()),
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_rate_limit() {
        let config = ServiceConfig {
            rate_limit_per_minute: 0,
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_hides_secrets() {
        let config = ServiceConfig {
            admin_token: Some("top-secret".into()),
            features: FeatureConfig::default().with_openai_api_key("sk-hidden"),
            ..ServiceConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("top-secret"));
        assert!(!debug.contains("sk-hidden"));
    }
}
