//! Application state and dependency injection.

use fruitful_postgres::PgClient;

use crate::Result;
use crate::service::cache::CacheService;
use crate::service::features::FeatureStore;
use crate::service::health::HealthService;
use crate::service::security::{AdminToken, RateLimiter};
use crate::service::{Environment, ServiceConfig};

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Debug, Clone)]
pub struct ServiceState {
    environment: Environment,
    pg_client: PgClient,

    cache: CacheService,
    features: FeatureStore,
    health: HealthService,
    rate_limiter: RateLimiter,
    admin_token: Option<AdminToken>,
}

impl ServiceState {
    /// Initializes application state from configuration.
    ///
    /// Must be called from within a Tokio runtime: the cache sweeper and the
    /// rate limiter cleanup run as background tasks.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self> {
        let pg_client = config.connect_postgres().await?;
        let cache = CacheService::from_config(&config.cache);

        let health = HealthService::new(pg_client.clone())
            .with_environment(config.environment)
            .with_cache_backend(cache.backend());

        let service_state = Self {
            environment: config.environment,
            pg_client,

            features: FeatureStore::from_config(&config.features),
            health,
            rate_limiter: RateLimiter::new(config.rate_limit()),
            admin_token: config.admin_token(),
            cache,
        };

        Ok(service_state)
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Returns the admin token, if administrative routes are enabled.
    pub fn admin_token(&self) -> Option<&AdminToken> {
        self.admin_token.as_ref()
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

impl_di!(pg_client: PgClient);

impl_di!(cache: CacheService);
impl_di!(features: FeatureStore);
impl_di!(health: HealthService);
impl_di!(rate_limiter: RateLimiter);
impl_di!(admin_token: Option<AdminToken>);

#[cfg(test)]
impl ServiceState {
    /// Builds state around fake probes for router tests.
    pub(crate) fn for_tests(health: HealthService, admin_token: Option<&str>) -> Self {
        use crate::service::cache::CacheConfig;
        use crate::service::features::FeatureConfig;
        use crate::service::security::RateLimitConfig;

        let pg_client = PgClient::new(fruitful_postgres::PgConfig::default())
            .unwrap_or_else(|e| panic!("lazy pool construction failed: {e}"));

        Self {
            environment: Environment::Test,
            pg_client,
            cache: CacheService::from_config(&CacheConfig::default()),
            features: FeatureStore::from_config(&FeatureConfig::default()),
            health,
            rate_limiter: RateLimiter::new(RateLimitConfig::per_minute(1_000)),
            admin_token: admin_token.and_then(AdminToken::new),
        }
    }

    pub(crate) fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }
}
