//! Feature flags with percentage rollout.
//!
//! Flags live in memory only. The default set is derived from
//! [`FeatureConfig`] at startup and can be restored with
//! [`FeatureStore::reset`].

mod config;
mod flag;
mod rollout;
mod store;

pub use self::config::FeatureConfig;
pub use self::flag::{FeatureFlag, FeatureFlagUpdate, MAX_ROLLOUT};
pub use self::rollout::{rollout_bucket, rollout_hash};
pub use self::store::FeatureStore;

/// Tracing target for feature flag operations.
pub(crate) const TRACING_TARGET_FEATURES: &str = "fruitful_server::service::features";
