use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    FeatureConfig, FeatureFlag, FeatureFlagUpdate, MAX_ROLLOUT, TRACING_TARGET_FEATURES,
    rollout_bucket,
};

/// Process-wide registry of feature flags.
///
/// Every call is atomic on its own. Sequences of calls are not, and
/// concurrent updates to the same flag are last-writer-wins. Nothing is
/// persisted: a restart or [`reset`](Self::reset) returns to the defaults.
#[derive(Debug, Clone)]
pub struct FeatureStore {
    inner: Arc<FeatureStoreInner>,
}

#[derive(Debug)]
struct FeatureStoreInner {
    flags: RwLock<HashMap<String, FeatureFlag>>,
    defaults: Vec<FeatureFlag>,
}

impl FeatureStore {
    /// Creates a store seeded with `defaults`.
    pub fn new(defaults: Vec<FeatureFlag>) -> Self {
        let defaults: Vec<_> = defaults.into_iter().map(FeatureFlag::clamped).collect();
        let flags = Self::index(&defaults);

        Self {
            inner: Arc::new(FeatureStoreInner {
                flags: RwLock::new(flags),
                defaults,
            }),
        }
    }

    /// Creates a store seeded with the defaults derived from `config`.
    pub fn from_config(config: &FeatureConfig) -> Self {
        let store = Self::new(config.default_features());

        tracing::info!(
            target: TRACING_TARGET_FEATURES,
            enabled = ?store.enabled_names(None),
            "feature flags initialized"
        );

        store
    }

    fn index(flags: &[FeatureFlag]) -> HashMap<String, FeatureFlag> {
        flags
            .iter()
            .map(|flag| (flag.name.clone(), flag.clone()))
            .collect()
    }

    // A panic while holding the lock cannot leave a flag half-written, so a
    // poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, FeatureFlag>> {
        self.inner.flags.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, FeatureFlag>> {
        self.inner.flags.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decides whether `name` is on for `user_id`.
    ///
    /// Unknown flags are off. A partial rollout needs a user identifier and
    /// is off for anonymous callers.
    pub fn is_enabled(&self, name: &str, user_id: Option<&str>) -> bool {
        let flags = self.read();
        let Some(flag) = flags.get(name) else {
            tracing::warn!(target: TRACING_TARGET_FEATURES, flag = name, "unknown feature flag");
            return false;
        };

        if !flag.enabled {
            return false;
        }

        match flag.rollout_percentage {
            None => true,
            Some(percentage) if percentage >= MAX_ROLLOUT => true,
            Some(percentage) => user_id.is_some_and(|id| rollout_bucket(id) < percentage),
        }
    }

    /// Returns the names of every flag on for `user_id`, sorted.
    pub fn enabled_names(&self, user_id: Option<&str>) -> Vec<String> {
        let mut names: Vec<_> = self.read().keys().cloned().collect();
        names.sort_unstable();
        names.retain(|name| self.is_enabled(name, user_id));
        names
    }

    /// Returns every flag, sorted by name.
    pub fn get_all(&self) -> Vec<FeatureFlag> {
        let mut flags: Vec<_> = self.read().values().cloned().collect();
        flags.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        flags
    }

    /// Returns the flag named `name`.
    pub fn get(&self, name: &str) -> Option<FeatureFlag> {
        self.read().get(name).cloned()
    }

    /// Merges `update` into an existing flag.
    ///
    /// Returns `false` and changes nothing if the flag is unknown.
    pub fn update(&self, name: &str, update: FeatureFlagUpdate) -> bool {
        let mut flags = self.write();
        let Some(flag) = flags.get_mut(name) else {
            tracing::error!(
                target: TRACING_TARGET_FEATURES,
                flag = name,
                "cannot update unknown feature flag"
            );
            return false;
        };

        update.apply(flag);
        tracing::info!(
            target: TRACING_TARGET_FEATURES,
            flag = name,
            enabled = flag.enabled,
            rollout = ?flag.rollout_percentage,
            "feature flag updated"
        );
        true
    }

    /// Inserts `flag`, replacing any flag with the same name.
    pub fn add(&self, flag: FeatureFlag) {
        let flag = flag.clamped();
        tracing::info!(target: TRACING_TARGET_FEATURES, flag = %flag.name, "feature flag added");
        self.write().insert(flag.name.clone(), flag);
    }

    /// Removes the flag named `name`. Returns `true` if it existed.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.write().remove(name).is_some();
        if removed {
            tracing::info!(target: TRACING_TARGET_FEATURES, flag = name, "feature flag removed");
        }
        removed
    }

    /// Restores the defaults captured at construction.
    pub fn reset(&self) {
        *self.write() = Self::index(&self.inner.defaults);
        tracing::info!(target: TRACING_TARGET_FEATURES, "feature flags reset to defaults");
    }
}

impl Default for FeatureStore {
    fn default() -> Self {
        Self::new(FeatureConfig::default().default_features())
    }
}
