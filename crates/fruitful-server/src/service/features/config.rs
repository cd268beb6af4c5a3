#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use super::FeatureFlag;

/// Environment inputs that seed the default feature set.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct FeatureConfig {
    /// Turns on the `metrics` feature.
    #[cfg_attr(
        feature = "config",
        arg(long = "enable-metrics", env = "ENABLE_METRICS", action = clap::ArgAction::Set, default_value_t = false)
    )]
    #[serde(default)]
    pub enable_metrics: bool,

    /// OpenAI API key. Its presence turns on `aiRecommendations`.
    #[cfg_attr(feature = "config", arg(long = "openai-api-key", env = "OPENAI_API_KEY", hide_env_values = true))]
    #[serde(default, skip_serializing)]
    pub openai_api_key: Option<String>,
}

impl FeatureConfig {
    /// Returns `true` if a non-empty OpenAI key is configured.
    pub fn has_openai_key(&self) -> bool {
        self.openai_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    pub fn with_openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    /// Builds the default flag set for this environment.
    pub fn default_features(&self) -> Vec<FeatureFlag> {
        vec![
            FeatureFlag::new(
                "metrics",
                self.enable_metrics,
                "Prometheus-style metrics collection",
            ),
            FeatureFlag::new(
                "aiRecommendations",
                self.has_openai_key(),
                "AI-powered brand and sector recommendations",
            ),
            FeatureFlag::new("sectorMapping", true, "Interactive sector mapping graph"),
            FeatureFlag::new("brandCatalog", true, "Brand catalog browsing"),
            FeatureFlag::new("internTracking", true, "Intern progress tracking").with_rollout(50),
            FeatureFlag::new("legalDocuments", true, "Legal document access"),
        ]
    }
}

impl std::fmt::Debug for FeatureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureConfig")
            .field("enable_metrics", &self.enable_metrics)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "****"),
            )
            .finish()
    }
}
