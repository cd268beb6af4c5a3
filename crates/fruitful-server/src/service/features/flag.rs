use serde::{Deserialize, Serialize};

/// Upper bound of a rollout percentage.
pub const MAX_ROLLOUT: u8 = 100;

/// Named boolean gate with an optional percentage rollout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlag {
    /// Unique flag name.
    pub name: String,
    /// Master switch. A disabled flag is off for everyone.
    pub enabled: bool,
    /// Human-readable purpose.
    #[serde(default)]
    pub description: String,
    /// Share of identified users that see the flag, in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_percentage: Option<u8>,
}

impl FeatureFlag {
    /// Creates a flag without rollout.
    pub fn new(name: impl Into<String>, enabled: bool, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled,
            description: description.into(),
            rollout_percentage: None,
        }
    }

    /// Restricts the flag to `percentage` of identified users.
    pub fn with_rollout(mut self, percentage: u8) -> Self {
        self.rollout_percentage = Some(percentage.min(MAX_ROLLOUT));
        self
    }

    /// Clamps the rollout into `0..=100`.
    pub(crate) fn clamped(mut self) -> Self {
        self.rollout_percentage = self.rollout_percentage.map(|p| p.min(MAX_ROLLOUT));
        self
    }
}

/// Partial update merged shallowly into an existing flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlagUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_percentage: Option<u8>,
}

impl FeatureFlagUpdate {
    /// Overwrites every field present in the update.
    pub fn apply(self, flag: &mut FeatureFlag) {
        if let Some(enabled) = self.enabled {
            flag.enabled = enabled;
        }
        if let Some(description) = self.description {
            flag.description = description;
        }
        if let Some(percentage) = self.rollout_percentage {
            flag.rollout_percentage = Some(percentage.min(MAX_ROLLOUT));
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_camel_case() -> anyhow::Result<()> {
        let flag = FeatureFlag::new("internTracking", true, "Tracking").with_rollout(50);
        let value = serde_json::to_value(&flag)?;
        assert_eq!(
            value,
            json!({
                "name": "internTracking",
                "enabled": true,
                "description": "Tracking",
                "rolloutPercentage": 50
            })
        );

        let plain = serde_json::to_value(FeatureFlag::new("a", false, ""))?;
        assert!(plain.get("rolloutPercentage").is_none());
        Ok(())
    }

    #[test]
    fn rollout_is_clamped() {
        let flag = FeatureFlag::new("a", true, "").with_rollout(250);
        assert_eq!(flag.rollout_percentage, Some(100));
    }

    #[test]
    fn update_merges_present_fields() {
        let mut flag = FeatureFlag::new("a", true, "before");
        FeatureFlagUpdate {
            enabled: Some(false),
            rollout_percentage: Some(20),
            ..Default::default()
        }
        .apply(&mut flag);

        assert!(!flag.enabled);
        assert_eq!(flag.description, "before");
        assert_eq!(flag.rollout_percentage, Some(20));
    }
}
