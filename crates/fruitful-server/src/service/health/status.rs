use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome of a single dependency check.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Degraded,
}

/// Status reported for an aggregate probe.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OverallStatus {
    Ok,
    Degraded,
    Error,
}

impl OverallStatus {
    /// Reduces individual checks to one status.
    ///
    /// Any unhealthy check wins over any degraded one.
    pub fn reduce<'a>(checks: impl IntoIterator<Item = &'a HealthCheck>) -> Self {
        let mut overall = Self::Ok;
        for check in checks {
            match check.status {
                HealthStatus::Unhealthy => return Self::Error,
                HealthStatus::Degraded => overall = Self::Degraded,
                HealthStatus::Healthy => {}
            }
        }
        overall
    }

    /// Returns `true` unless the status is [`OverallStatus::Error`].
    #[inline]
    pub const fn is_serving(self) -> bool {
        !matches!(self, Self::Error)
    }
}

/// Result of one dependency check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Check latency in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
}

impl HealthCheck {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
            response_time: None,
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            message: Some(message.into()),
            response_time: None,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            response_time: None,
        }
    }

    /// Records how long the check took.
    pub fn with_response_time(mut self, elapsed: Duration) -> Self {
        self.response_time = Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unhealthy_wins() {
        let checks = [HealthCheck::degraded("slow"), HealthCheck::unhealthy("down")];
        assert_eq!(OverallStatus::reduce(&checks), OverallStatus::Error);
    }

    #[test]
    fn degraded_beats_healthy() {
        let checks = [HealthCheck::healthy(), HealthCheck::degraded("high memory")];
        assert_eq!(OverallStatus::reduce(&checks), OverallStatus::Degraded);
    }

    #[test]
    fn all_healthy_is_ok() {
        let checks = [HealthCheck::healthy(), HealthCheck::healthy()];
        assert_eq!(OverallStatus::reduce(&checks), OverallStatus::Ok);
        let none: [HealthCheck; 0] = [];
        assert_eq!(OverallStatus::reduce(&none), OverallStatus::Ok);
    }

    #[test]
    fn serializes_camel_case() -> anyhow::Result<()> {
        let check = HealthCheck::healthy().with_response_time(Duration::from_millis(12));
        assert_eq!(
            serde_json::to_value(&check)?,
            json!({"status": "healthy", "responseTime": 12})
        );
        assert_eq!(serde_json::to_value(OverallStatus::Error)?, json!("error"));
        Ok(())
    }
}
