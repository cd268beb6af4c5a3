use serde::{Deserialize, Serialize};

/// Deployment environment the service runs in.
///
/// Selects log formatting, relaxes CORS in development and is reported by the
/// detailed health probe.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumString
)]
#[cfg_attr(feature = "config", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    /// Local development.
    #[default]
    Development,
    /// Automated test runs.
    Test,
    /// Production deployment.
    Production,
}

impl Environment {
    /// Returns `true` for [`Environment::Development`].
    #[inline]
    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns `true` for [`Environment::Production`].
    #[inline]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn parses_lowercase_names() -> anyhow::Result<()> {
        assert_eq!(Environment::from_str("production")?, Environment::Production);
        assert_eq!(Environment::from_str("test")?, Environment::Test);
        assert_eq!(Environment::Development.to_string(), "development");
        Ok(())
    }

    #[test]
    fn serializes_lowercase() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&Environment::Production)?, "\"production\"");
        Ok(())
    }
}
