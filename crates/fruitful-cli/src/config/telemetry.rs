//! Logging configuration.

use clap::{Args, ValueEnum};
use fruitful_server::service::Environment;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Verbosity used when `RUST_LOG` is not set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    /// Returns the [`EnvFilter`] directive for this level.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Args, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level, overridden by `RUST_LOG` when set.
    #[arg(long, env = "LOG_LEVEL", value_enum, default_value_t = LogLevel::Info)]
    #[serde(default)]
    pub log_level: LogLevel,
}

impl TelemetryConfig {
    /// Builds the log filter: `RUST_LOG` first, then `LOG_LEVEL`.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_level.as_directive()))
    }

    /// Installs the global tracing subscriber.
    ///
    /// Production emits JSON lines; other environments emit colored text.
    pub fn init_tracing(&self, environment: Environment) {
        let (json, text) = if environment.is_production() {
            (Some(tracing_subscriber::fmt::layer().json()), None)
        } else {
            (None, Some(tracing_subscriber::fmt::layer().with_ansi(true)))
        };

        tracing_subscriber::registry()
            .with(self.env_filter())
            .with(json)
            .with(text)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_to_directives() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::Error.as_directive(), "error");
        assert_eq!(LogLevel::Debug.as_directive(), "debug");
    }
}
