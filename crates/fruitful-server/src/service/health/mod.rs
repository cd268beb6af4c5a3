//! Liveness, readiness and detailed health probes.

mod probe;
mod service;
mod status;

pub use self::probe::{DatabaseProbe, MemoryProbe, MemoryUsage, ProcessMemoryProbe};
pub use self::service::{
    DetailedReport, HealthChecks, HealthService, LivenessReport, ReadinessReport,
};
pub use self::status::{HealthCheck, HealthStatus, OverallStatus};

/// Tracing target for health checks.
pub(crate) const TRACING_TARGET_HEALTH: &str = "fruitful_server::service::health";

#[cfg(test)]
pub(crate) use self::service::tests::{FakeDatabase, FakeMemory};
