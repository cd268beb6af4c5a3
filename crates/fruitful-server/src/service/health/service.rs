use std::sync::Arc;
use std::time::Instant;

use jiff::Timestamp;
use serde::Serialize;

use super::{
    DatabaseProbe, HealthCheck, MemoryProbe, MemoryUsage, OverallStatus, ProcessMemoryProbe,
    TRACING_TARGET_HEALTH,
};
use crate::service::Environment;
use crate::service::cache::CacheBackend;

/// Memory ratio above which the process is degraded.
const MEMORY_DEGRADED_RATIO: f64 = 0.75;

/// Memory ratio above which the process is unhealthy.
const MEMORY_UNHEALTHY_RATIO: f64 = 0.90;

/// Body of the liveness probe.
#[derive(Debug, Clone, Serialize)]
pub struct LivenessReport {
    pub status: OverallStatus,
    pub timestamp: Timestamp,
    /// Seconds since the service started.
    pub uptime: f64,
}

/// Individual dependency checks.
#[derive(Debug, Clone, Serialize)]
pub struct HealthChecks {
    pub database: HealthCheck,
    pub memory: HealthCheck,
}

impl HealthChecks {
    fn overall(&self) -> OverallStatus {
        OverallStatus::reduce([&self.database, &self.memory])
    }
}

/// Body of the readiness probe.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub status: OverallStatus,
    pub timestamp: Timestamp,
    pub uptime: f64,
    pub checks: HealthChecks,
}

/// Body of the detailed probe.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedReport {
    pub status: OverallStatus,
    pub timestamp: Timestamp,
    pub uptime: f64,
    pub version: &'static str,
    pub runtime: String,
    pub environment: Environment,
    pub cache: CacheBackend,
    pub checks: HealthChecks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryUsage>,
}

/// Composes liveness, readiness and detailed health reports.
///
/// Holds no state between probes and never retries.
#[derive(Clone)]
pub struct HealthService {
    database: Arc<dyn DatabaseProbe>,
    memory: Arc<dyn MemoryProbe>,
    started_at: Instant,
    environment: Environment,
    cache_backend: CacheBackend,
}

impl HealthService {
    /// Creates a service probing `database` and the current process memory.
    pub fn new(database: impl DatabaseProbe) -> Self {
        Self {
            database: Arc::new(database),
            memory: Arc::new(ProcessMemoryProbe),
            started_at: Instant::now(),
            environment: Environment::default(),
            cache_backend: CacheBackend::Memory,
        }
    }

    /// Replaces the memory probe.
    pub fn with_memory_probe(mut self, memory: impl MemoryProbe) -> Self {
        self.memory = Arc::new(memory);
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_cache_backend(mut self, backend: CacheBackend) -> Self {
        self.cache_backend = backend;
        self
    }

    fn uptime(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Checks database connectivity.
    pub async fn check_database(&self) -> HealthCheck {
        let started = Instant::now();
        match self.database.ping().await {
            Ok(()) => HealthCheck::healthy().with_response_time(started.elapsed()),
            Err(error) => {
                tracing::error!(
                    target: TRACING_TARGET_HEALTH,
                    error = %error,
                    "database health check failed"
                );
                HealthCheck::unhealthy(error.to_string())
            }
        }
    }

    fn sample_memory(&self) -> Option<MemoryUsage> {
        match self.memory.sample() {
            Ok(usage) => Some(usage),
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET_HEALTH,
                    error = %error,
                    "cannot sample process memory"
                );
                None
            }
        }
    }

    /// Classifies a memory sample by its used share of the limit.
    pub fn check_memory_usage(usage: Option<&MemoryUsage>) -> HealthCheck {
        let Some(usage) = usage else {
            return HealthCheck::degraded("Memory usage unavailable");
        };

        let ratio = usage.ratio();
        let percent = ratio * 100.0;
        if ratio > MEMORY_UNHEALTHY_RATIO {
            HealthCheck::unhealthy(format!("Memory usage critical: {percent:.1}%"))
        } else if ratio > MEMORY_DEGRADED_RATIO {
            HealthCheck::degraded(format!("Memory usage high: {percent:.1}%"))
        } else {
            HealthCheck::healthy()
        }
    }

    /// Checks process memory pressure.
    pub fn check_memory(&self) -> HealthCheck {
        Self::check_memory_usage(self.sample_memory().as_ref())
    }

    /// Reports that the process is running. Touches no dependency.
    pub fn liveness(&self) -> LivenessReport {
        LivenessReport {
            status: OverallStatus::Ok,
            timestamp: Timestamp::now(),
            uptime: self.uptime(),
        }
    }

    /// Reports whether the service can take traffic.
    pub async fn readiness(&self) -> ReadinessReport {
        let checks = HealthChecks {
            database: self.check_database().await,
            memory: self.check_memory(),
        };

        let status = checks.overall();
        if !status.is_serving() {
            tracing::warn!(target: TRACING_TARGET_HEALTH, status = %status, "service not ready");
        }

        ReadinessReport {
            status,
            timestamp: Timestamp::now(),
            uptime: self.uptime(),
            checks,
        }
    }

    /// Reports readiness together with build and runtime details.
    pub async fn detailed(&self) -> DetailedReport {
        let memory = self.sample_memory();
        let checks = HealthChecks {
            database: self.check_database().await,
            memory: Self::check_memory_usage(memory.as_ref()),
        };

        DetailedReport {
            status: checks.overall(),
            timestamp: Timestamp::now(),
            uptime: self.uptime(),
            version: env!("CARGO_PKG_VERSION"),
            runtime: format!(
                "rust {}",
                option_env!("CARGO_PKG_RUST_VERSION").unwrap_or("unknown")
            ),
            environment: self.environment,
            cache: self.cache_backend,
            checks,
            memory,
        }
    }
}

impl std::fmt::Debug for HealthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthService")
            .field("started_at", &self.started_at)
            .field("environment", &self.environment)
            .field("cache_backend", &self.cache_backend)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::BoxedError;
    use crate::service::health::HealthStatus;

    /// Database probe with a switchable outcome.
    #[derive(Debug, Default, Clone)]
    pub(crate) struct FakeDatabase {
        pub(crate) down: Arc<AtomicBool>,
    }

    impl FakeDatabase {
        pub(crate) fn down() -> Self {
            Self {
                down: Arc::new(AtomicBool::new(true)),
            }
        }
    }

    #[async_trait::async_trait]
    impl DatabaseProbe for FakeDatabase {
        async fn ping(&self) -> Result<(), BoxedError> {
            if self.down.load(Ordering::SeqCst) {
                Err("connection refused".into())
            } else {
                Ok(())
            }
        }
    }

    /// Memory probe returning a fixed usage ratio.
    #[derive(Debug, Clone, Copy)]
    pub(crate) struct FakeMemory(pub(crate) Option<u64>);

    impl FakeMemory {
        pub(crate) fn percent(used: u64) -> Self {
            Self(Some(used))
        }
    }

    impl MemoryProbe for FakeMemory {
        fn sample(&self) -> io::Result<MemoryUsage> {
            let used = self
                .0
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no procfs"))?;
            Ok(MemoryUsage {
                heap_used: used,
                heap_total: 100,
                rss: used,
                external: 0,
            })
        }
    }

    fn service(database: FakeDatabase, memory: FakeMemory) -> HealthService {
        HealthService::new(database).with_memory_probe(memory)
    }

    #[tokio::test]
    async fn healthy_dependencies_are_ok() {
        let health = service(FakeDatabase::default(), FakeMemory::percent(10));
        let report = health.readiness().await;

        assert_eq!(report.status, OverallStatus::Ok);
        assert_eq!(report.checks.database.status, HealthStatus::Healthy);
        assert!(report.checks.database.response_time.is_some());
    }

    #[tokio::test]
    async fn database_failure_is_error() {
        let health = service(FakeDatabase::down(), FakeMemory::percent(10));
        let report = health.readiness().await;

        assert_eq!(report.status, OverallStatus::Error);
        assert_eq!(
            report.checks.database.message.as_deref(),
            Some("connection refused")
        );
    }

    #[tokio::test]
    async fn memory_thresholds() {
        let degraded = service(FakeDatabase::default(), FakeMemory::percent(80));
        assert_eq!(degraded.readiness().await.status, OverallStatus::Degraded);

        let critical = service(FakeDatabase::default(), FakeMemory::percent(95));
        assert_eq!(critical.readiness().await.status, OverallStatus::Error);

        let edge = service(FakeDatabase::default(), FakeMemory::percent(75));
        assert_eq!(edge.check_memory().status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn sampling_failure_is_degraded() {
        let health = service(FakeDatabase::default(), FakeMemory(None));
        let check = health.check_memory();
        assert_eq!(check.status, HealthStatus::Degraded);
        assert!(check.message.is_some());
    }

    #[tokio::test]
    async fn liveness_ignores_database() {
        let health = service(FakeDatabase::down(), FakeMemory::percent(99));
        assert_eq!(health.liveness().status, OverallStatus::Ok);
    }

    #[tokio::test]
    async fn detailed_reports_build_details() -> anyhow::Result<()> {
        let health = service(FakeDatabase::default(), FakeMemory::percent(10))
            .with_environment(Environment::Production)
            .with_cache_backend(CacheBackend::Unavailable);

        let report = serde_json::to_value(health.detailed().await)?;
        assert_eq!(report["status"], "ok");
        assert_eq!(report["environment"], "production");
        assert_eq!(report["cache"], "unavailable");
        assert_eq!(report["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(report["memory"]["heapUsed"], 10);
        assert!(report["runtime"].as_str().is_some_and(|r| r.starts_with("rust ")));
        assert!(report["checks"]["database"]["responseTime"].is_u64());
        Ok(())
    }
}
