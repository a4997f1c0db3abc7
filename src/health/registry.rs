use crate::clock::Clock;
use crate::errors::ProbeError;
use crate::types::HealthStatus;
use chrono::{DateTime, Utc};
use futures_util::future::{join_all, BoxFuture};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// What a registered check reports when it completes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub status: HealthStatus,
    pub message: String,
    pub details: serde_json::Value,
}

impl CheckOutcome {
    pub fn healthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Result of one executed check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub name: String,
    pub status: HealthStatus,
    pub response_time_ms: u64,
    pub message: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Aggregated system health; derived per call, never stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub overall: HealthStatus,
    pub checks: Vec<HealthCheckResult>,
    /// Time since the registry was constructed
    pub uptime_ms: i64,
    pub timestamp: DateTime<Utc>,
}

type CheckFn =
    Arc<dyn Fn() -> BoxFuture<'static, Result<CheckOutcome, ProbeError>> + Send + Sync>;

/// Runs independently registered named probes and aggregates one overall status.
///
/// A probe that errors, panics or exceeds the check timeout is converted into
/// an unhealthy result; the remaining probes always run.
pub struct HealthCheckRegistry {
    checks: RwLock<Vec<(String, CheckFn)>>,
    check_timeout: Duration,
    clock: Arc<dyn Clock>,
    started_at: DateTime<Utc>,
}

impl HealthCheckRegistry {
    /// Create a registry; `check_timeout` bounds every probe execution
    pub fn new(check_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            checks: RwLock::new(Vec::new()),
            check_timeout,
            clock,
            started_at,
        }
    }

    /// Register a named probe; a later registration under the same name
    /// replaces the earlier one
    pub async fn register_check<F, Fut>(&self, name: impl Into<String>, check: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<CheckOutcome, ProbeError>> + Send + 'static,
    {
        let name = name.into();
        let check: CheckFn = Arc::new(move || Box::pin(check()));

        let mut checks = self.checks.write().await;
        if let Some(slot) = checks.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = check;
        } else {
            checks.push((name, check));
        }
    }

    /// Remove a probe; false if the name is unknown
    pub async fn unregister_check(&self, name: &str) -> bool {
        let mut checks = self.checks.write().await;
        let before = checks.len();
        checks.retain(|(n, _)| n != name);
        checks.len() != before
    }

    /// Names of registered probes, in registration order
    pub async fn check_names(&self) -> Vec<String> {
        let checks = self.checks.read().await;
        checks.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Execute every registered probe concurrently and aggregate
    pub async fn run_all_checks(&self) -> SystemHealth {
        let checks: Vec<(String, CheckFn)> = {
            let checks = self.checks.read().await;
            checks.clone()
        };

        let executions = checks
            .into_iter()
            .map(|(name, check)| self.execute_check(name, check));
        let results = join_all(executions).await;

        let mut overall = HealthStatus::Healthy;
        for result in &results {
            match result.status {
                HealthStatus::Unhealthy => overall = HealthStatus::Unhealthy,
                HealthStatus::Degraded => {
                    if overall == HealthStatus::Healthy {
                        overall = HealthStatus::Degraded;
                    }
                }
                HealthStatus::Healthy => {}
            }
        }

        let now = self.clock.now();
        SystemHealth {
            overall,
            checks: results,
            uptime_ms: (now - self.started_at).num_milliseconds(),
            timestamp: now,
        }
    }

    async fn execute_check(&self, name: String, check: CheckFn) -> HealthCheckResult {
        let started = Instant::now();

        // Spawned so a panicking probe surfaces as a join error here
        // instead of unwinding through the registry
        let execution = tokio::time::timeout(self.check_timeout, tokio::spawn(check()));

        let outcome = match execution.await {
            Ok(Ok(Ok(outcome))) => outcome,
            Ok(Ok(Err(probe_err))) => CheckOutcome::unhealthy(probe_err.to_string()),
            Ok(Err(_join_err)) => CheckOutcome::unhealthy(ProbeError::Panicked.to_string()),
            Err(_elapsed) => {
                CheckOutcome::unhealthy(ProbeError::Timeout(self.check_timeout).to_string())
            }
        };

        HealthCheckResult {
            name,
            status: outcome.status,
            response_time_ms: started.elapsed().as_millis() as u64,
            message: outcome.message,
            details: outcome.details,
            timestamp: self.clock.now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    fn registry() -> HealthCheckRegistry {
        HealthCheckRegistry::new(Duration::from_millis(200), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        let health = registry().run_all_checks().await;
        assert_eq!(health.overall, HealthStatus::Healthy);
        assert!(health.checks.is_empty());
    }

    #[tokio::test]
    async fn test_degraded_does_not_mask_unhealthy() {
        let registry = registry();
        registry
            .register_check("storage", || async { Ok(CheckOutcome::unhealthy("disk full")) })
            .await;
        registry
            .register_check("api", || async { Ok(CheckOutcome::degraded("slow")) })
            .await;

        let health = registry.run_all_checks().await;
        assert_eq!(health.overall, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_timed_out_check_is_unhealthy() {
        let registry = registry();
        registry
            .register_check("stuck", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(CheckOutcome::healthy("ok"))
            })
            .await;

        let health = registry.run_all_checks().await;
        assert_eq!(health.checks[0].status, HealthStatus::Unhealthy);
        assert!(health.checks[0].message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_reregistration_replaces() {
        let registry = registry();
        registry
            .register_check("api", || async { Ok(CheckOutcome::unhealthy("old")) })
            .await;
        registry
            .register_check("api", || async { Ok(CheckOutcome::healthy("new")) })
            .await;

        let health = registry.run_all_checks().await;
        assert_eq!(health.checks.len(), 1);
        assert_eq!(health.overall, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_unregister() {
        let registry = registry();
        registry
            .register_check("api", || async { Ok(CheckOutcome::healthy("ok")) })
            .await;

        assert!(registry.unregister_check("api").await);
        assert!(!registry.unregister_check("api").await);
    }
}
