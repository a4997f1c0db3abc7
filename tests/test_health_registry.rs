//! Health check registry isolation and aggregation:
//! - a panicking check becomes an unhealthy result instead of propagating
//! - the remaining checks still run
//! - overall status is the worst individual status

use sitepulse::{CheckOutcome, HealthCheckRegistry, HealthStatus, SystemClock};
use std::sync::Arc;
use std::time::Duration;

fn registry() -> HealthCheckRegistry {
    HealthCheckRegistry::new(Duration::from_secs(1), Arc::new(SystemClock))
}

#[tokio::test]
async fn test_panicking_check_is_isolated() {
    let registry = registry();

    registry
        .register_check("database", || async { Ok(CheckOutcome::healthy("connected")) })
        .await;
    registry
        .register_check("cache", || async { panic!("poisoned connection pool") })
        .await;
    registry
        .register_check("storage", || async { Ok(CheckOutcome::healthy("writable")) })
        .await;

    let health = registry.run_all_checks().await;

    // All three ran; the panicking one is marked unhealthy
    assert_eq!(health.checks.len(), 3);
    let cache = health
        .checks
        .iter()
        .find(|c| c.name == "cache")
        .expect("cache result present");
    assert_eq!(cache.status, HealthStatus::Unhealthy);

    let healthy = health
        .checks
        .iter()
        .filter(|c| c.status == HealthStatus::Healthy)
        .count();
    assert_eq!(healthy, 2);

    assert_eq!(health.overall, HealthStatus::Unhealthy);
}

#[tokio::test]
async fn test_overall_degrades_without_unhealthy() {
    let registry = registry();

    registry
        .register_check("database", || async { Ok(CheckOutcome::healthy("connected")) })
        .await;
    registry
        .register_check("api", || async { Ok(CheckOutcome::degraded("p99 elevated")) })
        .await;

    let health = registry.run_all_checks().await;
    assert_eq!(health.overall, HealthStatus::Degraded);
}

#[tokio::test]
async fn test_unregistered_check_stops_running() {
    let registry = registry();

    registry
        .register_check("flaky", || async { Ok(CheckOutcome::unhealthy("bad")) })
        .await;
    assert_eq!(
        registry.run_all_checks().await.overall,
        HealthStatus::Unhealthy
    );

    assert!(registry.unregister_check("flaky").await);
    let health = registry.run_all_checks().await;
    assert!(health.checks.is_empty());
    assert_eq!(health.overall, HealthStatus::Healthy);
}
