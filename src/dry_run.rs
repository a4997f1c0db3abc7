use log::info;
use sitepulse::{
    init_logging, AlertDispatcher, AlertFilter, AlertRuleEngine, AlertResolver, CheckOutcome,
    Clock, CpuRoundTripProbe, FeatureSanityProbe, HealthCheckRegistry, HttpDependencyProbe,
    MetricRecorder, MonitorConfig, ProbeError, ProbeSet, StatusMonitor, StatusProbe, SystemClock,
    Threshold, ThresholdNotifier,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Stand-in dependency probe for runs without a reachable backend
struct AlwaysReachable;

#[async_trait::async_trait]
impl StatusProbe for AlwaysReachable {
    fn name(&self) -> &'static str {
        "dependency"
    }

    async fn run(&self) -> Result<(), ProbeError> {
        Ok(())
    }
}

fn print_section(title: &str) {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║ {:58} ║", title);
    println!("╚════════════════════════════════════════════════════════════╝");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info", None)?;
    info!("sitepulse dry run starting");

    // Composition root: every service explicitly constructed and wired
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let config = Arc::new(RwLock::new(MonitorConfig {
        poll_interval: Duration::from_secs(1),
        ..MonitorConfig::default()
    }));

    let dispatcher = Arc::new(AlertDispatcher::new(config.clone(), clock.clone()));
    let engine = Arc::new(AlertRuleEngine::new(
        config.clone(),
        dispatcher.clone(),
        clock.clone(),
    ));
    engine.install_default_rules().await;

    // Notices resolve back into the engine
    let resolver: Arc<dyn AlertResolver> = engine.clone();
    dispatcher.set_resolver(Arc::downgrade(&resolver)).await;

    let notifier = Arc::new(ThresholdNotifier::new());
    let recorder = Arc::new(MetricRecorder::new(100, clock.clone(), notifier));
    recorder.set_rule_engine(engine.clone()).await;

    // Health checks
    let registry = HealthCheckRegistry::new(Duration::from_secs(5), clock.clone());
    registry
        .register_check("scratch-storage", || async {
            let path = std::env::temp_dir().join(".sitepulse-dry-run");
            tokio::fs::write(&path, b"ok")
                .await
                .map_err(|e| ProbeError::failed(e.to_string()))?;
            let _ = tokio::fs::remove_file(&path).await;
            Ok(CheckOutcome::healthy("scratch dir writable"))
        })
        .await;
    registry
        .register_check("runtime", || async { Ok(CheckOutcome::healthy("ok")) })
        .await;

    // Status monitoring against a configurable dependency
    let dependency: Arc<dyn StatusProbe> = match std::env::var("SITEPULSE_DEPENDENCY_URL") {
        Ok(url) => Arc::new(HttpDependencyProbe::new(url, Duration::from_secs(5))),
        Err(_) => Arc::new(AlwaysReachable),
    };
    let probes = ProbeSet {
        responsiveness: Arc::new(CpuRoundTripProbe::default()),
        dependency,
        features: Arc::new(FeatureSanityProbe::new(std::env::temp_dir(), Vec::new())),
    };
    let monitor = Arc::new(StatusMonitor::new(
        config.clone(),
        probes,
        dispatcher.clone(),
        clock.clone(),
    ));
    monitor.start().await;

    // Synthetic traffic: healthy latencies plus one poor page load, which
    // trips the stock "Slow page loads" rule immediately
    for i in 0..5 {
        recorder
            .record_metric(
                "api_latency",
                120.0 + i as f64 * 10.0,
                "ms",
                Some(Threshold::new(500.0, 1500.0)),
            )
            .await;
    }
    recorder
        .record_metric("lcp", 5200.0, "ms", Some(Threshold::new(2500.0, 4000.0)))
        .await;

    tokio::time::sleep(Duration::from_secs(3)).await;

    print_section("PERFORMANCE REPORT");
    let report = recorder.report().await;
    println!("  score: {} ({})", report.score, report.overall);
    for (name, sample) in &report.samples {
        println!(
            "  {:20} {:>10.1} {:4} [{}]",
            name, sample.value, sample.unit, sample.rating
        );
    }

    print_section("HEALTH CHECKS");
    let health = registry.run_all_checks().await;
    println!("  overall: {}", health.overall);
    for check in &health.checks {
        println!(
            "  {:20} {:10} {:>5}ms  {}",
            check.name, check.status.to_string(), check.response_time_ms, check.message
        );
    }

    print_section("ALERTS");
    let stats = engine.get_stats().await;
    println!(
        "  total: {}  resolved: {}  unresolved: {}",
        stats.total, stats.resolved, stats.unresolved
    );
    for alert in engine.get_alerts(&AlertFilter::default()).await {
        println!("  [{}] {}: {}", alert.severity, alert.title, alert.message);
    }

    print_section("UPTIME");
    let uptime = monitor.generate_report(None, None).await;
    println!(
        "  uptime: {:.3}%  incidents: {}  sla {} (target {:.1}%)",
        uptime.metrics.uptime_percent,
        uptime.metrics.incidents,
        if uptime.sla.met { "met" } else { "MISSED" },
        uptime.sla.target
    );

    monitor.stop().await;
    info!("sitepulse dry run finished");
    Ok(())
}
