use crate::alerts::{Alert, AlertDispatcher};
use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::errors::ProbeError;
use crate::listeners::{ListenerId, Listeners};
use crate::status::probes::{ProbeSet, StatusProbe};
use crate::status::signals::EnvironmentSignal;
use crate::status::uptime::{build_report, UptimeEvent, UptimeReport};
use crate::types::{ServiceStatus, Severity};
use chrono::{DateTime, Utc};
use serde_json::json;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Derived outcome of one polling cycle
struct CycleOutcome {
    status: ServiceStatus,
    reason: String,
    details: serde_json::Value,
}

/// Periodically probes the system, tracks up/degraded/down transitions in an
/// append-only event log, and derives uptime statistics on demand.
///
/// Starts optimistic (up); stopping freezes the last status.
pub struct StatusMonitor {
    config: Arc<RwLock<MonitorConfig>>,
    probes: ProbeSet,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<AlertDispatcher>,
    events: RwLock<Vec<UptimeEvent>>,
    current_status: RwLock<ServiceStatus>,
    last_status_change: RwLock<DateTime<Utc>>,
    monitoring_start: RwLock<Option<DateTime<Utc>>>,
    /// Gates every state mutation so a late probe result from a cancelled
    /// cycle cannot resurrect a stopped monitor
    active: AtomicBool,
    /// Skip-if-running guard against a cycle outrunning the interval
    cycle_running: AtomicBool,
    /// Highest sustained-status alert severity fired this episode
    episode_alert: RwLock<Option<Severity>>,
    event_listeners: Listeners<UptimeEvent>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl StatusMonitor {
    /// Create a monitor; nothing runs until `start` (or `activate`)
    pub fn new(
        config: Arc<RwLock<MonitorConfig>>,
        probes: ProbeSet,
        dispatcher: Arc<AlertDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        Self {
            config,
            probes,
            clock,
            dispatcher,
            events: RwLock::new(Vec::new()),
            current_status: RwLock::new(ServiceStatus::Up),
            last_status_change: RwLock::new(now),
            monitoring_start: RwLock::new(None),
            active: AtomicBool::new(false),
            cycle_running: AtomicBool::new(false),
            episode_alert: RwLock::new(None),
            event_listeners: Listeners::new("uptime event"),
            poll_task: Mutex::new(None),
        }
    }

    /// Mark monitoring active without scheduling; cycles are then driven by
    /// the caller. `start` uses this before spawning the poll loop.
    pub async fn activate(&self) -> bool {
        if self.active.swap(true, Ordering::SeqCst) {
            return false;
        }
        let now = self.clock.now();
        {
            let mut start = self.monitoring_start.write().await;
            if start.is_none() {
                *start = Some(now);
            }
        }
        *self.last_status_change.write().await = now;
        true
    }

    /// Start the periodic poll loop
    pub async fn start(self: &Arc<Self>) {
        if !self.activate().await {
            return;
        }

        let monitor = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                if !monitor.active.load(Ordering::SeqCst) {
                    break;
                }
                monitor.run_cycle().await;

                let interval = monitor.config.read().await.poll_interval;
                tokio::time::sleep(interval).await;
            }
        });

        let mut task = self.poll_task.lock().await;
        *task = Some(handle);
        log::info!("status monitor started");
    }

    /// Cancel the poll loop immediately; the last status is frozen and any
    /// in-flight cycle's result is discarded
    pub async fn stop(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.poll_task.lock().await.take() {
            handle.abort();
        }
        self.cycle_running.store(false, Ordering::SeqCst);
        log::info!(
            "status monitor stopped; status frozen at {}",
            *self.current_status.read().await
        );
    }

    /// True between `start`/`activate` and `stop`
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Run one full probe cycle and apply the derived status
    pub async fn run_cycle(&self) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        if self.cycle_running.swap(true, Ordering::SeqCst) {
            log::warn!("previous status cycle still running, skipping this tick");
            return;
        }

        let outcome = self.execute_cycle().await;

        // A cycle that was cancelled mid-flight must not mutate state
        if self.active.load(Ordering::SeqCst) {
            self.apply_status(outcome.status, outcome.reason, outcome.details)
                .await;
        }

        self.cycle_running.store(false, Ordering::SeqCst);
    }

    async fn execute_cycle(&self) -> CycleOutcome {
        let (probe_budget, health_timeout) = {
            let config = self.config.read().await;
            (config.request_timeout, config.health_timeout)
        };

        let started = Instant::now();
        let responsiveness = run_probe(self.probes.responsiveness.as_ref(), probe_budget).await;
        let dependency = run_probe(self.probes.dependency.as_ref(), probe_budget).await;
        let features = run_probe(self.probes.features.as_ref(), probe_budget).await;
        let latency = started.elapsed();

        let details = json!({
            "responsiveness": probe_detail(&responsiveness),
            "dependency": probe_detail(&dependency),
            "features": probe_detail(&features),
            "latency_ms": latency.as_millis() as u64,
        });

        // Priority: down on responsiveness/feature failure, degraded on
        // dependency failure or a slow cycle, else up
        let (status, reason) = if let Err(e) = &responsiveness {
            (
                ServiceStatus::Down,
                format!("responsiveness probe failed: {}", e),
            )
        } else if let Err(e) = &features {
            (ServiceStatus::Down, format!("feature probe failed: {}", e))
        } else if let Err(e) = &dependency {
            (
                ServiceStatus::Degraded,
                format!("dependency probe failed: {}", e),
            )
        } else if latency > health_timeout {
            (
                ServiceStatus::Degraded,
                format!(
                    "cycle latency {}ms exceeded {}ms",
                    latency.as_millis(),
                    health_timeout.as_millis()
                ),
            )
        } else {
            (ServiceStatus::Up, "all probes passing".to_string())
        };

        CycleOutcome {
            status,
            reason,
            details,
        }
    }

    /// Record a status, appending a transition event when it changed
    async fn apply_status(
        &self,
        status: ServiceStatus,
        reason: String,
        details: serde_json::Value,
    ) {
        let now = self.clock.now();

        let transitioned = {
            let mut current = self.current_status.write().await;
            if *current == status {
                None
            } else {
                let mut events = self.events.write().await;
                let mut last_change = self.last_status_change.write().await;

                // Back-fill the ending event; the initial optimistic up
                // period has no event to close
                if let Some(last_event) = events.last_mut() {
                    if last_event.duration_ms.is_none() {
                        last_event.duration_ms =
                            Some((now - last_event.timestamp).num_milliseconds());
                    }
                }

                let event = UptimeEvent::new(status, now, reason, details);
                events.push(event.clone());
                *last_change = now;
                *current = status;
                Some(event)
            }
        };

        if let Some(event) = transitioned {
            {
                let mut episode = self.episode_alert.write().await;
                *episode = None;
            }
            log::info!("status changed to {} ({})", event.status, event.reason);
            self.event_listeners.notify(&event).await;
        }

        self.check_status_alerts(now).await;
    }

    /// Alert on a status sustained past its configured threshold, at most
    /// once per severity level per episode
    async fn check_status_alerts(&self, now: DateTime<Utc>) {
        let status = *self.current_status.read().await;
        let since = *self.last_status_change.read().await;
        let thresholds = self.config.read().await.alert_thresholds;
        let elapsed = (now - since).to_std().unwrap_or_default();

        let severity = match status {
            ServiceStatus::Down if elapsed >= thresholds.downtime => {
                if elapsed >= thresholds.downtime * 2 {
                    Some(Severity::Emergency)
                } else {
                    Some(Severity::Critical)
                }
            }
            ServiceStatus::Degraded if elapsed >= thresholds.degraded => Some(Severity::Warning),
            _ => None,
        };
        let severity = match severity {
            Some(severity) => severity,
            None => return,
        };

        {
            let mut episode = self.episode_alert.write().await;
            if episode.is_some_and(|fired| severity <= fired) {
                return;
            }
            *episode = Some(severity);
        }

        let alert = Alert::new(
            "status",
            severity,
            format!("Service {}", status),
            format!(
                "service has been {} for {}s",
                status,
                elapsed.as_secs()
            ),
            "status-monitor",
            json!({ "status": status, "since": since }),
            SmallVec::new(),
            now,
        );
        log::warn!("sustained {} for {}s, alerting", status, elapsed.as_secs());

        // Same dispatch path as rule alerts, independent of the rule engine
        self.dispatcher.send(&alert).await;
    }

    /// Feed one environment signal; visibility loss and unload only ever
    /// degrade status, they are never classified as an outage
    pub async fn handle_signal(&self, signal: EnvironmentSignal) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }

        match signal {
            EnvironmentSignal::VisibilityHidden | EnvironmentSignal::Shutdown => {
                let reason = match signal {
                    EnvironmentSignal::VisibilityHidden => "host visibility lost",
                    _ => "host unloading",
                };
                self.apply_status(
                    ServiceStatus::Degraded,
                    reason.to_string(),
                    json!({ "signal": signal }),
                )
                .await;
            }
            EnvironmentSignal::VisibilityRestored => {
                log::debug!("host visibility restored; next cycle re-derives status");
            }
        }
    }

    /// Forward an injected signal channel into the monitor
    pub fn attach_signal_source(self: &Arc<Self>, mut signals: mpsc::Receiver<EnvironmentSignal>) {
        let monitor = self.clone();
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                monitor.handle_signal(signal).await;
            }
        });
    }

    /// Subscribe to recorded transition events
    pub async fn add_event_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&UptimeEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(listener).await
    }

    /// Unsubscribe
    pub async fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.event_listeners.remove(id).await
    }

    /// Current derived status
    pub async fn current_status(&self) -> ServiceStatus {
        *self.current_status.read().await
    }

    /// Copy of the transition log
    pub async fn events(&self) -> Vec<UptimeEvent> {
        self.events.read().await.clone()
    }

    /// Build an uptime report; the window defaults to
    /// [monitoring start, now]
    pub async fn generate_report(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> UptimeReport {
        let now = self.clock.now();
        let monitoring_start = self.monitoring_start.read().await.unwrap_or(now);
        let start = start.unwrap_or(monitoring_start);
        let end = end.unwrap_or(now);

        let events = self.events.read().await;
        let sla_target = self.config.read().await.sla_target;
        build_report(&events, start, end, sla_target)
    }

    /// JSON snapshot of current status, the event log and a full-window report
    pub async fn export_health_data(&self) -> serde_json::Value {
        let report = self.generate_report(None, None).await;
        json!({
            "status": *self.current_status.read().await,
            "monitoring_start": *self.monitoring_start.read().await,
            "events": *self.events.read().await,
            "report": report,
            "exported_at": self.clock.now(),
        })
    }
}

async fn run_probe(probe: &dyn StatusProbe, budget: Duration) -> Result<(), ProbeError> {
    match tokio::time::timeout(budget, probe.run()).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(budget)),
    }
}

fn probe_detail(result: &Result<(), ProbeError>) -> serde_json::Value {
    match result {
        Ok(()) => json!({ "ok": true }),
        Err(e) => json!({ "ok": false, "error": e.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::status::probes::MockStatusProbe;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;

    fn passing_probe(name: &'static str) -> Arc<dyn StatusProbe> {
        let mut probe = MockStatusProbe::new();
        probe.expect_name().return_const(name);
        probe.expect_run().returning(|| Ok(()));
        Arc::new(probe)
    }

    fn failing_once_probe(name: &'static str) -> Arc<dyn StatusProbe> {
        let calls = AtomicUsize::new(0);
        let mut probe = MockStatusProbe::new();
        probe.expect_name().return_const(name);
        probe.expect_run().returning(move || {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ProbeError::failed("no response"))
            } else {
                Ok(())
            }
        });
        Arc::new(probe)
    }

    fn monitor_with(
        responsiveness: Arc<dyn StatusProbe>,
        dependency: Arc<dyn StatusProbe>,
        features: Arc<dyn StatusProbe>,
    ) -> (Arc<StatusMonitor>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at(
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        ));
        let config = Arc::new(RwLock::new(MonitorConfig::default()));
        let dispatcher = Arc::new(AlertDispatcher::new(config.clone(), clock.clone()));
        let probes = ProbeSet {
            responsiveness,
            dependency,
            features,
        };
        let monitor = Arc::new(StatusMonitor::new(config, probes, dispatcher, clock.clone()));
        (monitor, clock)
    }

    #[tokio::test]
    async fn test_first_passing_cycle_records_no_event() {
        let (monitor, _clock) = monitor_with(
            passing_probe("responsiveness"),
            passing_probe("dependency"),
            passing_probe("features"),
        );

        monitor.activate().await;
        monitor.run_cycle().await;

        // Already optimistic up: no transition, no event
        assert_eq!(monitor.current_status().await, ServiceStatus::Up);
        assert!(monitor.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_down_then_up_backfills_duration() {
        let (monitor, clock) = monitor_with(
            failing_once_probe("responsiveness"),
            passing_probe("dependency"),
            passing_probe("features"),
        );

        monitor.activate().await;
        monitor.run_cycle().await;
        assert_eq!(monitor.current_status().await, ServiceStatus::Down);

        clock.advance(chrono::Duration::seconds(30));
        monitor.run_cycle().await;
        assert_eq!(monitor.current_status().await, ServiceStatus::Up);

        let events = monitor.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, ServiceStatus::Down);
        assert_eq!(events[0].duration_ms, Some(30_000));
        assert_eq!(events[1].status, ServiceStatus::Up);
        assert_eq!(events[1].duration_ms, None);
    }

    #[tokio::test]
    async fn test_dependency_failure_degrades_not_down() {
        let (monitor, _clock) = monitor_with(
            passing_probe("responsiveness"),
            failing_once_probe("dependency"),
            passing_probe("features"),
        );

        monitor.activate().await;
        monitor.run_cycle().await;

        assert_eq!(monitor.current_status().await, ServiceStatus::Degraded);
    }

    #[tokio::test]
    async fn test_environment_signal_degrades_only() {
        let (monitor, _clock) = monitor_with(
            passing_probe("responsiveness"),
            passing_probe("dependency"),
            passing_probe("features"),
        );

        monitor.activate().await;
        monitor.handle_signal(EnvironmentSignal::VisibilityHidden).await;

        assert_eq!(monitor.current_status().await, ServiceStatus::Degraded);
        let events = monitor.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, ServiceStatus::Degraded);
    }

    #[tokio::test]
    async fn test_inactive_monitor_ignores_cycles_and_signals() {
        let (monitor, _clock) = monitor_with(
            failing_once_probe("responsiveness"),
            passing_probe("dependency"),
            passing_probe("features"),
        );

        // Never activated: nothing may mutate
        monitor.run_cycle().await;
        monitor.handle_signal(EnvironmentSignal::Shutdown).await;

        assert_eq!(monitor.current_status().await, ServiceStatus::Up);
        assert!(monitor.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_sustained_down_routes_alert() {
        let (monitor, clock) = monitor_with(
            {
                let mut probe = MockStatusProbe::new();
                probe.expect_name().return_const("responsiveness");
                probe
                    .expect_run()
                    .returning(|| Err(ProbeError::failed("wedged")));
                Arc::new(probe)
            },
            passing_probe("dependency"),
            passing_probe("features"),
        );

        monitor.activate().await;
        monitor.run_cycle().await;
        assert_eq!(monitor.current_status().await, ServiceStatus::Down);

        // Past the 60s downtime threshold on the next failing cycle
        clock.advance(chrono::Duration::seconds(90));
        monitor.run_cycle().await;

        let logged = monitor.dispatcher.local_log().all().await;
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].alert_type, "status");
        assert_eq!(logged[0].severity, Severity::Critical);

        // Same episode, same level: no duplicate
        clock.advance(chrono::Duration::seconds(10));
        monitor.run_cycle().await;
        assert_eq!(monitor.dispatcher.local_log().all().await.len(), 1);
    }
}
