use crate::alerts::alert::Alert;
use crate::alerts::channels::AlertResolver;
use crate::alerts::dispatcher::AlertDispatcher;
use crate::alerts::rule::{default_rules, AlertRule};
use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::listeners::{ListenerId, Listeners};
use crate::types::{ChannelKind, Severity};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use smallvec::SmallVec;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Query filter for `get_alerts`
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub severity: Option<Severity>,
    pub alert_type: Option<String>,
    pub resolved: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Aggregate alert statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertStats {
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub by_type: HashMap<String, usize>,
    pub by_severity: HashMap<String, usize>,
    /// Mean time-to-resolve over alerts that are resolved and carry a
    /// resolution timestamp
    pub avg_resolution_ms: Option<f64>,
}

/// Parameters for creating an alert outside the rule path
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub alert_type: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub source: String,
    pub data: serde_json::Value,
    /// Empty falls back to the engine's default channels
    pub channels: SmallVec<[ChannelKind; 4]>,
}

/// Evaluates metric samples against declarative rules with
/// sustained-duration and cooldown semantics, and owns the alert lifecycle
pub struct AlertRuleEngine {
    rules: RwLock<Vec<AlertRule>>,
    /// Start of the current continuous violation, per (rule, metric).
    /// Deleted the instant the condition reads false.
    tracking: RwLock<HashMap<(Uuid, String), DateTime<Utc>>>,
    /// Last fire time per rule, gating repeat fires
    last_fired: RwLock<HashMap<Uuid, DateTime<Utc>>>,
    alerts: RwLock<VecDeque<Alert>>,
    config: Arc<RwLock<MonitorConfig>>,
    dispatcher: Arc<AlertDispatcher>,
    clock: Arc<dyn Clock>,
    listeners: Listeners<Alert>,
}

impl AlertRuleEngine {
    /// Create an engine with no rules installed
    pub fn new(
        config: Arc<RwLock<MonitorConfig>>,
        dispatcher: Arc<AlertDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            tracking: RwLock::new(HashMap::new()),
            last_fired: RwLock::new(HashMap::new()),
            alerts: RwLock::new(VecDeque::new()),
            config,
            dispatcher,
            clock,
            listeners: Listeners::new("alert"),
        }
    }

    /// Install the stock rule set; rules whose name is already present are
    /// skipped, so calling twice is harmless
    pub async fn install_default_rules(&self) {
        let mut rules = self.rules.write().await;
        for rule in default_rules() {
            if !rules.iter().any(|existing| existing.name == rule.name) {
                rules.push(rule);
            }
        }
    }

    /// Add a rule; returns its id
    pub async fn add_rule(&self, rule: AlertRule) -> Uuid {
        let id = rule.id;
        let mut rules = self.rules.write().await;
        rules.push(rule);
        id
    }

    /// Replace a rule in place by id.
    ///
    /// In-flight condition tracking and the rule's last fire time are left
    /// untouched: a live edit does not restart an accumulating violation.
    pub async fn update_rule(&self, updated: AlertRule) -> bool {
        let mut rules = self.rules.write().await;
        match rules.iter_mut().find(|r| r.id == updated.id) {
            Some(slot) => {
                *slot = updated;
                true
            }
            None => false,
        }
    }

    /// Remove a rule; alerts it already raised stay
    pub async fn remove_rule(&self, id: Uuid) -> bool {
        let mut rules = self.rules.write().await;
        let before = rules.len();
        rules.retain(|r| r.id != id);
        let removed = rules.len() != before;

        if removed {
            let mut tracking = self.tracking.write().await;
            tracking.retain(|(rule_id, _), _| *rule_id != id);
        }
        removed
    }

    /// Current rule set
    pub async fn get_rules(&self) -> Vec<AlertRule> {
        self.rules.read().await.clone()
    }

    /// Subscribe to newly created alerts
    pub async fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Alert) + Send + Sync + 'static,
    {
        self.listeners.add(listener).await
    }

    /// Unsubscribe
    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id).await
    }

    /// Evaluate every enabled rule watching this metric against a fresh value.
    ///
    /// Returns the alerts fired by this pass, in rule registration order.
    pub async fn check_metric(&self, metric_name: &str, value: f64) -> Vec<Alert> {
        let now = self.clock.now();
        let matching: Vec<AlertRule> = {
            let rules = self.rules.read().await;
            rules
                .iter()
                .filter(|r| r.enabled && r.metric_name == metric_name)
                .cloned()
                .collect()
        };

        let mut fired = Vec::new();
        for rule in matching {
            let key = (rule.id, metric_name.to_string());

            if !rule.comparator.evaluate(value, rule.threshold) {
                // A single compliant reading resets accumulation to zero
                self.tracking.write().await.remove(&key);
                continue;
            }

            let started = {
                let mut tracking = self.tracking.write().await;
                *tracking.entry(key).or_insert(now)
            };

            if now - started < Duration::milliseconds(rule.sustained_ms as i64) {
                continue;
            }

            // Cooldown alone gates repeat fires; tracking keeps accumulating
            {
                let last_fired = self.last_fired.read().await;
                if let Some(last) = last_fired.get(&rule.id) {
                    if now - *last < Duration::milliseconds(rule.cooldown_ms as i64) {
                        continue;
                    }
                }
            }
            self.last_fired.write().await.insert(rule.id, now);

            let alert = self
                .create_alert(NewAlert {
                    alert_type: "metric-threshold".to_string(),
                    severity: rule.severity,
                    title: rule.name.clone(),
                    message: format!(
                        "{} {} {} (observed {})",
                        metric_name, rule.comparator, rule.threshold, value
                    ),
                    source: format!("rule:{}", rule.id),
                    data: json!({
                        "metric": metric_name,
                        "value": value,
                        "threshold": rule.threshold,
                        "rule_id": rule.id,
                        "tags": rule.tags,
                    }),
                    channels: rule.channels.clone(),
                })
                .await;
            fired.push(alert);
        }

        fired
    }

    /// Create, store and dispatch an alert.
    ///
    /// The alert record is complete and stored before this returns; channel
    /// delivery is spawned and may still be in flight.
    pub async fn create_alert(&self, params: NewAlert) -> Alert {
        let (default_channels, max_alerts, retention) = {
            let config = self.config.read().await;
            (
                config.default_channels.clone(),
                config.max_alerts,
                Duration::from_std(config.alert_retention).unwrap_or_else(|_| Duration::hours(24)),
            )
        };

        let channels = if params.channels.is_empty() {
            default_channels
        } else {
            params.channels
        };

        let alert = Alert::new(
            params.alert_type,
            params.severity,
            params.title,
            params.message,
            params.source,
            params.data,
            channels,
            self.clock.now(),
        );

        {
            let mut alerts = self.alerts.write().await;
            alerts.push_back(alert.clone());

            // Size cap, then time retention
            while alerts.len() > max_alerts {
                alerts.pop_front();
            }
            let cutoff = self.clock.now() - retention;
            while alerts.front().is_some_and(|a| a.timestamp < cutoff) {
                alerts.pop_front();
            }
        }

        let dispatcher = self.dispatcher.clone();
        let outbound = alert.clone();
        tokio::spawn(async move {
            dispatcher.send(&outbound).await;
        });

        self.listeners.notify(&alert).await;

        alert
    }

    /// Resolve an alert; false (and no mutation) if unknown or already resolved
    pub async fn resolve_alert(&self, id: Uuid, resolved_by: &str) -> bool {
        let mut alerts = self.alerts.write().await;
        match alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) if !alert.resolved => {
                alert.resolved = true;
                alert.resolved_at = Some(self.clock.now());
                alert.resolved_by = Some(resolved_by.to_string());
                log::info!("alert {} resolved by {}", id, resolved_by);
                true
            }
            _ => false,
        }
    }

    /// Query stored alerts, newest first
    pub async fn get_alerts(&self, filter: &AlertFilter) -> Vec<Alert> {
        let alerts = self.alerts.read().await;
        let iter = alerts
            .iter()
            .rev()
            .filter(|a| filter.severity.map_or(true, |s| a.severity == s))
            .filter(|a| {
                filter
                    .alert_type
                    .as_ref()
                    .map_or(true, |t| &a.alert_type == t)
            })
            .filter(|a| filter.resolved.map_or(true, |r| a.resolved == r))
            .filter(|a| filter.since.map_or(true, |s| a.timestamp >= s))
            .cloned();

        match filter.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }

    /// Aggregate statistics over stored alerts
    pub async fn get_stats(&self) -> AlertStats {
        let alerts = self.alerts.read().await;

        let mut by_type: HashMap<String, usize> = HashMap::new();
        let mut by_severity: HashMap<String, usize> = HashMap::new();
        let mut resolved = 0;
        let mut resolution_total_ms = 0i64;
        let mut resolution_count = 0usize;

        for alert in alerts.iter() {
            *by_type.entry(alert.alert_type.clone()).or_insert(0) += 1;
            *by_severity.entry(alert.severity.to_string()).or_insert(0) += 1;

            if alert.resolved {
                resolved += 1;
                // Guard against partially initialized records
                if let Some(resolved_at) = alert.resolved_at {
                    resolution_total_ms += (resolved_at - alert.timestamp).num_milliseconds();
                    resolution_count += 1;
                }
            }
        }

        let avg_resolution_ms = if resolution_count > 0 {
            Some(resolution_total_ms as f64 / resolution_count as f64)
        } else {
            None
        };

        AlertStats {
            total: alerts.len(),
            resolved,
            unresolved: alerts.len() - resolved,
            by_type,
            by_severity,
            avg_resolution_ms,
        }
    }

    /// JSON snapshot of current alerts, rules and statistics
    pub async fn export_data(&self) -> serde_json::Value {
        let alerts: Vec<Alert> = {
            let alerts = self.alerts.read().await;
            alerts.iter().cloned().collect()
        };
        let rules = self.get_rules().await;
        let stats = self.get_stats().await;

        json!({
            "alerts": alerts,
            "rules": rules,
            "stats": stats,
            "exported_at": self.clock.now(),
        })
    }
}

#[async_trait]
impl AlertResolver for AlertRuleEngine {
    async fn resolve(&self, alert_id: Uuid, resolved_by: &str) -> bool {
        self.resolve_alert(alert_id, resolved_by).await
    }
}
