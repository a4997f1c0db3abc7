use crate::alerts::AlertRuleEngine;
use crate::clock::Clock;
use crate::listeners::{ListenerId, Listeners};
use crate::metrics::notifier::ThresholdNotifier;
use crate::types::{Rating, Threshold};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A single recorded metric sample, immutable once stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    pub rating: Rating,
}

/// Snapshot of the most recent sample per metric plus a derived score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Most recent sample per tracked metric name
    pub samples: HashMap<String, MetricSample>,
    /// round(100 x good / tracked); 100 when nothing is tracked yet
    pub score: u32,
    /// Score bucket: good >= 80, needs-improvement >= 60, else poor
    pub overall: Rating,
    pub generated_at: DateTime<Utc>,
}

/// Records timestamped metric samples with bounded per-metric history
pub struct MetricRecorder {
    /// Per-metric sample rings, oldest evicted past the cap
    history: DashMap<String, VecDeque<MetricSample>>,
    /// Ring capacity
    history_cap: usize,
    clock: Arc<dyn Clock>,
    /// Immediate threshold-breach path, separate from the rule engine
    notifier: Arc<ThresholdNotifier>,
    /// Rule engine receiving every sample for sustained-condition evaluation
    rule_engine: RwLock<Option<Arc<AlertRuleEngine>>>,
    sample_listeners: Listeners<MetricSample>,
    report_listeners: Listeners<PerformanceReport>,
}

impl MetricRecorder {
    /// Create a recorder with the given per-metric history capacity
    pub fn new(history_cap: usize, clock: Arc<dyn Clock>, notifier: Arc<ThresholdNotifier>) -> Self {
        Self {
            history: DashMap::new(),
            history_cap,
            clock,
            notifier,
            rule_engine: RwLock::new(None),
            sample_listeners: Listeners::new("metric sample"),
            report_listeners: Listeners::new("performance report"),
        }
    }

    /// Attach the rule engine samples are forwarded to
    pub async fn set_rule_engine(&self, engine: Arc<AlertRuleEngine>) {
        let mut slot = self.rule_engine.write().await;
        *slot = Some(engine);
    }

    /// Subscribe to every recorded sample
    pub async fn add_sample_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&MetricSample) + Send + Sync + 'static,
    {
        self.sample_listeners.add(listener).await
    }

    /// Unsubscribe from samples
    pub async fn remove_sample_listener(&self, id: ListenerId) -> bool {
        self.sample_listeners.remove(id).await
    }

    /// Subscribe to generated performance reports
    pub async fn add_report_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PerformanceReport) + Send + Sync + 'static,
    {
        self.report_listeners.add(listener).await
    }

    /// Unsubscribe from reports
    pub async fn remove_report_listener(&self, id: ListenerId) -> bool {
        self.report_listeners.remove(id).await
    }

    /// Record a sample, classify it, and run both alerting paths.
    ///
    /// Never fails: a missing threshold simply rates the sample good.
    pub async fn record_metric(
        &self,
        name: &str,
        value: f64,
        unit: &str,
        threshold: Option<Threshold>,
    ) -> MetricSample {
        let rating = threshold.map(|t| t.rate(value)).unwrap_or(Rating::Good);

        let sample = MetricSample {
            name: name.to_string(),
            value,
            unit: unit.to_string(),
            timestamp: self.clock.now(),
            rating,
        };

        // Append to the per-metric ring, evicting the oldest past the cap
        {
            let mut ring = self.history.entry(name.to_string()).or_default();
            ring.push_back(sample.clone());
            while ring.len() > self.history_cap {
                ring.pop_front();
            }
        }

        self.sample_listeners.notify(&sample).await;

        // Immediate threshold note (no duration semantics)
        self.notifier.observe(&sample).await;

        // Sustained-condition rules
        let engine = self.rule_engine.read().await;
        if let Some(engine) = engine.as_ref() {
            engine.check_metric(name, value).await;
        }

        sample
    }

    /// Recorded history for one metric, oldest first
    pub fn history(&self, name: &str) -> Vec<MetricSample> {
        self.history
            .get(name)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Names of all tracked metrics
    pub fn tracked_metrics(&self) -> Vec<String> {
        self.history.iter().map(|e| e.key().clone()).collect()
    }

    /// Build the current performance report and push it to report listeners
    pub async fn report(&self) -> PerformanceReport {
        let mut samples = HashMap::new();
        for entry in self.history.iter() {
            if let Some(latest) = entry.value().back() {
                samples.insert(entry.key().clone(), latest.clone());
            }
        }

        let tracked = samples.len();
        let good = samples
            .values()
            .filter(|s| s.rating == Rating::Good)
            .count();

        let score = if tracked == 0 {
            100
        } else {
            (100.0 * good as f64 / tracked as f64).round() as u32
        };

        let overall = if score >= 80 {
            Rating::Good
        } else if score >= 60 {
            Rating::NeedsImprovement
        } else {
            Rating::Poor
        };

        let report = PerformanceReport {
            samples,
            score,
            overall,
            generated_at: self.clock.now(),
        };

        self.report_listeners.notify(&report).await;

        report
    }
}
