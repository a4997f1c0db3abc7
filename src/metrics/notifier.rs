use crate::listeners::{ListenerId, Listeners};
use crate::metrics::recorder::MetricSample;
use crate::types::{Rating, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immediate threshold-breach note raised the moment a sample rates below good.
///
/// This path is intentionally separate from the rule engine: it has no
/// sustained-duration or cooldown semantics, it reacts to every single
/// breaching sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdNote {
    pub metric: String,
    pub value: f64,
    pub unit: String,
    pub rating: Rating,
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Raises immediate per-sample threshold notes, distinct from the rule engine
pub struct ThresholdNotifier {
    listeners: Listeners<ThresholdNote>,
}

impl ThresholdNotifier {
    /// Create a notifier with no subscribers
    pub fn new() -> Self {
        Self {
            listeners: Listeners::new("threshold note"),
        }
    }

    /// Subscribe to threshold notes
    pub async fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ThresholdNote) + Send + Sync + 'static,
    {
        self.listeners.add(listener).await
    }

    /// Unsubscribe
    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id).await
    }

    /// Evaluate a sample; a below-good rating produces and fans out a note
    pub async fn observe(&self, sample: &MetricSample) -> Option<ThresholdNote> {
        let severity = match sample.rating {
            Rating::Good => return None,
            Rating::NeedsImprovement => Severity::Warning,
            Rating::Poor => Severity::Critical,
        };

        let note = ThresholdNote {
            metric: sample.name.clone(),
            value: sample.value,
            unit: sample.unit.clone(),
            rating: sample.rating,
            severity,
            message: format!(
                "{} rated {}: {} {}",
                sample.name, sample.rating, sample.value, sample.unit
            ),
            timestamp: sample.timestamp,
        };

        log::log!(severity.log_level(), "[threshold] {}", note.message);

        self.listeners.notify(&note).await;

        Some(note)
    }
}

impl Default for ThresholdNotifier {
    fn default() -> Self {
        Self::new()
    }
}
