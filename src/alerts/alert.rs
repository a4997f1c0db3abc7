use crate::types::{ChannelKind, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

/// A raised alert.
///
/// Created once; the only mutation afterwards is the monotonic resolve
/// transition (`resolved` false -> true, `resolved_at` set exactly once).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    /// What raised the alert (rule id, status monitor, ...)
    pub source: String,
    pub timestamp: DateTime<Utc>,
    /// Free-form context attached by the producer
    pub data: serde_json::Value,
    /// Delivery channels; defaulted by the engine when the producer names none
    pub channels: SmallVec<[ChannelKind; 4]>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

impl Alert {
    /// Create an unresolved alert with a fresh id
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        alert_type: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<String>,
        data: serde_json::Value,
        channels: SmallVec<[ChannelKind; 4]>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type: alert_type.into(),
            severity,
            title: title.into(),
            message: message.into(),
            source: source.into(),
            timestamp,
            data,
            channels,
            resolved: false,
            resolved_at: None,
            resolved_by: None,
        }
    }
}
