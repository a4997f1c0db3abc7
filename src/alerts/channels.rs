use crate::alerts::alert::Alert;
use crate::errors::DispatchError;
use crate::types::Severity;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Resolves alerts; implemented by the rule engine and handed to
/// notification sinks as a capability
#[async_trait]
pub trait AlertResolver: Send + Sync {
    /// Resolve the alert; false if unknown or already resolved
    async fn resolve(&self, alert_id: Uuid, resolved_by: &str) -> bool;
}

/// Capability attached to critical/emergency notices so the sink can wire
/// a "Resolve" action back into the engine
#[derive(Clone)]
pub struct ResolveHandle {
    alert_id: Uuid,
    resolver: Arc<dyn AlertResolver>,
}

impl ResolveHandle {
    pub fn new(alert_id: Uuid, resolver: Arc<dyn AlertResolver>) -> Self {
        Self { alert_id, resolver }
    }

    pub fn alert_id(&self) -> Uuid {
        self.alert_id
    }

    /// Resolve the alert this notice refers to
    pub async fn resolve(&self) -> bool {
        self.resolver.resolve(self.alert_id, "notice-action").await
    }
}

impl fmt::Debug for ResolveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveHandle")
            .field("alert_id", &self.alert_id)
            .finish()
    }
}

/// What a notification sink is asked to display
#[derive(Debug, Clone)]
pub struct AlertNotice {
    pub alert_id: Uuid,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    /// None keeps the notice up until dismissed (emergency alerts)
    pub duration: Option<Duration>,
    /// OS-level notification must persist until acknowledged
    pub require_interaction: bool,
    /// Present on critical/emergency notices
    pub resolve: Option<ResolveHandle>,
}

/// Injectable UI/OS notification capability.
///
/// The core never depends on a concrete notification package; hosts plug
/// in whatever toast library or OS bridge they have.
#[mockall::automock]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Show an interactive in-app notice
    async fn show_notice(&self, notice: AlertNotice) -> Result<(), DispatchError>;

    /// Raise a native OS-level notification
    async fn push_system_notification(&self, notice: AlertNotice) -> Result<(), DispatchError>;
}

/// External analytics collaborator; deliveries are fire-and-forget
#[mockall::automock]
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn track(&self, event: &str, properties: serde_json::Value);
}

/// Bounded most-recent-first record of dispatched alerts for offline inspection
pub struct AlertLog {
    entries: RwLock<VecDeque<Alert>>,
    cap: usize,
}

impl AlertLog {
    /// Create a log keeping at most `cap` entries
    pub fn new(cap: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            cap,
        }
    }

    /// Record an alert, evicting the oldest past the cap
    pub async fn record(&self, alert: Alert) {
        let mut entries = self.entries.write().await;
        entries.push_front(alert);
        while entries.len() > self.cap {
            entries.pop_back();
        }
    }

    /// Most recent alerts first
    pub async fn recent(&self, count: usize) -> Vec<Alert> {
        let entries = self.entries.read().await;
        entries.iter().take(count).cloned().collect()
    }

    /// Everything currently retained, most recent first
    pub async fn all(&self) -> Vec<Alert> {
        let entries = self.entries.read().await;
        entries.iter().cloned().collect()
    }

    /// Retained alerts of one severity
    pub async fn by_severity(&self, severity: Severity) -> Vec<Alert> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|a| a.severity == severity)
            .cloned()
            .collect()
    }

    /// Drop everything
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new(50)
    }
}
