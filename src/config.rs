use crate::errors::ConfigError;
use crate::types::ChannelKind;
use smallvec::{smallvec, SmallVec};
use std::time::Duration;

/// Sustained-status alert thresholds for the status monitor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    /// Sustained down time before a downtime alert fires
    pub downtime: Duration,
    /// Sustained degraded time before a degradation alert fires
    pub degraded: Duration,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            downtime: Duration::from_secs(60),
            degraded: Duration::from_secs(300),
        }
    }
}

/// Monitoring core configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Application identifier included in webhook payloads and analytics events
    pub app_id: String,
    /// Channels used when neither the alert nor its rule names any
    pub default_channels: SmallVec<[ChannelKind; 4]>,
    /// Webhook endpoint; None disables the webhook channel
    pub webhook_url: Option<String>,
    /// Email relay endpoint; None disables the email channel
    pub email_endpoint: Option<String>,
    /// Recipient for the email channel
    pub email_to: String,
    /// Status polling interval
    pub poll_interval: Duration,
    /// Total cycle latency above which status degrades
    pub health_timeout: Duration,
    /// Per-probe and per-delivery network timeout
    pub request_timeout: Duration,
    /// SLA uptime target percentage
    pub sla_target: f64,
    /// Per-metric sample ring capacity
    pub metric_history_cap: usize,
    /// Maximum retained alerts
    pub max_alerts: usize,
    /// Alerts older than this are evicted
    pub alert_retention: Duration,
    /// Sustained-status alert thresholds
    pub alert_thresholds: AlertThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            app_id: "sitepulse".to_string(),
            default_channels: smallvec![ChannelKind::Console, ChannelKind::LocalLog],
            webhook_url: None,
            email_endpoint: None,
            email_to: String::new(),
            poll_interval: Duration::from_secs(30),
            health_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            sla_target: 99.9,
            metric_history_cap: 100,
            max_alerts: 500,
            alert_retention: Duration::from_secs(24 * 60 * 60),
            alert_thresholds: AlertThresholds::default(),
        }
    }
}

impl MonitorConfig {
    /// Validate invariants the rest of the core assumes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if !(self.sla_target > 0.0 && self.sla_target <= 100.0) {
            return Err(ConfigError::SlaTargetOutOfRange(self.sla_target));
        }
        if self.metric_history_cap == 0 || self.max_alerts == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        Ok(())
    }

    /// Merge a partial update into this configuration
    pub fn apply(&mut self, update: ConfigUpdate) -> Result<(), ConfigError> {
        let mut next = self.clone();

        if let Some(channels) = update.default_channels {
            next.default_channels = channels;
        }
        if let Some(url) = update.webhook_url {
            next.webhook_url = url;
        }
        if let Some(endpoint) = update.email_endpoint {
            next.email_endpoint = endpoint;
        }
        if let Some(to) = update.email_to {
            next.email_to = to;
        }
        if let Some(interval) = update.poll_interval {
            next.poll_interval = interval;
        }
        if let Some(timeout) = update.health_timeout {
            next.health_timeout = timeout;
        }
        if let Some(target) = update.sla_target {
            next.sla_target = target;
        }
        if let Some(thresholds) = update.alert_thresholds {
            next.alert_thresholds = thresholds;
        }

        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// Partial configuration update; None fields keep their current values
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub default_channels: Option<SmallVec<[ChannelKind; 4]>>,
    /// Some(None) clears the webhook URL
    pub webhook_url: Option<Option<String>>,
    pub email_endpoint: Option<Option<String>>,
    pub email_to: Option<String>,
    pub poll_interval: Option<Duration>,
    pub health_timeout: Option<Duration>,
    pub sla_target: Option<f64>,
    pub alert_thresholds: Option<AlertThresholds>,
}
