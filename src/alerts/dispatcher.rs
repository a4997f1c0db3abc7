use crate::alerts::alert::Alert;
use crate::alerts::channels::{
    AlertLog, AlertNotice, AlertResolver, AnalyticsSink, NotificationSink, ResolveHandle,
};
use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::errors::DispatchError;
use crate::types::{ChannelKind, Severity};
use futures_util::future::join_all;
use serde_json::json;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;

/// How long a non-emergency notice stays on screen
const NOTICE_DURATION: Duration = Duration::from_secs(8);
/// Auto-dismiss delay for non-emergency OS notifications
const SYSTEM_NOTIFICATION_DISMISS: Duration = Duration::from_secs(5);

/// Fans an alert out to its delivery channels, isolating per-channel failure.
///
/// Channels run concurrently and may complete in any order; one failing
/// channel is logged and never suppresses the rest.
pub struct AlertDispatcher {
    config: Arc<RwLock<MonitorConfig>>,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
    notification_sink: RwLock<Option<Arc<dyn NotificationSink>>>,
    analytics: RwLock<Option<Arc<dyn AnalyticsSink>>>,
    local_log: AlertLog,
    resolver: RwLock<Option<Weak<dyn AlertResolver>>>,
}

impl AlertDispatcher {
    /// Create a dispatcher over the shared configuration
    pub fn new(config: Arc<RwLock<MonitorConfig>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            clock,
            notification_sink: RwLock::new(None),
            analytics: RwLock::new(None),
            local_log: AlertLog::default(),
            resolver: RwLock::new(None),
        }
    }

    /// Plug in the UI/OS notification capability
    pub async fn set_notification_sink(&self, sink: Arc<dyn NotificationSink>) {
        let mut slot = self.notification_sink.write().await;
        *slot = Some(sink);
    }

    /// Plug in the analytics collaborator
    pub async fn set_analytics_sink(&self, sink: Arc<dyn AnalyticsSink>) {
        let mut slot = self.analytics.write().await;
        *slot = Some(sink);
    }

    /// Wire the resolver backing notice "Resolve" actions.
    ///
    /// Held weakly: the engine owns the dispatcher, not the other way round.
    pub async fn set_resolver(&self, resolver: Weak<dyn AlertResolver>) {
        let mut slot = self.resolver.write().await;
        *slot = Some(resolver);
    }

    /// The bounded most-recent-first local record
    pub fn local_log(&self) -> &AlertLog {
        &self.local_log
    }

    /// Deliver the alert on every channel it names (or the configured
    /// defaults), concurrently
    pub async fn send(&self, alert: &Alert) {
        let channels = if alert.channels.is_empty() {
            self.config.read().await.default_channels.clone()
        } else {
            alert.channels.clone()
        };

        let deliveries = channels
            .iter()
            .map(|channel| self.deliver_logged(*channel, alert));
        join_all(deliveries).await;
    }

    async fn deliver_logged(&self, channel: ChannelKind, alert: &Alert) {
        if let Err(e) = self.deliver(channel, alert).await {
            log::warn!(
                "alert {} delivery via {} failed: {}",
                alert.id,
                channel,
                e
            );
        }
    }

    async fn deliver(&self, channel: ChannelKind, alert: &Alert) -> Result<(), DispatchError> {
        match channel {
            ChannelKind::Console => {
                log::log!(
                    alert.severity.log_level(),
                    "[alert] [{}] {}: {}",
                    alert.alert_type,
                    alert.title,
                    alert.message
                );
                Ok(())
            }
            ChannelKind::Notice => {
                let sink = self.notification_sink.read().await;
                match sink.as_ref() {
                    // No sink plugged in: silent no-op, same as a missing URL
                    None => Ok(()),
                    Some(sink) => {
                        let notice = self.build_notice(alert, false).await;
                        sink.show_notice(notice).await
                    }
                }
            }
            ChannelKind::SystemNotification => {
                let sink = self.notification_sink.read().await;
                match sink.as_ref() {
                    None => Ok(()),
                    Some(sink) => {
                        let notice = self.build_notice(alert, true).await;
                        sink.push_system_notification(notice).await
                    }
                }
            }
            ChannelKind::Webhook => {
                let (url, app_id, timeout) = {
                    let config = self.config.read().await;
                    (
                        config.webhook_url.clone(),
                        config.app_id.clone(),
                        config.request_timeout,
                    )
                };
                let url = match url {
                    // Unconfigured webhook is a silent no-op, not an error
                    None => return Ok(()),
                    Some(url) => url,
                };

                let payload = json!({
                    "alert": alert,
                    "timestamp": self.clock.now().to_rfc3339(),
                    "appId": app_id,
                });
                self.http
                    .post(&url)
                    .timeout(timeout)
                    .json(&payload)
                    .send()
                    .await?
                    .error_for_status()?;
                Ok(())
            }
            ChannelKind::Email => {
                let (endpoint, to, timeout) = {
                    let config = self.config.read().await;
                    (
                        config.email_endpoint.clone(),
                        config.email_to.clone(),
                        config.request_timeout,
                    )
                };
                let endpoint = match endpoint {
                    None => return Ok(()),
                    Some(endpoint) => endpoint,
                };

                let payload = json!({
                    "to": to,
                    "subject": format!("[{}] {}", alert.severity.tag(), alert.title),
                    "body": alert.message,
                });
                self.http
                    .post(&endpoint)
                    .timeout(timeout)
                    .json(&payload)
                    .send()
                    .await?
                    .error_for_status()?;
                Ok(())
            }
            ChannelKind::Analytics => {
                let analytics = self.analytics.read().await;
                if let Some(analytics) = analytics.as_ref() {
                    analytics
                        .track(
                            "alert_dispatched",
                            json!({
                                "alert_id": alert.id,
                                "type": alert.alert_type,
                                "severity": alert.severity,
                                "source": alert.source,
                            }),
                        )
                        .await;
                }
                Ok(())
            }
            ChannelKind::LocalLog => {
                self.local_log.record(alert.clone()).await;
                Ok(())
            }
        }
    }

    async fn build_notice(&self, alert: &Alert, os_level: bool) -> AlertNotice {
        let duration = if alert.severity == Severity::Emergency {
            None
        } else if os_level {
            Some(SYSTEM_NOTIFICATION_DISMISS)
        } else {
            Some(NOTICE_DURATION)
        };

        // Critical and emergency notices carry a resolve capability
        let resolve = if alert.severity >= Severity::Critical {
            let resolver = self.resolver.read().await;
            resolver
                .as_ref()
                .and_then(|weak| weak.upgrade())
                .map(|resolver| ResolveHandle::new(alert.id, resolver))
        } else {
            None
        };

        AlertNotice {
            alert_id: alert.id,
            title: alert.title.clone(),
            message: alert.message.clone(),
            severity: alert.severity,
            duration,
            require_interaction: alert.severity == Severity::Emergency,
            resolve,
        }
    }
}
