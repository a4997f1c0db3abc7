use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery channel for a dispatched alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    /// Structured log line, level mapped from severity
    Console,
    /// Interactive notice shown through the injected notification sink
    Notice,
    /// Native OS-level notification through the injected notification sink
    SystemNotification,
    /// JSON POST to the configured webhook URL
    Webhook,
    /// JSON POST to the configured email endpoint
    Email,
    /// Structured event emitted to the analytics sink
    Analytics,
    /// Bounded most-recent-first in-memory record
    LocalLog,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelKind::Console => "console",
            ChannelKind::Notice => "notice",
            ChannelKind::SystemNotification => "system-notification",
            ChannelKind::Webhook => "webhook",
            ChannelKind::Email => "email",
            ChannelKind::Analytics => "analytics",
            ChannelKind::LocalLog => "local-log",
        };
        write!(f, "{}", name)
    }
}
