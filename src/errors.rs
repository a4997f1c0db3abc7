use std::time::Duration;
use thiserror::Error;

/// Failure of a health / responsiveness / reachability probe.
///
/// Probes never propagate past the component that ran them; every variant
/// is converted into an unhealthy/down result at the call site.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{0}")]
    Failed(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("probe task panicked")]
    Panicked,
}

impl ProbeError {
    /// Shorthand for a plain failure message
    pub fn failed(message: impl Into<String>) -> Self {
        ProbeError::Failed(message.into())
    }
}

/// Failure of a single alert delivery channel.
///
/// Logged and isolated by the dispatcher; never affects other channels or
/// the stored alert record.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("notification sink error: {0}")]
    Sink(String),
}

/// Misuse of the public configuration API.
///
/// The only error in this crate that surfaces to an external caller.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("poll interval must be non-zero")]
    ZeroPollInterval,
    #[error("sla target must be within (0, 100], got {0}")]
    SlaTargetOutOfRange(f64),
    #[error("retention caps must be non-zero")]
    ZeroRetention,
}
