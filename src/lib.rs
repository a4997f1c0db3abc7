pub mod alerts;
pub mod clock;
pub mod config;
pub mod errors;
pub mod health;
pub mod listeners;
pub mod logging;
pub mod metrics;
pub mod status;
pub mod types;

pub use alerts::{
    Alert, AlertDispatcher, AlertFilter, AlertLog, AlertNotice, AlertResolver, AlertRule,
    AlertRuleEngine, AlertStats, AnalyticsSink, Comparator, NewAlert, NotificationSink,
    ResolveHandle,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AlertThresholds, ConfigUpdate, MonitorConfig};
pub use errors::{ConfigError, DispatchError, ProbeError};
pub use health::{CheckOutcome, HealthCheckRegistry, HealthCheckResult, SystemHealth};
pub use listeners::ListenerId;
pub use logging::init_logging;
pub use metrics::{
    MetricRecorder, MetricSample, PerformanceReport, ThresholdNote, ThresholdNotifier,
};
pub use status::{
    CpuRoundTripProbe, EnvironmentSignal, FeatureSanityProbe, HttpDependencyProbe, ProbeSet,
    StatusMonitor, StatusProbe, UptimeEvent, UptimeReport,
};
pub use types::{ChannelKind, HealthStatus, Rating, ServiceStatus, Severity, Threshold};
