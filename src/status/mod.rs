pub mod monitor;
pub mod probes;
pub mod signals;
pub mod uptime;

pub use monitor::StatusMonitor;
pub use probes::{
    CpuRoundTripProbe, FeatureSanityProbe, HttpDependencyProbe, ProbeSet, StatusProbe,
};
pub use signals::EnvironmentSignal;
pub use uptime::{
    build_report, compute_metrics, Availability, ReportPeriod, SlaSummary, UptimeEvent,
    UptimeMetrics, UptimeReport, WindowReport,
};
