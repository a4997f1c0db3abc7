use crate::types::ServiceStatus;
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry in the append-only status transition log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeEvent {
    pub id: Uuid,
    pub status: ServiceStatus,
    pub timestamp: DateTime<Utc>,
    /// Back-filled when the next transition is recorded; open on the live event
    pub duration_ms: Option<i64>,
    pub reason: String,
    pub details: serde_json::Value,
}

impl UptimeEvent {
    /// Create an open-ended event starting now
    pub fn new(
        status: ServiceStatus,
        timestamp: DateTime<Utc>,
        reason: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            status,
            timestamp,
            duration_ms: None,
            reason: reason.into(),
            details,
        }
    }
}

/// Report window bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Core uptime statistics over one window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeMetrics {
    pub uptime_percent: f64,
    pub total_uptime_ms: i64,
    pub total_downtime_ms: i64,
    /// Down events starting inside the window
    pub incidents: usize,
    pub mtbf_ms: f64,
    /// Mean time to recovery; None when no recovered incident exists
    pub mttr_ms: Option<f64>,
}

impl UptimeMetrics {
    fn all_up(window_ms: i64) -> Self {
        Self {
            uptime_percent: 100.0,
            total_uptime_ms: window_ms,
            total_downtime_ms: 0,
            incidents: 0,
            mtbf_ms: window_ms as f64,
            mttr_ms: None,
        }
    }
}

/// SLA verdict for a report window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaSummary {
    pub target: f64,
    pub actual: f64,
    pub met: bool,
}

/// Metrics for one availability sub-window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowReport {
    pub period: ReportPeriod,
    pub metrics: UptimeMetrics,
}

/// Daily and hourly availability breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    pub daily: Vec<WindowReport>,
    pub hourly: Vec<WindowReport>,
}

/// Full on-demand uptime report; derived, never persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeReport {
    pub period: ReportPeriod,
    pub metrics: UptimeMetrics,
    /// Events starting inside the window
    pub events: Vec<UptimeEvent>,
    pub sla: SlaSummary,
    pub availability: Availability,
}

/// Compute uptime statistics for [start, end].
///
/// The event stream partitions monitored time; spans no event covers default
/// to up, so an empty log yields 100% uptime. Degraded intervals count as
/// uptime; only down intervals accrue downtime.
pub fn compute_metrics(
    events: &[UptimeEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> UptimeMetrics {
    let window_ms = (end - start).num_milliseconds();
    if window_ms <= 0 {
        return UptimeMetrics::all_up(0);
    }

    let mut total_downtime_ms = 0i64;
    let mut incidents = 0usize;

    for (i, event) in events.iter().enumerate() {
        if event.timestamp >= end {
            break;
        }

        // Effective duration: the stored back-fill, the gap to the next
        // event and the window end all cap it
        let mut effective_ms = (end - event.timestamp).num_milliseconds();
        if let Some(stored) = event.duration_ms {
            effective_ms = effective_ms.min(stored);
        }
        if let Some(next) = events.get(i + 1) {
            effective_ms = effective_ms.min((next.timestamp - event.timestamp).num_milliseconds());
        }

        // Clip the part that falls before the window
        let before_window_ms = (start - event.timestamp).num_milliseconds().max(0);
        let in_window_ms = (effective_ms - before_window_ms).max(0);

        if event.status == ServiceStatus::Down {
            total_downtime_ms += in_window_ms;
            if event.timestamp >= start {
                incidents += 1;
            }
        }
    }

    // Unobserved spans default to up
    let total_uptime_ms = window_ms - total_downtime_ms;
    let uptime_percent = total_uptime_ms as f64 / window_ms as f64 * 100.0;
    let mtbf_ms = total_uptime_ms as f64 / incidents.saturating_sub(1).max(1) as f64;

    // Mean time to recovery: down event -> next subsequent up event; outages
    // with no recorded recovery are excluded from the mean
    let mut recovery_total_ms = 0i64;
    let mut recovery_count = 0usize;
    for (i, event) in events.iter().enumerate() {
        if event.status != ServiceStatus::Down
            || event.timestamp < start
            || event.timestamp >= end
        {
            continue;
        }
        if let Some(up) = events[i + 1..]
            .iter()
            .find(|e| e.status == ServiceStatus::Up)
        {
            recovery_total_ms += (up.timestamp - event.timestamp).num_milliseconds();
            recovery_count += 1;
        }
    }
    let mttr_ms = if recovery_count > 0 {
        Some(recovery_total_ms as f64 / recovery_count as f64)
    } else {
        None
    };

    UptimeMetrics {
        uptime_percent,
        total_uptime_ms,
        total_downtime_ms,
        incidents,
        mtbf_ms,
        mttr_ms,
    }
}

/// Day-aligned sub-windows across [start, end], clamped to the window
pub fn daily_breakdown(
    events: &[UptimeEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<WindowReport> {
    bucket_breakdown(events, start, end, Duration::days(1))
}

/// Hour-aligned sub-windows over the trailing 24h of the window
pub fn hourly_breakdown(
    events: &[UptimeEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<WindowReport> {
    let trailing_start = (end - Duration::hours(24)).max(start);
    bucket_breakdown(events, trailing_start, end, Duration::hours(1))
}

fn bucket_breakdown(
    events: &[UptimeEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
) -> Vec<WindowReport> {
    let mut buckets = Vec::new();
    if start >= end {
        return buckets;
    }

    let mut cursor = start.duration_trunc(step).unwrap_or(start);
    while cursor < end {
        let next = cursor + step;
        let bucket_start = cursor.max(start);
        let bucket_end = next.min(end);
        if bucket_end > bucket_start {
            buckets.push(WindowReport {
                period: ReportPeriod {
                    start: bucket_start,
                    end: bucket_end,
                },
                metrics: compute_metrics(events, bucket_start, bucket_end),
            });
        }
        cursor = next;
    }
    buckets
}

/// Assemble the full report for [start, end]
pub fn build_report(
    events: &[UptimeEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    sla_target: f64,
) -> UptimeReport {
    let metrics = compute_metrics(events, start, end);
    let in_window: Vec<UptimeEvent> = events
        .iter()
        .filter(|e| e.timestamp >= start && e.timestamp < end)
        .cloned()
        .collect();

    let sla = SlaSummary {
        target: sla_target,
        actual: metrics.uptime_percent,
        met: metrics.uptime_percent >= sla_target,
    };

    let availability = Availability {
        daily: daily_breakdown(events, start, end),
        hourly: hourly_breakdown(events, start, end),
    };

    UptimeReport {
        period: ReportPeriod { start, end },
        metrics,
        events: in_window,
        sla,
        availability,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, minute / 60, minute % 60, 0)
            .unwrap()
    }

    fn event(status: ServiceStatus, timestamp: DateTime<Utc>, duration_ms: Option<i64>) -> UptimeEvent {
        UptimeEvent {
            id: Uuid::new_v4(),
            status,
            timestamp,
            duration_ms,
            reason: String::new(),
            details: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_empty_log_is_fully_up() {
        let metrics = compute_metrics(&[], at(0), at(60));
        assert_eq!(metrics.uptime_percent, 100.0);
        assert_eq!(metrics.total_downtime_ms, 0);
        assert_eq!(metrics.incidents, 0);
        assert!(metrics.mttr_ms.is_none());
    }

    #[test]
    fn test_single_recovered_outage() {
        // Down 10:00 for 5 minutes, then up
        let events = vec![
            event(ServiceStatus::Down, at(10), Some(5 * 60_000)),
            event(ServiceStatus::Up, at(15), None),
        ];

        let metrics = compute_metrics(&events, at(0), at(60));
        assert_eq!(metrics.total_downtime_ms, 5 * 60_000);
        assert_eq!(metrics.total_uptime_ms, 55 * 60_000);
        assert_eq!(metrics.incidents, 1);
        assert_eq!(metrics.mttr_ms, Some(5.0 * 60_000.0));
        let expected = 55.0 / 60.0 * 100.0;
        assert!((metrics.uptime_percent - expected).abs() < 1e-9);
    }

    #[test]
    fn test_open_outage_extends_to_window_end() {
        let events = vec![event(ServiceStatus::Down, at(50), None)];

        let metrics = compute_metrics(&events, at(0), at(60));
        assert_eq!(metrics.total_downtime_ms, 10 * 60_000);
        assert_eq!(metrics.incidents, 1);
        // No recovery recorded: excluded from the MTTR mean
        assert!(metrics.mttr_ms.is_none());
    }

    #[test]
    fn test_outage_straddling_window_start() {
        // Down at 09:50, recovered 10:10; window starts 10:00
        let events = vec![
            event(ServiceStatus::Down, at(590), Some(20 * 60_000)),
            event(ServiceStatus::Up, at(610), None),
        ];

        let metrics = compute_metrics(&events, at(600), at(660));
        // Only the 10 in-window minutes count as downtime
        assert_eq!(metrics.total_downtime_ms, 10 * 60_000);
        // The down event started before the window: not an in-window incident
        assert_eq!(metrics.incidents, 0);
    }

    #[test]
    fn test_degraded_counts_as_uptime() {
        let events = vec![
            event(ServiceStatus::Degraded, at(10), Some(20 * 60_000)),
            event(ServiceStatus::Up, at(30), None),
        ];

        let metrics = compute_metrics(&events, at(0), at(60));
        assert_eq!(metrics.total_downtime_ms, 0);
        assert_eq!(metrics.uptime_percent, 100.0);
    }

    #[test]
    fn test_stored_duration_caps_effective_span() {
        // Back-filled duration shorter than the gap to the next event:
        // the remainder defaults to up
        let events = vec![
            event(ServiceStatus::Down, at(10), Some(60_000)),
            event(ServiceStatus::Up, at(30), None),
        ];

        let metrics = compute_metrics(&events, at(0), at(60));
        assert_eq!(metrics.total_downtime_ms, 60_000);
    }

    #[test]
    fn test_mtbf_over_multiple_incidents() {
        let events = vec![
            event(ServiceStatus::Down, at(10), Some(60_000)),
            event(ServiceStatus::Up, at(11), None),
            event(ServiceStatus::Down, at(30), Some(60_000)),
            event(ServiceStatus::Up, at(31), None),
            event(ServiceStatus::Down, at(50), Some(60_000)),
            event(ServiceStatus::Up, at(51), None),
        ];

        let metrics = compute_metrics(&events, at(0), at(60));
        assert_eq!(metrics.incidents, 3);
        let expected_uptime = 57 * 60_000;
        assert_eq!(metrics.total_uptime_ms, expected_uptime);
        assert_eq!(metrics.mtbf_ms, expected_uptime as f64 / 2.0);
    }

    #[test]
    fn test_daily_buckets_cover_window() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 6, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 3, 18, 0, 0).unwrap();

        let buckets = daily_breakdown(&[], start, end);
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].period.start, start);
        assert_eq!(buckets[2].period.end, end);

        // Buckets tile the window without gap or overlap
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].period.end, pair[1].period.start);
        }
    }

    #[test]
    fn test_hourly_buckets_trail_24h() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 4, 12, 30, 0).unwrap();

        let buckets = hourly_breakdown(&[], start, end);
        assert_eq!(buckets[0].period.start, end - Duration::hours(24));
        assert_eq!(buckets.last().unwrap().period.end, end);
        // 24h trailing window split on hour marks: 25 partial+full buckets
        assert_eq!(buckets.len(), 25);
    }
}
