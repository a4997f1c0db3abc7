//! Alert dispatch:
//! - webhook and email wire formats against a local mock server
//! - a failing channel never suppresses the others
//! - critical notices carry a working resolve capability

use chrono::{TimeZone, Utc};
use serde_json::json;
use sitepulse::alerts::channels::MockNotificationSink;
use sitepulse::{
    AlertDispatcher, AlertFilter, AlertResolver, AlertRule, AlertRuleEngine, ChannelKind,
    Comparator, ManualClock, MonitorConfig, NewAlert, Severity,
};
use smallvec::smallvec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::starting_at(
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
    ))
}

fn engine_with_config(config: MonitorConfig) -> (Arc<AlertRuleEngine>, Arc<AlertDispatcher>) {
    let clock = clock();
    let config = Arc::new(RwLock::new(config));
    let dispatcher = Arc::new(AlertDispatcher::new(config.clone(), clock.clone()));
    let engine = Arc::new(AlertRuleEngine::new(config, dispatcher.clone(), clock));
    (engine, dispatcher)
}

#[tokio::test]
async fn test_webhook_posts_alert_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/alerts"))
        .and(body_partial_json(json!({ "appId": "sitepulse" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = MonitorConfig {
        webhook_url: Some(format!("{}/hooks/alerts", server.uri())),
        ..MonitorConfig::default()
    };
    let (_engine, dispatcher) = engine_with_config(config);

    let alert = sitepulse::Alert::new(
        "metric-threshold",
        Severity::Critical,
        "Slow page loads",
        "lcp > 4000 (observed 5200)",
        "rule:test",
        serde_json::Value::Null,
        smallvec![ChannelKind::Webhook],
        Utc::now(),
    );
    dispatcher.send(&alert).await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(body["alert"]["title"], "Slow page loads");
    assert_eq!(body["alert"]["severity"], "critical");
    // ISO-8601 timestamp alongside the alert
    assert!(body["timestamp"].as_str().unwrap().contains('T'));
}

#[tokio::test]
async fn test_email_subject_carries_severity_tag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "to": "oncall@example.com",
            "subject": "[EMERGENCY] Service down",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = MonitorConfig {
        email_endpoint: Some(server.uri()),
        email_to: "oncall@example.com".to_string(),
        ..MonitorConfig::default()
    };
    let (_engine, dispatcher) = engine_with_config(config);

    let alert = sitepulse::Alert::new(
        "status",
        Severity::Emergency,
        "Service down",
        "service has been down for 180s",
        "status-monitor",
        serde_json::Value::Null,
        smallvec![ChannelKind::Email],
        Utc::now(),
    );
    dispatcher.send(&alert).await;
}

#[tokio::test]
async fn test_failing_webhook_does_not_block_local_log() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = MonitorConfig {
        webhook_url: Some(server.uri()),
        ..MonitorConfig::default()
    };
    let (_engine, dispatcher) = engine_with_config(config);

    let alert = sitepulse::Alert::new(
        "metric-threshold",
        Severity::Warning,
        "Slow API responses",
        "api_latency > 2000 (observed 2400)",
        "rule:test",
        serde_json::Value::Null,
        smallvec![ChannelKind::Webhook, ChannelKind::LocalLog],
        Utc::now(),
    );
    dispatcher.send(&alert).await;

    // The webhook failed; the local record is untouched by it
    let logged = dispatcher.local_log().all().await;
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].id, alert.id);
}

#[tokio::test]
async fn test_critical_notice_resolves_through_handle() {
    let (engine, dispatcher) = engine_with_config(MonitorConfig::default());
    let resolver: Arc<dyn AlertResolver> = engine.clone();
    dispatcher.set_resolver(Arc::downgrade(&resolver)).await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut sink = MockNotificationSink::new();
    sink.expect_show_notice().returning(move |notice| {
        tx.send(notice).ok();
        Ok(())
    });
    dispatcher.set_notification_sink(Arc::new(sink)).await;

    engine
        .add_rule(
            AlertRule::new("Slow page loads", "lcp", Comparator::GreaterThan, 4000.0)
                .with_severity(Severity::Critical)
                .with_channels([ChannelKind::Notice]),
        )
        .await;
    let alert = engine.check_metric("lcp", 5200.0).await.remove(0);

    // Dispatch is fire-and-forget relative to check_metric; wait for the sink
    let notice = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("notice delivered")
        .expect("channel open");

    assert_eq!(notice.alert_id, alert.id);
    let handle = notice.resolve.expect("critical notice carries resolve");
    assert!(handle.resolve().await);

    let stored = engine.get_alerts(&AlertFilter::default()).await;
    assert!(stored[0].resolved);
    assert_eq!(stored[0].resolved_by.as_deref(), Some("notice-action"));
}

#[tokio::test]
async fn test_info_alert_creates_plain_notice() {
    let (engine, dispatcher) = engine_with_config(MonitorConfig::default());

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut sink = MockNotificationSink::new();
    sink.expect_show_notice().returning(move |notice| {
        tx.send(notice).ok();
        Ok(())
    });
    dispatcher.set_notification_sink(Arc::new(sink)).await;

    engine
        .create_alert(NewAlert {
            alert_type: "info".to_string(),
            severity: Severity::Info,
            title: "deploy finished".to_string(),
            message: "v1.2.3".to_string(),
            source: "ci".to_string(),
            data: serde_json::Value::Null,
            channels: smallvec![ChannelKind::Notice],
        })
        .await;

    let notice = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("notice delivered")
        .expect("channel open");

    // Time-bounded, no interaction requirement, no resolve action
    assert!(notice.duration.is_some());
    assert!(!notice.require_interaction);
    assert!(notice.resolve.is_none());
}
