//! Source adapters against a mock HTTP server.
//!
//! Tests verify:
//! - Request shape sent to each provider
//! - Normalization of realistic responses
//! - Transport, status and payload failures become unavailable snapshots

mod common;

use common::start_time;
use portal_metrics::sources::{
    IncidentKind, PageSpeedClient, PerformanceSource, SslStatus, Strategy, UptimeRobotClient,
    UptimeSource, UptimeStatus,
};
use portal_metrics::{ManualClock, MetricsConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> MetricsConfig {
    MetricsConfig {
        uptimerobot_api_key: Some("ur-test-key".to_string()),
        uptimerobot_url: format!("{}/v2/getMonitors", server.uri()),
        pagespeed_url: format!("{}/pagespeedonline/v5/runPagespeed", server.uri()),
        ..MetricsConfig::default()
    }
}

fn uptime_client(config: &MetricsConfig) -> UptimeRobotClient {
    UptimeRobotClient::new(config, Arc::new(ManualClock::new(start_time())))
        .expect("uptime client")
}

// ============================================================================
// UPTIME
// ============================================================================

fn monitor_body() -> serde_json::Value {
    let now = start_time().timestamp();
    json!({
        "stat": "ok",
        "monitors": [{
            "id": 778812,
            "status": 2,
            "custom_uptime_ratio": "100.000-99.950-99.912-99.871",
            "response_times": [
                { "datetime": now - 300, "value": 240 },
                { "datetime": now - 600, "value": 200 }
            ],
            "ssl": {
                "brand": "Let's Encrypt",
                "expires": now + 20 * 86_400
            },
            "logs": [
                { "type": 2, "datetime": now - 3_600, "duration": 86_400 },
                {
                    "type": 1,
                    "datetime": now - 7_200,
                    "duration": 3_725,
                    "reason": { "code": "333333", "detail": "Connection Timeout" }
                }
            ]
        }]
    })
}

#[tokio::test]
async fn test_uptime_fetch_normalizes_monitor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/getMonitors"))
        .and(body_string_contains("monitors=778812"))
        .and(body_string_contains("api_key=ur-test-key"))
        .and(body_string_contains("custom_uptime_ratios=1-7-30-90"))
        .respond_with(ResponseTemplate::new(200).set_body_json(monitor_body()))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = uptime_client(&config_for(&server)).fetch(Some("778812")).await;

    assert!(snapshot.available);
    assert_eq!(snapshot.status, UptimeStatus::Up);
    assert_eq!(snapshot.uptime_1d, 100.0);
    assert_eq!(snapshot.uptime_90d, 99.871);
    assert_eq!(snapshot.response_time_avg, 220);
    let history: Vec<u64> = snapshot.response_time_history.iter().map(|s| s.value).collect();
    assert_eq!(history, vec![200, 240]);

    let ssl = snapshot.ssl.expect("ssl parsed");
    assert_eq!(ssl.issuer, "Let's Encrypt");
    assert_eq!(ssl.days_until_expiry, Some(20));
    assert_eq!(ssl.status, SslStatus::Warning);

    assert_eq!(snapshot.incidents.len(), 2);
    assert_eq!(snapshot.incidents[0].kind, IncidentKind::Up);
    assert_eq!(snapshot.incidents[1].kind, IncidentKind::Down);
    assert_eq!(snapshot.incidents[1].reason.as_deref(), Some("Connection Timeout"));
    assert_eq!(snapshot.incidents[1].duration.as_deref(), Some("1h"));
    assert_eq!(snapshot.last_check, Some(start_time()));
}

#[tokio::test]
async fn test_uptime_server_error_is_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let snapshot = uptime_client(&config_for(&server)).fetch(Some("778812")).await;
    assert!(!snapshot.available);
    assert_eq!(snapshot.status, UptimeStatus::Unknown);
    assert_eq!(snapshot.message.as_deref(), Some("Failed to fetch uptime data"));
}

#[tokio::test]
async fn test_uptime_fail_stat_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stat": "fail",
            "error": { "type": "invalid_parameter", "message": "api_key is invalid." }
        })))
        .mount(&server)
        .await;

    let snapshot = uptime_client(&config_for(&server)).fetch(Some("778812")).await;
    assert!(!snapshot.available);
    assert_eq!(
        snapshot.message.as_deref(),
        Some("Invalid response from UptimeRobot")
    );
}

#[tokio::test]
async fn test_uptime_without_monitor_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(monitor_body()))
        .expect(0)
        .mount(&server)
        .await;

    let client = uptime_client(&config_for(&server));
    for monitor in [None, Some(""), Some("   ")] {
        let snapshot = client.fetch(monitor).await;
        assert!(!snapshot.available);
        assert_eq!(snapshot.message.as_deref(), Some("No monitor configured"));
    }
}

// ============================================================================
// PERFORMANCE
// ============================================================================

fn lighthouse_body() -> serde_json::Value {
    json!({
        "id": "https://bakery.example/",
        "lighthouseResult": {
            "categories": { "performance": { "score": 0.87 } },
            "audits": {
                "first-contentful-paint": { "numericValue": 1234.56 },
                "largest-contentful-paint": { "numericValue": 2500.0 },
                "cumulative-layout-shift": { "numericValue": 0.04567 },
                "total-blocking-time": { "numericValue": 45.0 },
                "speed-index": { "numericValue": 3100.4 }
            }
        }
    })
}

#[tokio::test]
async fn test_performance_fetch_normalizes_report() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pagespeedonline/v5/runPagespeed"))
        .and(query_param("url", "https://bakery.example"))
        .and(query_param("strategy", "mobile"))
        .and(query_param("category", "performance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lighthouse_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = PageSpeedClient::new(&config_for(&server)).expect("performance client");
    let snapshot = client
        .fetch("https://bakery.example", Strategy::Mobile)
        .await;

    assert!(snapshot.available);
    assert_eq!(snapshot.score, 87);
    assert_eq!(snapshot.strategy, Strategy::Mobile);
    assert_eq!(snapshot.metrics.fcp, 1.23);
    assert_eq!(snapshot.metrics.lcp, 2.5);
    assert_eq!(snapshot.metrics.cls, 0.046);
    assert_eq!(snapshot.metrics.tbt, 45.0);
    assert_eq!(snapshot.metrics.si, 3.1);
}

#[tokio::test]
async fn test_performance_server_error_is_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = PageSpeedClient::new(&config_for(&server)).expect("performance client");
    let snapshot = client.fetch("https://bakery.example", Strategy::Mobile).await;
    assert!(!snapshot.available);
    assert_eq!(snapshot.score, 0);
    assert_eq!(
        snapshot.message.as_deref(),
        Some("Failed to fetch performance data")
    );
}

#[tokio::test]
async fn test_performance_missing_lighthouse_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "x" })))
        .mount(&server)
        .await;

    let client = PageSpeedClient::new(&config_for(&server)).expect("performance client");
    let snapshot = client.fetch("https://bakery.example", Strategy::Mobile).await;
    assert!(!snapshot.available);
    assert_eq!(
        snapshot.message.as_deref(),
        Some("Invalid response from PageSpeed API")
    );
}

#[tokio::test]
async fn test_performance_timeout_is_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(lighthouse_body())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let config = MetricsConfig {
        performance_timeout: Duration::from_millis(200),
        ..config_for(&server)
    };
    let client = PageSpeedClient::new(&config).expect("performance client");
    let snapshot = client.fetch("https://bakery.example", Strategy::Mobile).await;
    assert!(!snapshot.available);
    assert_eq!(
        snapshot.message.as_deref(),
        Some("Failed to fetch performance data")
    );
}
