//! End-to-end tests: a browser-style form post through the HTTP server, the
//! dispatcher and real provider channels pointed at mock providers.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::app::{spawn_app, spawn_app_with_channels, test_config};
use helpers::mock_channel::MockChannel;
use pagerelay::config::{GarminConfig, PagerDutyConfig};
use pagerelay::core::NotificationChannel;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PD_PATH: &str = "/v2/enqueue";
const GARMIN_PATH: &str = "/IPC/IPCInboundApi/api/Messaging/Message";

fn pagerduty_config(server: &MockServer) -> PagerDutyConfig {
    PagerDutyConfig {
        routing_key: "R0UTING".to_string(),
        endpoint: format!("{}{}", server.uri(), PD_PATH),
        verify_response: true,
        timeout_ms: None,
    }
}

fn garmin_config(server: &MockServer, timeout_ms: Option<u64>) -> GarminConfig {
    GarminConfig {
        api_key: "garmin-key".to_string(),
        imei: "300434000000000".to_string(),
        sender: "pager".to_string(),
        endpoint: format!("{}{}", server.uri(), GARMIN_PATH),
        timeout_ms,
    }
}

#[tokio::test]
async fn test_pagerduty_accepts_page() {
    let pd = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PD_PATH))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "status": "success",
            "message": "Event processed",
            "dedup_key": "abc",
        })))
        .expect(1)
        .mount(&pd)
        .await;

    let mut config = test_config();
    config.pagerduty = Some(pagerduty_config(&pd));
    let app = spawn_app(config).await.unwrap();

    let response = app.post_page("api down, call sam 555-0100").await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "page sent\n");

    // The caller's address is reported as the event source.
    let requests = pd.received_requests().await.unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["payload"]["summary"], "api down, call sam 555-0100");
    assert!(sent["payload"]["source"]
        .as_str()
        .unwrap()
        .starts_with("127.0.0.1:"));

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_pagerduty_rejection_is_returned_to_caller() {
    let pd = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PD_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid routing key"))
        .mount(&pd)
        .await;

    let mut config = test_config();
    config.pagerduty = Some(pagerduty_config(&pd));
    let app = spawn_app(config).await.unwrap();

    let response = app.post_page("api down").await;

    assert_eq!(response.status(), 500);
    assert!(response.text().await.unwrap().contains("invalid routing key"));

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_garmin_zero_count_fails_page() {
    let garmin = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GARMIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 0})))
        .mount(&garmin)
        .await;

    let mut config = test_config();
    config.garmin = Some(garmin_config(&garmin, None));
    let app = spawn_app(config).await.unwrap();

    let response = app.post_page("stuck at camp 2").await;

    assert_eq!(response.status(), 500);
    let body = response.text().await.unwrap();
    assert!(body.contains("expected 1 message, got 0"), "body was: {}", body);

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_satellite_timeout_fails_page_but_pagerduty_still_delivered() {
    let pd = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PD_PATH))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&pd)
        .await;

    let garmin = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GARMIN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"count": 1}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&garmin)
        .await;

    let mut config = test_config();
    config.pagerduty = Some(pagerduty_config(&pd));
    config.garmin = Some(garmin_config(&garmin, Some(300)));
    let app = spawn_app(config).await.unwrap();

    let response = app.post_page("db down").await;

    assert_eq!(response.status(), 500);
    let body = response.text().await.unwrap();
    assert!(body.starts_with("error from garmin"), "body was: {}", body);
    assert_eq!(pd.received_requests().await.unwrap().len(), 1);

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_all_channels_receive_the_page_once() {
    let a = MockChannel::succeeding("a");
    let b = MockChannel::succeeding("b");
    let app = spawn_app_with_channels(test_config(), vec![Arc::new(a.clone()), Arc::new(b.clone())])
        .await
        .unwrap();

    let response = app.post_page("web slow").await;

    assert_eq!(response.status(), 200);
    for channel in [&a, &b] {
        let sent = channel.get_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message, "web slow");
    }

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_one_failing_channel_fails_the_page() {
    let ok = MockChannel::succeeding("ok");
    let bad = MockChannel::failing("bad", "provider exploded");
    let app = spawn_app_with_channels(test_config(), vec![Arc::new(ok.clone()), Arc::new(bad)])
        .await
        .unwrap();

    let response = app.post_page("web slow").await;

    assert_eq!(response.status(), 500);
    assert_eq!(
        response.text().await.unwrap(),
        "error from bad: provider exploded\n"
    );
    assert_eq!(ok.get_sent().len(), 1);

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_whitespace_message_is_rejected_without_sending() {
    let channel = MockChannel::succeeding("ok");
    let app = spawn_app_with_channels(test_config(), vec![Arc::new(channel.clone())])
        .await
        .unwrap();

    let response = app.post_page("   ").await;

    assert_eq!(response.status(), 400);
    assert!(channel.get_sent().is_empty());

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_message_renders_status_page() {
    let channel = MockChannel::succeeding("ok");
    let mut config = test_config();
    config.contact.short_name = Some("Ops".to_string());
    let app = spawn_app_with_channels(config, vec![Arc::new(channel.clone())])
        .await
        .unwrap();

    let response = app.client.get(app.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(response.text().await.unwrap().contains("<h1>Page Ops</h1>"));

    // An empty parameter behaves like a missing one.
    let response = app.post_page("").await;
    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().contains("<form"));

    assert!(channel.get_sent().is_empty());
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_query_string_message_is_dispatched() {
    let channel = MockChannel::succeeding("ok");
    let app = spawn_app_with_channels(test_config(), vec![Arc::new(channel.clone())])
        .await
        .unwrap();

    let response = app
        .client
        .get(app.url("/?m=site%20down"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(channel.get_sent()[0].message, "site down");

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_metrics_route_absent_when_disabled() {
    let app = spawn_app_with_channels(test_config(), vec![Arc::new(MockChannel::succeeding("ok"))])
        .await
        .unwrap();

    let response = app.client.get(app.url("/metrics")).send().await.unwrap();
    assert_eq!(response.status(), 404);

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_post_reads_message_from_query_without_content_type() {
    let channel = MockChannel::succeeding("ok");
    let app = spawn_app_with_channels(test_config(), vec![Arc::new(channel.clone())])
        .await
        .unwrap();

    let response = app
        .client
        .post(app.url("/?m=site%20down"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(channel.get_sent()[0].message, "site down");

    // Without any parameter the status page is shown, not an error.
    let response = app.client.post(app.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().contains("<form"));
    assert_eq!(channel.get_sent().len(), 1);

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_metrics_route_reports_dispatches() {
    let mut config = test_config();
    config.metrics.enabled = true;
    let channels: Vec<Arc<dyn NotificationChannel>> = vec![
        Arc::new(MockChannel::succeeding("ok")),
        Arc::new(MockChannel::panicking("boom")),
    ];
    let app = spawn_app_with_channels(config, channels).await.unwrap();

    let response = app.post_page("disk full").await;
    assert_eq!(response.status(), 500);
    assert!(response.text().await.unwrap().starts_with("error from boom"));

    let response = app.client.get(app.url("/metrics")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let text = response.text().await.unwrap();
    assert!(
        text.contains("pages_dispatched_total"),
        "Metrics output should contain 'pages_dispatched_total'. Got:\n{}",
        text
    );
    // A panicking channel is counted like any other failure.
    assert!(
        text.lines().any(|line| line.starts_with("channel_sends_total{")
            && line.contains(r#"channel="boom""#)
            && line.contains(r#"outcome="internal""#)),
        "Metrics output should count the panicked send. Got:\n{}",
        text
    );
    assert!(text
        .lines()
        .any(|line| line.starts_with("channel_sends_total{") && line.contains(r#"channel="ok""#)));

    app.shutdown().await.unwrap();
}
