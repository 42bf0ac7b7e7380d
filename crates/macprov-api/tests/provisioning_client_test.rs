#![allow(clippy::unwrap_used)]
// Integration tests for `ProvisioningClient` using wiremock.

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use macprov_api::{
    ClientConfig, ClientConfigPatch, ErrorCategory, LogEntry, LogLevel, LogSink,
    ProvisionRequest, ProvisioningClient,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ProvisioningClient) {
    let server = MockServer::start().await;
    let client = client_for(&server, Duration::from_secs(5));
    (server, client)
}

fn client_for(server: &MockServer, timeout: Duration) -> ProvisioningClient {
    let base_url = Url::parse(&format!("{}/api/ldap", server.uri())).unwrap();
    ProvisioningClient::with_client(
        reqwest::Client::new(),
        ClientConfig {
            base_url,
            stub_mode: false,
            stub_delay: Duration::ZERO,
            timeout,
        },
    )
}

fn request(mac: &str) -> ProvisionRequest {
    ProvisionRequest {
        mac: mac.into(),
        account: "100234".into(),
        configfile: "cm-100mbps.cfg".into(),
        isp: "metro".into(),
    }
}

const LOOKUP_PATH: &str = "/api/ldap/searchbymac/A1%3AB2%3AC3%3A00%3A00%3A01";

// ── Status lookup ───────────────────────────────────────────────────

#[tokio::test]
async fn test_search_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(LOOKUP_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "mac": "A1:B2:C3:00:00:01",
            "account": "998877",
            "configfile": "cm-50mbps.cfg",
            "isp": "rural"
        }])))
        .mount(&server)
        .await;

    let records = client.search_by_mac("A1:B2:C3:00:00:01").await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].account, "998877");
    assert_eq!(records[0].configfile, "cm-50mbps.cfg");
}

#[tokio::test]
async fn test_search_not_found_is_empty() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(LOOKUP_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let records = client.search_by_mac("A1:B2:C3:00:00:01").await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_search_server_error_is_classified() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(LOOKUP_PATH))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "detail": "LDAP bind failed" })),
        )
        .mount(&server)
        .await;

    let err = client.search_by_mac("A1:B2:C3:00:00:01").await.unwrap_err();

    assert_eq!(err.category, ErrorCategory::Server);
    assert!(err.is_retryable);
    assert_eq!(err.technical_detail.as_deref(), Some("LDAP bind failed"));
}

#[tokio::test]
async fn test_search_forbidden_is_auth() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(LOOKUP_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("nope"))
        .mount(&server)
        .await;

    let err = client.search_by_mac("A1:B2:C3:00:00:01").await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::Auth);
    assert!(!err.is_retryable);
    assert_eq!(err.technical_detail.as_deref(), Some("HTTP 403: Forbidden"));
}

#[tokio::test]
async fn test_search_deadline_is_timeout() {
    let server = MockServer::start().await;
    let client = client_for(&server, Duration::from_millis(100));

    Mock::given(method("GET"))
        .and(path(LOOKUP_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client.search_by_mac("A1:B2:C3:00:00:01").await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::Timeout);
    assert!(err.is_retryable);
}

#[tokio::test]
async fn test_search_unreachable_is_network() {
    let client = ProvisioningClient::with_client(
        reqwest::Client::new(),
        ClientConfig {
            base_url: Url::parse("http://127.0.0.1:9/api/ldap").unwrap(),
            stub_mode: false,
            stub_delay: Duration::ZERO,
            timeout: Duration::from_secs(2),
        },
    );

    let err = client.search_by_mac("A1:B2:C3:00:00:01").await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::Network);
}

#[tokio::test]
async fn test_search_garbage_body_is_server() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(LOOKUP_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client.search_by_mac("A1:B2:C3:00:00:01").await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::Server);
}

// ── Provisioning ────────────────────────────────────────────────────

#[tokio::test]
async fn test_add_hsd_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/ldap/addhsd"))
        .and(body_json(json!({
            "mac": "A1:B2:C3:00:00:01",
            "account": "100234",
            "configfile": "cm-100mbps.cfg",
            "isp": "metro"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client.add_hsd(&request("A1:B2:C3:00:00:01")).await;
    assert!(outcome.is_success());
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn test_add_hsd_bad_request_is_validation_outcome() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/ldap/addhsd"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "unknown configfile" })),
        )
        .mount(&server)
        .await;

    let outcome = client.add_hsd(&request("A1:B2:C3:00:00:01")).await;
    assert!(!outcome.success);
    let err = outcome.error.unwrap();
    assert_eq!(err.category, ErrorCategory::Validation);
    assert_eq!(err.technical_detail.as_deref(), Some("unknown configfile"));
}

#[tokio::test]
async fn test_add_hsd_other_client_errors_are_validation() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/ldap/addhsd"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "detail": "duplicate" })))
        .mount(&server)
        .await;

    let outcome = client.add_hsd(&request("A1:B2:C3:00:00:01")).await;
    assert_eq!(outcome.error.unwrap().category, ErrorCategory::Validation);
}

#[tokio::test]
async fn test_add_hsd_unauthorized_stays_auth() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/ldap/addhsd"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let outcome = client.add_hsd(&request("A1:B2:C3:00:00:01")).await;
    assert_eq!(outcome.error.unwrap().category, ErrorCategory::Auth);
}

#[tokio::test]
async fn test_add_hsd_server_error_outcome() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/ldap/addhsd"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let outcome = client.add_hsd(&request("A1:B2:C3:00:00:01")).await;
    let err = outcome.error.unwrap();
    assert_eq!(err.category, ErrorCategory::Server);
    assert!(err.is_retryable);
}

#[tokio::test]
async fn test_add_hsd_false_body_is_failure() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/ldap/addhsd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(false)))
        .mount(&server)
        .await;

    let outcome = client.add_hsd(&request("A1:B2:C3:00:00:01")).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.unwrap().category, ErrorCategory::Unknown);
}

#[tokio::test]
async fn test_add_hsd_timeout_is_returned_not_raised() {
    let server = MockServer::start().await;
    let client = client_for(&server, Duration::from_millis(100));

    Mock::given(method("POST"))
        .and(path("/api/ldap/addhsd"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!(true))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let outcome = client.add_hsd(&request("A1:B2:C3:00:00:01")).await;
    assert_eq!(outcome.error.unwrap().category, ErrorCategory::Timeout);
}

// ── Configuration snapshots ─────────────────────────────────────────

#[tokio::test]
async fn test_in_flight_request_keeps_its_snapshot() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(LOOKUP_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let in_flight = {
        let client = client.clone();
        tokio::spawn(async move { client.search_by_mac("A1:B2:C3:00:00:01").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Point new requests somewhere unreachable while the first is pending.
    client.configure(&ClientConfigPatch {
        base_url: Some(Url::parse("http://127.0.0.1:9/api/ldap").unwrap()),
        ..ClientConfigPatch::default()
    });

    let records = in_flight.await.unwrap().unwrap();
    assert!(records.is_empty());

    let err = client.search_by_mac("A1:B2:C3:00:00:01").await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::Network);
}

#[tokio::test]
async fn test_switching_to_stub_mode_skips_network() {
    let (server, client) = setup().await;

    client.configure(&ClientConfigPatch {
        stub_mode: Some(true),
        stub_delay: Some(Duration::ZERO),
        ..ClientConfigPatch::default()
    });

    let records = client.search_by_mac("00:00:00:00:00:03").await.unwrap();
    assert_eq!(records.len(), 1);

    let err = client.search_by_mac("00:00:00:00:00:07").await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::Server);

    let outcome = client.add_hsd(&request("00:00:00:00:00:0B")).await;
    assert_eq!(outcome.error.unwrap().category, ErrorCategory::Server);

    assert!(server.received_requests().await.unwrap().is_empty());
}

// ── Log sink ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_log_sink_posts_entry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/log"))
        .and(body_json(json!({ "level": "info", "message": "provisioned", "data": { "count": 4 } })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let base = Url::parse(&format!("{}/api/ldap", server.uri())).unwrap();
    let sink = LogSink::for_origin(reqwest::Client::new(), &base).unwrap();
    sink.deliver(&LogEntry::new(LogLevel::Info, "provisioned").with_data(json!({ "count": 4 })))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_log_sink_swallows_failures() {
    let base = Url::parse("http://127.0.0.1:9/").unwrap();
    let sink = LogSink::for_origin(reqwest::Client::new(), &base).unwrap();
    sink.emit(LogEntry::new(LogLevel::Error, "nobody is listening"));
    tokio::time::sleep(Duration::from_millis(50)).await;
}
