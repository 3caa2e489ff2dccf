#![allow(clippy::unwrap_used)]
// Integration tests for `HubClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sunlink_api::{Error, HubClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, HubClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    (server, HubClient::new(base_url))
}

// ── Access token ────────────────────────────────────────────────────

#[tokio::test]
async fn test_acquire_token_success() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/open-api/v2/rest/bridge/access_token"))
        .and(query_param("app_name", "Hubble CloudLink"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "token": "hub-tok" } })),
        )
        .mount(&server)
        .await;

    let token = client.acquire_token().await.unwrap();
    assert_eq!(token, "hub-tok");
}

#[tokio::test]
async fn test_acquire_token_approval_pending() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/open-api/v2/rest/bridge/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": 401 })))
        .mount(&server)
        .await;

    let result = client.acquire_token().await;
    assert!(
        matches!(result, Err(Error::ApprovalPending)),
        "expected ApprovalPending, got: {result:?}"
    );
}

#[tokio::test]
async fn test_acquire_token_missing_token_is_remote_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/open-api/v2/rest/bridge/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .mount(&server)
        .await;

    let result = client.acquire_token().await;
    assert!(matches!(result, Err(Error::Remote { .. })));
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_announce_returns_endpoint_handle() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/open-api/v2/rest/thirdparty/event"))
        .and(body_partial_json(json!({
            "event": {
                "header": { "name": "DiscoveryRequest", "version": "2" },
                "payload": { "endpoints": [{ "third_serial_number": "hubble_cloudlink_device" }] },
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "header": { "name": "Response" },
            "payload": { "endpoints": [{ "serial_number": "sn-1", "third_serial_number": "hubble_cloudlink_device" }] },
        })))
        .mount(&server)
        .await;

    let endpoint = client.announce("hub-tok").await.unwrap();
    assert_eq!(endpoint["serial_number"], "sn-1");
}

#[tokio::test]
async fn test_announce_without_endpoint_is_remote_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/open-api/v2/rest/thirdparty/event"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "header": { "name": "Response" },
            "payload": { "endpoints": [] },
        })))
        .mount(&server)
        .await;

    let result = client.announce("hub-tok").await;
    assert!(matches!(result, Err(Error::Remote { .. })));
}

// ── State reports ───────────────────────────────────────────────────

#[tokio::test]
async fn test_report_state_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/open-api/v2/rest/thirdparty/event"))
        .and(body_partial_json(json!({
            "event": {
                "header": { "name": "DeviceStatesChangeReport" },
                "endpoint": { "serial_number": "sn-1" },
                "payload": { "state": { "battery": { "battery": 83 } } },
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "header": { "name": "Response" },
            "payload": {},
        })))
        .expect(1)
        .mount(&server)
        .await;

    client
        .report_state(
            "hub-tok",
            &json!({ "serial_number": "sn-1" }),
            json!({ "battery": { "battery": 83 } }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_report_state_error_response_envelope() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/open-api/v2/rest/thirdparty/event"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "header": { "name": "ErrorResponse" },
            "payload": { "type": "INVALID_PARAMETERS", "description": "bad state" },
        })))
        .mount(&server)
        .await;

    let result = client
        .report_state("hub-tok", &json!({}), json!({}))
        .await;

    match result {
        Err(Error::Remote { ref message }) => {
            assert!(
                message.contains("INVALID_PARAMETERS") && message.contains("bad state"),
                "expected the remote type and description, got: {message}"
            );
        }
        other => panic!("expected Remote error, got: {other:?}"),
    }
}

// ── UI cards ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ensure_card_skips_creation_when_label_exists() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/open-api/v2/rest/ui/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "card-1", "label": "Hubble CloudLink Usage" }],
        })))
        .expect(1)
        .mount(&server)
        .await;

    // No POST mock mounted: a creation attempt would fail the call.
    Mock::given(method("POST"))
        .and(path("/open-api/v2/rest/ui/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .expect(0)
        .mount(&server)
        .await;

    client
        .ensure_card("hub-tok", "Hubble CloudLink Usage", "http://ihost.local:9009/card.html")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_ensure_card_creates_exactly_one_when_absent() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/open-api/v2/rest/ui/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/open-api/v2/rest/ui/cards"))
        .and(body_partial_json(json!({ "label": "Hubble CloudLink Usage" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "id": "card-1" } })))
        .expect(1)
        .mount(&server)
        .await;

    client
        .ensure_card("hub-tok", "Hubble CloudLink Usage", "http://ihost.local:9009/card.html")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_ensure_card_label_match_is_case_sensitive() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/open-api/v2/rest/ui/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "label": "hubble cloudlink usage" }],
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/open-api/v2/rest/ui/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .expect(1)
        .mount(&server)
        .await;

    client
        .ensure_card("hub-tok", "Hubble CloudLink Usage", "http://ihost.local:9009/card.html")
        .await
        .unwrap();
}
