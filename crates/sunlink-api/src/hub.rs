// Smart-home hub HTTP client
//
// Bearer-authenticated JSON endpoints on the local hub: bridge access
// tokens, third-party device events (discovery + state reports), and UI
// card management. Every call is a single request/response; the error
// envelope convention is shared across endpoints.

use reqwest::Method;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::error::Error;

/// Default hub base URL.
pub const DEFAULT_HUB_URL: &str = "http://ihost.local";

/// Environment variable overriding the hub base URL.
pub const HUB_URL_ENV: &str = "IHOST_URL";

const ACCESS_TOKEN_PATH: &str = "/open-api/v2/rest/bridge/access_token?app_name=Hubble+CloudLink";
const EVENT_PATH: &str = "/open-api/v2/rest/thirdparty/event";
const CARDS_PATH: &str = "/open-api/v2/rest/ui/cards";

/// Stable third-party serial number of the bridged virtual device.
pub const DEVICE_SERIAL: &str = "hubble_cloudlink_device";

/// Label of the hub UI card; the card upsert is keyed by this exact string.
pub const CARD_LABEL: &str = "Hubble CloudLink Usage";

/// URL the hub card loads, served from the bridge's own static surface.
pub const CARD_URL: &str = "http://ihost.local:9009/card.html";

/// Address the hub uses to reach the bridge's service endpoint.
const SERVICE_ADDRESS: &str = "http://localhost:9009/api/ihost-service";

// ── HubClient ────────────────────────────────────────────────────────

/// HTTP client for the local hub's open API.
pub struct HubClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HubClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Exchange the fixed app identity for a bridge bearer token.
    pub async fn acquire_token(&self) -> Result<String, Error> {
        let json = self
            .send_request(Method::GET, ACCESS_TOKEN_PATH, None, None)
            .await?;
        json.pointer("/data/token")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| Error::Remote {
                message: "hub did not return an access token".into(),
            })
    }

    /// Announce the virtual device.
    ///
    /// Idempotent upsert keyed by the device's third-party serial number;
    /// safe to call every cycle. Returns the endpoint handle required on
    /// subsequent state reports.
    pub async fn announce(&self, token: &str) -> Result<Value, Error> {
        let event = json!({
            "header": event_header("DiscoveryRequest"),
            "payload": { "endpoints": [device_descriptor()] },
        });
        let json = self.send_event(token, event).await?;
        json.pointer("/payload/endpoints/0")
            .cloned()
            .ok_or_else(|| Error::Remote {
                message: "discovery acknowledgement carried no endpoint".into(),
            })
    }

    /// Push a state-change report for an announced endpoint.
    pub async fn report_state(
        &self,
        token: &str,
        endpoint: &Value,
        state: Value,
    ) -> Result<(), Error> {
        let event = json!({
            "header": event_header("DeviceStatesChangeReport"),
            "endpoint": endpoint,
            "payload": { "state": state },
        });
        self.send_event(token, event).await?;
        Ok(())
    }

    /// Create the UI card if it does not exist yet.
    ///
    /// Existence is checked by exact label match (case-sensitive); nothing
    /// stronger keys the upsert, so relabeling the card externally defeats
    /// the check.
    pub async fn ensure_card(&self, token: &str, label: &str, card_url: &str) -> Result<(), Error> {
        let cards = self
            .send_request(Method::GET, CARDS_PATH, None, Some(token))
            .await?;

        let exists = cards
            .pointer("/data")
            .and_then(Value::as_array)
            .is_some_and(|list| {
                list.iter()
                    .any(|card| card.get("label").and_then(Value::as_str) == Some(label))
            });
        if exists {
            debug!(label, "hub card already present");
            return Ok(());
        }

        debug!(label, "creating hub card");
        let body = json!({
            "label": label,
            "cast_settings": {
                "default": "2×2",
                "dimensions": [
                    { "src": card_url, "size": "2×2" },
                ],
            },
            "web_settings": {
                "default": "1×1",
                "drawer_component": { "src": card_url },
                "dimensions": [
                    { "src": card_url, "size": "1×1" },
                    { "src": card_url, "size": "2×1" },
                ],
            },
        });
        self.send_request(Method::POST, CARDS_PATH, Some(&body), Some(token))
            .await?;
        Ok(())
    }

    // ── Request plumbing ─────────────────────────────────────────────

    /// Send an event envelope and check for an `ErrorResponse` header.
    async fn send_event(&self, token: &str, event: Value) -> Result<Value, Error> {
        let json = self
            .send_request(
                Method::POST,
                EVENT_PATH,
                Some(&json!({ "event": event })),
                Some(token),
            )
            .await?;

        if json.pointer("/header/name").and_then(Value::as_str) == Some("ErrorResponse") {
            let kind = json
                .pointer("/payload/type")
                .and_then(Value::as_str)
                .unwrap_or("UNKNOWN");
            let description = json
                .pointer("/payload/description")
                .and_then(Value::as_str)
                .unwrap_or("");
            return Err(Error::Remote {
                message: format!("hub event rejected: type={kind} description={description}"),
            });
        }

        Ok(json)
    }

    async fn send_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Value, Error> {
        let url = self.base_url.join(path).map_err(Error::InvalidUrl)?;
        debug!(%method, %url, "hub request");

        let mut request = self.http.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request.send().await.map_err(Error::Transport)?;
        let body_text = resp.text().await.map_err(Error::Transport)?;
        let json: Value =
            serde_json::from_str(&body_text).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body_text,
            })?;

        check_error_envelope(&json)?;
        Ok(json)
    }
}

// ── Envelope + payload helpers ───────────────────────────────────────

/// Envelope convention shared by every hub endpoint: a numeric `error` of
/// 401 means the bridge is still awaiting manual approval; any other truthy
/// `error` is a hard failure.
fn check_error_envelope(json: &Value) -> Result<(), Error> {
    let Some(err) = json.get("error") else {
        return Ok(());
    };
    if err.as_i64() == Some(401) {
        return Err(Error::ApprovalPending);
    }

    let truthy = match err {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    };
    if truthy {
        let message = json
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| err.to_string());
        return Err(Error::Remote { message });
    }
    Ok(())
}

fn event_header(name: &str) -> Value {
    json!({
        "name": name,
        "message_id": Uuid::new_v4().to_string(),
        "version": "2",
    })
}

/// Descriptor announced on discovery: stable serial, static capability
/// declarations, placeholder initial state.
fn device_descriptor() -> Value {
    json!({
        "third_serial_number": DEVICE_SERIAL,
        "name": "Hubble CloudLink",
        "manufacturer": "Hubble",
        "model": "CloudLink",
        "firmware_version": env!("CARGO_PKG_VERSION"),
        "service_address": SERVICE_ADDRESS,
        "display_category": "plug",
        "tags": {},
        "state": {
            "battery": { "battery": -1 },
            "electric-power": { "electric-power": 0 },
        },
        "capabilities": [
            { "capability": "battery", "permission": "0110" },
            { "capability": "electric-power", "permission": "0110" },
        ],
    })
}
