// HTTP request handlers for the bridge front door.
//
// Two inbound triggers: submit credentials (persists them and forces a
// reconnect) and query current status (never touches the network). Every
// thrown failure becomes a 500 with an `{error}` body.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use sunlink_api::{HubClient, TelemetryAuth};
use sunlink_core::state::{BridgeState, Status};

// ── Error envelope ──────────────────────────────────────────────────

/// Error response returned by every failing handler.
pub struct ApiError {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(message = %self.message, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl<E: std::error::Error> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// POST /api/login -- persist credentials and force a fresh bridge cycle.
pub async fn login(
    State(state): State<Arc<BridgeState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.email.is_empty() || request.password.is_empty() {
        return Err(ApiError {
            message: "Invalid email or password".into(),
        });
    }

    // Hub first: a pending approval should surface before anything is
    // persisted.
    let hub = HubClient::new(state.config.hub_url.clone());
    let hub_token = hub.acquire_token().await?;

    // Validate the telemetry credentials with one login.
    let auth = TelemetryAuth::new(state.config.telemetry_url.clone());
    let password = SecretString::from(request.password);
    auth.authenticate(&request.email, &password).await?;

    state.store_login(&request.email, &password, &hub_token)?;

    // Close the live connection so the next cycle starts from the new
    // credentials immediately.
    info!("login accepted, forcing reconnect");
    state.close_monitor();

    Ok(Json(json!({ "ok": true })))
}

/// POST /api/status -- current bridged status.
pub async fn status(State(state): State<Arc<BridgeState>>) -> Json<Status> {
    Json(state.status())
}
