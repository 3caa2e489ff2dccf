use thiserror::Error;

/// Top-level error type for the `sunlink-api` crate.
///
/// Covers both remote surfaces: the telemetry cloud (login + socket) and
/// the hub's HTTP API. `sunlink-core` maps these into cycle-level outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The telemetry cloud yielded no usable token. The remote does not
    /// distinguish wrong credentials from outages or malformed responses,
    /// so neither do we.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The hub issued a token request but the user has not approved the
    /// bridge in the hub dashboard yet.
    #[error("Hub authorization pending -- approve the request in the hub dashboard and try again")]
    ApprovalPending,

    // ── Telemetry socket ────────────────────────────────────────────
    /// Malformed or unexpected frame on the socket. Always fatal for the
    /// connection that produced it.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// WebSocket connection failed or dropped with a transport error.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Hub API ─────────────────────────────────────────────────────
    /// The hub rejected a call (error envelope or `ErrorResponse` header).
    #[error("Hub error: {message}")]
    Remote { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error requires manual user action on the hub
    /// rather than a retry.
    pub fn is_approval_pending(&self) -> bool {
        matches!(self, Self::ApprovalPending)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }
}
