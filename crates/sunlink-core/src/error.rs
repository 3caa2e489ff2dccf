// ── Core error types ──
//
// Cycle-level outcomes the orchestrator logs and retries on. Client-level
// failures pass through unchanged; the two variants added here exist only
// at the engine level.

use thiserror::Error;

/// Unified error type for the bridge engine.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No persisted credentials or hub token yet; cycles cannot start.
    #[error("not logged in")]
    NotLoggedIn,

    /// The watchdog closed a connection that stopped receiving updates.
    /// Not a hard failure -- the next cycle rebuilds everything.
    #[error("telemetry connection went stale, forcing reconnect")]
    StaleConnection,

    /// A remote-surface failure (telemetry cloud or hub).
    #[error(transparent)]
    Api(#[from] sunlink_api::Error),

    /// The settings document could not be read or written.
    #[error("settings error: {0}")]
    Config(#[from] sunlink_config::ConfigError),
}
