// sunlink-core: the bridge engine between sunlink-api and the daemon.

pub mod bridge;
pub mod error;
pub mod report;
pub mod state;
pub mod watchdog;

// ── Primary re-exports ──────────────────────────────────────────────
pub use error::CoreError;
pub use state::{BridgeConfig, BridgeState, Status};
pub use watchdog::{Verdict, Watchdog};
