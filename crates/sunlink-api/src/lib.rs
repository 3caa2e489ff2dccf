// sunlink-api: async clients for the solar telemetry cloud and the local hub

pub mod error;
pub mod hub;
pub mod monitor;
pub mod protocol;
pub mod session;

pub use error::Error;
pub use hub::HubClient;
pub use monitor::DeviceMonitor;
pub use session::{Session, TelemetryAuth, decode_token};
