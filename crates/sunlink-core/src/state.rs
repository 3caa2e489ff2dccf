// ── Shared bridge state ──
//
// One monitor may be live at a time. The slot is swapped by the cycle loop
// and force-closed by the login trigger; nothing else touches it, so a
// mutex-guarded Option is the whole synchronization story.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use sunlink_api::monitor::DEFAULT_SOCKET_URL;
use sunlink_api::session::DEFAULT_TELEMETRY_URL;
use sunlink_api::{DeviceMonitor, Session, decode_token};
use sunlink_config::SettingsStore;

use crate::error::CoreError;

// ── BridgeConfig ─────────────────────────────────────────────────────

/// Endpoint addresses of the two remote systems.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Telemetry cloud HTTP base (the login endpoint lives here).
    pub telemetry_url: Url,
    /// Full telemetry socket URL.
    pub telemetry_socket_url: Url,
    /// Hub HTTP base.
    pub hub_url: Url,
}

impl BridgeConfig {
    /// Production telemetry endpoints with the given hub base.
    pub fn production(hub_url: Url) -> Self {
        Self {
            telemetry_url: Url::parse(DEFAULT_TELEMETRY_URL).expect("invalid telemetry URL"),
            telemetry_socket_url: Url::parse(DEFAULT_SOCKET_URL).expect("invalid socket URL"),
            hub_url,
        }
    }
}

// ── BridgeState ──────────────────────────────────────────────────────

/// State shared between the cycle loop and the HTTP front door.
pub struct BridgeState {
    pub config: BridgeConfig,
    settings: Mutex<SettingsStore>,
    monitor: Mutex<Option<DeviceMonitor>>,
}

impl BridgeState {
    pub fn new(config: BridgeConfig, settings: SettingsStore) -> Self {
        Self {
            config,
            settings: Mutex::new(settings),
            monitor: Mutex::new(None),
        }
    }

    /// The persisted credentials, or [`CoreError::NotLoggedIn`] when any of
    /// the three fields is missing.
    pub fn credentials(&self) -> Result<(String, SecretString, String), CoreError> {
        let store = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        let settings = store.settings();
        if !settings.is_complete() {
            return Err(CoreError::NotLoggedIn);
        }
        let email = settings.email.clone().ok_or(CoreError::NotLoggedIn)?;
        let password = settings.password.clone().ok_or(CoreError::NotLoggedIn)?;
        let hub_token = settings.hub_token.clone().ok_or(CoreError::NotLoggedIn)?;
        Ok((email, SecretString::from(password), hub_token))
    }

    /// Persist a fresh login. Each field rewrites the whole document.
    pub fn store_login(
        &self,
        email: &str,
        password: &SecretString,
        hub_token: &str,
    ) -> Result<(), CoreError> {
        use secrecy::ExposeSecret;

        let mut store = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        store.set_email(email.to_owned())?;
        store.set_password(password.expose_secret().to_owned())?;
        store.set_hub_token(hub_token.to_owned())?;
        Ok(())
    }

    /// Install the next monitor, closing the previous one first. Exactly
    /// one connection is live at any time.
    pub fn swap_monitor(&self, next: DeviceMonitor) {
        let mut slot = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.replace(next) {
            previous.force_close();
        }
    }

    /// Force-close the live connection, if any. The closed monitor stays in
    /// the slot so the status surface keeps its last snapshot until the
    /// next cycle replaces it.
    pub fn close_monitor(&self) {
        let slot = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(monitor) = slot.as_ref() {
            monitor.force_close();
        }
    }

    /// Current bridged status. Never touches the network.
    pub fn status(&self) -> Status {
        let hub_url = self
            .config
            .hub_url
            .as_str()
            .trim_end_matches('/')
            .to_owned();

        let logged_in = {
            let store = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
            store.settings().is_complete()
        };
        if !logged_in {
            return Status {
                logged_in: false,
                ihost_url: hub_url,
                user: None,
                keys: None,
                keys_last_updated_at: None,
            };
        }

        let slot = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        let (user, keys, keys_last_updated_at) = match slot.as_ref() {
            Some(monitor) => (
                decode_token(monitor.access_token())
                    .ok()
                    .map(|session| session.redacted()),
                monitor.snapshot(),
                monitor.last_updated_at(),
            ),
            None => (None, HashMap::new(), 0),
        };

        Status {
            logged_in: true,
            ihost_url: hub_url,
            user,
            keys: Some(keys),
            keys_last_updated_at: Some(keys_last_updated_at),
        }
    }
}

// ── Status ───────────────────────────────────────────────────────────

/// Response body of the status endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub logged_in: bool,
    #[serde(rename = "ihostURL")]
    pub ihost_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Session>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys_last_updated_at: Option<i64>,
}

// ── Tests ────────────────────────────────────────────────────────────
