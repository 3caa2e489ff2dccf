// ── Bridge orchestrator ──
//
// One repeating cycle drives the whole system: authenticate against the
// telemetry cloud, open a fresh monitor, announce the device downstream,
// then relay snapshot changes until the connection closes or goes stale.
// Every failure ends the cycle; the only retry policy is an unconditional
// fixed delay before the next attempt.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sunlink_api::{DeviceMonitor, HubClient, TelemetryAuth, hub};

use crate::error::CoreError;
use crate::report;
use crate::state::BridgeState;
use crate::watchdog::{POLL_INTERVAL, Verdict, Watchdog};

/// Delay between bridge cycles, successful or not.
pub const CYCLE_DELAY: Duration = Duration::from_secs(5);

/// Run bridge cycles until cancelled.
pub async fn run(state: Arc<BridgeState>, cancel: CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        debug!("starting bridge cycle");
        match run_cycle(&state).await {
            Ok(()) => debug!("bridge cycle ended"),
            Err(CoreError::NotLoggedIn) => debug!("no credentials yet, waiting for login"),
            Err(e) => warn!(error = %e, "bridge cycle failed"),
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(CYCLE_DELAY) => {}
        }
    }

    debug!("bridge loop exiting");
}

/// One end-to-end cycle: session, monitor, discovery, card, relay loop.
async fn run_cycle(state: &Arc<BridgeState>) -> Result<(), CoreError> {
    let (email, password, hub_token) = state.credentials()?;

    // Fresh telemetry session every cycle; the token is never refreshed.
    let auth = TelemetryAuth::new(state.config.telemetry_url.clone());
    let session = auth.authenticate(&email, &password).await?;

    // Exactly one live connection: swapping in the replacement closes the
    // previous socket first.
    let monitor = DeviceMonitor::connect(
        state.config.telemetry_socket_url.clone(),
        session.access_token,
    );
    state.swap_monitor(monitor.clone());

    let hub_client = HubClient::new(state.config.hub_url.clone());
    info!("announcing device to hub");
    let endpoint = hub_client.announce(&hub_token).await?;
    hub_client
        .ensure_card(&hub_token, hub::CARD_LABEL, hub::CARD_URL)
        .await?;

    relay_changes(&hub_client, &hub_token, &endpoint, &monitor).await
}

/// Relay snapshot changes downstream until the connection ends.
///
/// The watch channel guarantees the ordering contract: every revision the
/// loop acts on is the newest one, no revision is reported twice, and no
/// change goes unobserved. The poll timeout only exists to give the
/// watchdog its fixed cadence.
async fn relay_changes(
    hub_client: &HubClient,
    hub_token: &str,
    endpoint: &Value,
    monitor: &DeviceMonitor,
) -> Result<(), CoreError> {
    let watchdog = Watchdog::default();
    let mut updates = monitor.subscribe();
    let mut last_seen: i64 = 0;

    loop {
        if monitor.is_closed() {
            info!("telemetry connection closed, restarting cycle");
            return Ok(());
        }

        let revision = monitor.last_updated_at();
        if revision > 0 && revision != last_seen {
            last_seen = revision;
            let payload = report::state_payload(&monitor.snapshot());
            debug!(revision, "pushing state report");
            hub_client.report_state(hub_token, endpoint, payload).await?;
            continue;
        }

        match tokio::time::timeout(POLL_INTERVAL, updates.changed()).await {
            // New revision; picked up at the top of the loop.
            Ok(Ok(())) => {}
            // The monitor task is gone.
            Ok(Err(_)) => return Ok(()),
            Err(_) => {
                let verdict = watchdog.assess(
                    monitor.last_updated_at(),
                    last_seen,
                    Utc::now().timestamp_millis(),
                    monitor.is_closed(),
                );
                match verdict {
                    Verdict::Continue => {}
                    Verdict::Closed => return Ok(()),
                    Verdict::Stale => {
                        warn!("no snapshot updates within the staleness window");
                        monitor.force_close();
                        return Err(CoreError::StaleConnection);
                    }
                }
            }
        }
    }
}
