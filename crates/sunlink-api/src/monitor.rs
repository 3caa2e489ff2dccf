//! Persistent device monitor over the telemetry socket.
//!
//! Owns a single WebSocket session: authenticates, discovers the device
//! identifier, subscribes to attribute updates, and maintains a merged
//! snapshot of the latest values. Snapshot revisions are published through
//! a [`tokio::sync::watch`] channel.
//!
//! The monitor never reconnects on its own -- malformed frames and
//! transport errors both terminate the connection, and restart policy
//! belongs to the caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Error;
use crate::protocol::{self, InboundFrame};

/// Production telemetry socket URL.
pub const DEFAULT_SOCKET_URL: &str = "wss://portal.riotsystems.cloud/api/ws";

// ── DeviceMonitor ────────────────────────────────────────────────────

/// Handle to a running telemetry socket session.
///
/// Cheaply cloneable; every clone observes the same snapshot and shares the
/// same cancellation token, so [`force_close`](Self::force_close) on any
/// clone tears down the connection.
#[derive(Clone)]
pub struct DeviceMonitor {
    shared: Arc<MonitorShared>,
    cancel: CancellationToken,
    access_token: String,
}

struct MonitorShared {
    keys: Mutex<HashMap<String, Value>>,
    device_id: Mutex<Option<String>>,
    /// Epoch millis of the last merge that changed at least one value;
    /// 0 until the first change. Doubles as the snapshot revision.
    last_updated: watch::Sender<i64>,
    closed: AtomicBool,
}

impl DeviceMonitor {
    /// Open the socket and spawn the session task.
    ///
    /// Returns immediately; the connection proceeds in the background and
    /// any failure closes the monitor. `ws_url` is the full socket URL.
    pub fn connect(ws_url: Url, access_token: String) -> Self {
        let (last_updated, _) = watch::channel(0i64);
        let shared = Arc::new(MonitorShared {
            keys: Mutex::new(HashMap::new()),
            device_id: Mutex::new(None),
            last_updated,
            closed: AtomicBool::new(false),
        });
        let cancel = CancellationToken::new();

        let task_shared = Arc::clone(&shared);
        let task_cancel = cancel.clone();
        let token = access_token.clone();
        tokio::spawn(async move {
            match run_session(ws_url, token, &task_shared, &task_cancel).await {
                Ok(()) => info!("telemetry socket closed"),
                Err(e) => warn!(error = %e, "telemetry socket terminated"),
            }
            task_shared.closed.store(true, Ordering::SeqCst);
        });

        Self {
            shared,
            cancel,
            access_token,
        }
    }

    /// The bearer token this session was opened with.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Whether the transport is closed. Side-effect free.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Tear down the connection. The only cancellation primitive: in-flight
    /// work is not interrupted, its results are simply discarded.
    pub fn force_close(&self) {
        self.cancel.cancel();
    }

    /// Epoch millis of the last value-changing merge; 0 before the first.
    pub fn last_updated_at(&self) -> i64 {
        *self.shared.last_updated.borrow()
    }

    /// Receiver for snapshot revision changes.
    pub fn subscribe(&self) -> watch::Receiver<i64> {
        self.shared.last_updated.subscribe()
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.shared
            .keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The resolved device identifier, once discovery has answered.
    pub fn device_id(&self) -> Option<String> {
        self.shared
            .device_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// ── Session task ─────────────────────────────────────────────────────

/// Connect, authenticate, and process frames until the connection ends.
async fn run_session(
    ws_url: Url,
    access_token: String,
    shared: &MonitorShared,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    debug!(url = %ws_url, "connecting to telemetry socket");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(ws_url.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    info!("telemetry socket connected");

    let (mut write, mut read) = ws_stream.split();

    // One combined frame authenticates the socket and starts discovery.
    send_json(&mut write, protocol::auth_frame(&access_token)).await?;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        for outbound in handle_frame(text.as_str(), shared)? {
                            send_json(&mut write, outbound).await?;
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite answers pings automatically
                    }
                    Some(Ok(Message::Close(_))) => return Ok(()),
                    Some(Ok(_)) => {
                        // binary, pong, raw frames -- not part of the protocol
                    }
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => return Ok(()),
                }
            }
        }
    }
}

async fn send_json<S>(write: &mut S, frame: Value) -> Result<(), Error>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    write
        .send(Message::text(frame.to_string()))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))
}

// ── Frame handling ───────────────────────────────────────────────────

/// Process one inbound text frame; returns any frames to send in response.
///
/// A frame that fails to parse is a fatal protocol error: the caller closes
/// the connection and the snapshot is left untouched.
fn handle_frame(text: &str, shared: &MonitorShared) -> Result<Vec<Value>, Error> {
    let frame: InboundFrame = serde_json::from_str(text).map_err(|e| Error::Protocol {
        message: format!("unparseable frame: {e}"),
    })?;

    debug!(cmd_id = ?frame.cmd_id, "received frame");

    match frame.cmd_id {
        Some(protocol::CMD_QUERY_DEVICE_ID) => on_device_id(&frame, shared),
        Some(protocol::CMD_QUERY_ATTRIBUTES) => {
            on_attributes(&frame, shared);
            Ok(Vec::new())
        }
        // Unknown command ids are not ours to interpret.
        _ => Ok(Vec::new()),
    }
}

/// First discovery response resolves the device; duplicates are ignored.
/// Resolution immediately kicks off the bulk pull and the subscription.
fn on_device_id(frame: &InboundFrame, shared: &MonitorShared) -> Result<Vec<Value>, Error> {
    let mut slot = shared
        .device_id
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Ok(Vec::new());
    }

    let id = frame
        .data
        .as_ref()
        .and_then(|page| page.data.first())
        .and_then(|row| row.entity_id.as_ref())
        .map(|entity| entity.id.clone())
        .ok_or_else(|| Error::Protocol {
            message: "discovery response carried no entity".into(),
        })?;

    info!(device_id = %id, "device resolved");
    *slot = Some(id.clone());

    Ok(vec![
        protocol::bulk_query_frame(&id),
        protocol::subscribe_frame(),
    ])
}

/// Merge an attribute frame; bump the revision only on actual change.
fn on_attributes(frame: &InboundFrame, shared: &MonitorShared) {
    let mut keys = shared.keys.lock().unwrap_or_else(PoisonError::into_inner);
    if protocol::merge_update(&mut keys, frame) {
        let now = Utc::now().timestamp_millis();
        // Strictly monotonic even when two merges land in one millisecond.
        let revision = now.max(*shared.last_updated.borrow() + 1);
        shared.last_updated.send_replace(revision);
        debug!(keys = keys.len(), revision, "snapshot updated");
    }
}
