// Telemetry socket wire protocol
//
// Outbound command identifiers are generated client-side; the exchange is
// simple enough that three fixed ids cover a whole session. The monitored
// key set is contract with the cloud-side device profile, not
// configuration.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Value, json};

// ── Command identifiers ──────────────────────────────────────────────

pub const CMD_AUTH: i64 = 0;
pub const CMD_QUERY_DEVICE_ID: i64 = 1;
pub const CMD_QUERY_ATTRIBUTES: i64 = 2;

/// Cloud-side device profile the discovery query filters on.
pub const DEVICE_PROFILE: &str = "Device_Profile_RIOT_CoudLink_1";

// ── Monitored keys ───────────────────────────────────────────────────

/// Point-value attributes pulled once per connection.
pub const ATTRIBUTE_KEYS: [&str; 15] = [
    "Cfg_Model_Bat",
    "Cfg_Brand_Inv",
    "active",
    "Sys_Inv_Op_Mode",
    "Cfg_Site_MOD_Con_to",
    "Sys_EM_Con",
    "Sys_Inv_Conn",
    "SYS_P_EM",
    "Release_Rev",
    "Cfg_DCC_Enabled",
    "Cfg_DCC_UseEM",
    "Remote_Set_Voltronic",
    "Cfg_EM_Num_Devices",
    "Sys_Inv_Con",
    "Sys_Bat_Con",
];

/// Time-series keys; only the latest sample of each is consumed.
pub const TIMESERIES_KEYS: [&str; 10] = [
    "Sys_P_PV",
    "Sys_P_Grid",
    "Sys_P_Load",
    "Sys_P_Bat",
    "Sys_V_Bat",
    "Sys_SOC",
    "Sys_Percent_Load",
    "Sys_Loc_Lat",
    "Sys_Loc_Lon",
    "Sys_P_NE",
];

fn attribute_key_specs() -> Vec<Value> {
    ATTRIBUTE_KEYS
        .iter()
        .map(|k| json!({ "type": "ATTRIBUTE", "key": k }))
        .collect()
}

fn timeseries_key_specs() -> Vec<Value> {
    TIMESERIES_KEYS
        .iter()
        .map(|k| json!({ "type": "TIME_SERIES", "key": k }))
        .collect()
}

// ── Outbound frames ──────────────────────────────────────────────────

/// Combined frame sent on connect: authenticates the socket and queries the
/// device identifier in one round trip.
pub fn auth_frame(access_token: &str) -> Value {
    json!({
        "authCmd": {
            "cmdId": CMD_AUTH,
            "token": access_token,
        },
        "cmds": [{
            "cmdId": CMD_QUERY_DEVICE_ID,
            "type": "ENTITY_DATA",
            "query": {
                "entityFilter": {
                    "type": "deviceType",
                    "resolveMultiple": true,
                    "deviceNameFilter": "",
                    "deviceTypes": [DEVICE_PROFILE],
                },
                "pageLink": {
                    "page": 0,
                    "pageSize": 1024,
                    "textSearch": null,
                    "dynamic": true,
                    "sortOrder": null,
                },
                "entityFields": [
                    { "type": "ENTITY_FIELD", "key": "name" },
                    { "type": "ENTITY_FIELD", "key": "label" },
                    { "type": "ENTITY_FIELD", "key": "additionalInfo" },
                ],
                "latestValues": [],
            },
        }],
    })
}

/// One-shot pull of the latest values for every monitored key.
pub fn bulk_query_frame(device_id: &str) -> Value {
    let mut latest_values = attribute_key_specs();
    latest_values.extend(timeseries_key_specs());

    json!({
        "cmds": [{
            "cmdId": CMD_QUERY_ATTRIBUTES,
            "type": "ENTITY_DATA",
            "query": {
                "entityFilter": {
                    "type": "singleEntity",
                    "singleEntity": {
                        "id": device_id,
                        "entityType": "DEVICE",
                    },
                },
                "pageLink": {
                    "pageSize": 1024,
                    "page": 0,
                    "sortOrder": {
                        "key": { "type": "ENTITY_FIELD", "key": "createdTime" },
                        "direction": "DESC",
                    },
                },
                "entityFields": [
                    { "type": "ENTITY_FIELD", "key": "label" },
                    { "type": "ENTITY_FIELD", "key": "name" },
                    { "type": "ENTITY_FIELD", "key": "additionalInfo" },
                ],
                "latestValues": latest_values,
            },
        }],
    })
}

/// Subscription for ongoing pushes of the time-series keys.
pub fn subscribe_frame() -> Value {
    json!({
        "cmds": [{
            "cmdId": CMD_QUERY_ATTRIBUTES,
            "type": "ENTITY_DATA",
            "latestCmd": {
                "keys": timeseries_key_specs(),
            },
        }],
    })
}

// ── Inbound frames ───────────────────────────────────────────────────

/// A frame received on the socket. Every inbound frame echoes the command
/// id of the query it answers.
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "cmdId")]
    pub cmd_id: Option<i64>,
    #[serde(default)]
    pub data: Option<EntityPage>,
    #[serde(default)]
    pub update: Option<Vec<EntityRow>>,
}

/// Paged entity data; discovery and bulk pulls both use this shape.
#[derive(Debug, Default, Deserialize)]
pub struct EntityPage {
    #[serde(default)]
    pub data: Vec<EntityRow>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EntityRow {
    #[serde(rename = "entityId", default)]
    pub entity_id: Option<EntityId>,
    #[serde(default)]
    pub latest: Option<LatestValues>,
    #[serde(default)]
    pub timeseries: Option<HashMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
pub struct EntityId {
    pub id: String,
}

/// Latest values grouped by source kind.
#[derive(Debug, Default, Deserialize)]
pub struct LatestValues {
    #[serde(rename = "ATTRIBUTE", default)]
    pub attribute: HashMap<String, Value>,
    #[serde(rename = "TIME_SERIES", default)]
    pub time_series: HashMap<String, Value>,
}

// ── Snapshot merge ───────────────────────────────────────────────────

/// The scalar carried by a latest-value entry.
///
/// Latest maps carry `{ts, value}` objects; raw timeseries entries carry a
/// one-element `[{ts, value}]` history. An entry without a value yields
/// `None` and is skipped by the merge.
fn carried_value(entry: &Value) -> Option<&Value> {
    match entry {
        Value::Object(obj) => obj.get("value"),
        Value::Array(items) => items.first().and_then(|item| item.get("value")),
        _ => None,
    }
}

/// Merge one attribute frame into the snapshot.
///
/// The union of up to five source maps is applied in a fixed order -- bulk
/// attribute, bulk time-series, incremental attribute, incremental
/// time-series, raw timeseries -- so the last-applied source wins when a
/// key appears more than once. Returns `true` only when at least one key's
/// value actually changed; re-sent identical values do not count.
pub fn merge_update(snapshot: &mut HashMap<String, Value>, frame: &InboundFrame) -> bool {
    let mut sources: Vec<&HashMap<String, Value>> = Vec::new();

    if let Some(row) = frame.data.as_ref().and_then(|page| page.data.first()) {
        if let Some(latest) = &row.latest {
            sources.push(&latest.attribute);
            sources.push(&latest.time_series);
        }
    }
    if let Some(row) = frame.update.as_ref().and_then(|rows| rows.first()) {
        if let Some(latest) = &row.latest {
            sources.push(&latest.attribute);
            sources.push(&latest.time_series);
        }
        if let Some(timeseries) = &row.timeseries {
            sources.push(timeseries);
        }
    }

    let mut changed = false;
    for source in sources {
        for (key, entry) in source {
            let Some(value) = carried_value(entry) else {
                continue;
            };
            if snapshot.get(key) != Some(value) {
                snapshot.insert(key.clone(), value.clone());
                changed = true;
            }
        }
    }
    changed
}

// ── Tests ────────────────────────────────────────────────────────────
