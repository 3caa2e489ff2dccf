// Downstream report mapping.
//
// The hub understands two capabilities for this device: battery level (an
// integer percentage) and electric power (the grid reading scaled by a
// fixed factor). Snapshot values arrive loosely typed -- numbers or numeric
// strings -- and must never panic the report path.

use std::collections::HashMap;

use serde_json::{Value, json};

/// Snapshot key carrying the battery state of charge.
pub const BATTERY_KEY: &str = "Sys_SOC";

/// Snapshot key carrying the grid power reading.
pub const GRID_POWER_KEY: &str = "Sys_P_Grid";

/// Fixed scale factor applied to the grid power reading.
pub const GRID_POWER_SCALE: i64 = 100;

/// Reported when the battery level is absent or unparseable.
pub const BATTERY_UNKNOWN: i64 = -1;

/// Battery level as an integer percentage.
pub fn battery_level(snapshot: &HashMap<String, Value>) -> i64 {
    snapshot
        .get(BATTERY_KEY)
        .and_then(as_integer)
        .unwrap_or(BATTERY_UNKNOWN)
}

/// Grid power scaled for the hub's electric-power capability.
pub fn electric_power(snapshot: &HashMap<String, Value>) -> i64 {
    snapshot
        .get(GRID_POWER_KEY)
        .and_then(as_integer)
        .map(|watts| watts * GRID_POWER_SCALE)
        .unwrap_or(0)
}

/// State payload for a `DeviceStatesChangeReport`.
pub fn state_payload(snapshot: &HashMap<String, Value>) -> Value {
    json!({
        "battery": { "battery": battery_level(snapshot) },
        "electric-power": { "electric-power": electric_power(snapshot) },
    })
}

/// Integer out of a loosely typed snapshot value. Floats truncate toward
/// zero; strings parse as decimal numbers.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, Value)]) -> HashMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn battery_parses_numeric_strings() {
        let snap = snapshot(&[(BATTERY_KEY, json!("83"))]);
        assert_eq!(battery_level(&snap), 83);
    }

    #[test]
    fn battery_accepts_plain_numbers_and_truncates_floats() {
        assert_eq!(battery_level(&snapshot(&[(BATTERY_KEY, json!(83))])), 83);
        assert_eq!(battery_level(&snapshot(&[(BATTERY_KEY, json!("83.7"))])), 83);
        assert_eq!(battery_level(&snapshot(&[(BATTERY_KEY, json!(83.7))])), 83);
    }

    #[test]
    fn battery_falls_back_when_missing_or_unparseable() {
        assert_eq!(battery_level(&snapshot(&[])), BATTERY_UNKNOWN);
        assert_eq!(
            battery_level(&snapshot(&[(BATTERY_KEY, json!("offline"))])),
            BATTERY_UNKNOWN
        );
        assert_eq!(
            battery_level(&snapshot(&[(BATTERY_KEY, json!(null))])),
            BATTERY_UNKNOWN
        );
    }

    #[test]
    fn battery_zero_is_reported_as_zero() {
        let snap = snapshot(&[(BATTERY_KEY, json!("0"))]);
        assert_eq!(battery_level(&snap), 0);
    }

    #[test]
    fn grid_power_is_scaled() {
        let snap = snapshot(&[(GRID_POWER_KEY, json!("12"))]);
        assert_eq!(electric_power(&snap), 1200);
    }

    #[test]
    fn grid_power_keeps_its_sign() {
        // Exporting to the grid reads negative.
        let snap = snapshot(&[(GRID_POWER_KEY, json!("-3"))]);
        assert_eq!(electric_power(&snap), -300);
    }

    #[test]
    fn grid_power_falls_back_to_zero() {
        assert_eq!(electric_power(&snapshot(&[])), 0);
        assert_eq!(
            electric_power(&snapshot(&[(GRID_POWER_KEY, json!("n/a"))])),
            0
        );
    }

    #[test]
    fn state_payload_carries_both_capabilities() {
        let snap = snapshot(&[
            (BATTERY_KEY, json!("83")),
            (GRID_POWER_KEY, json!("12")),
        ]);
        let payload = state_payload(&snap);
        assert_eq!(payload["battery"]["battery"], 83);
        assert_eq!(payload["electric-power"]["electric-power"], 1200);
    }
}
