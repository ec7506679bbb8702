//! Transport-facing message schema and topic layout.
//!
//! The broker side of the integration is a plain MQTT-style topic tree:
//!
//! ```text
//! roomsense/<ADDRESS>/<room>   advertisement payloads, one topic per room
//! roomsense/alive/<ADDRESS>    retained liveness flag for the node
//! ```
//!
//! Payloads are JSON objects with a required integer `rssi` and an
//! optional integer `timestamp` (seconds since epoch). Numeric strings
//! and floats are coerced the way lenient receiver firmware emits them;
//! every other shape is a [`WireError`], which the transport adapter
//! logs and drops before anything reaches the observation store.

use roomsense_types::BeaconAddress;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root of the topic tree.
pub const ROOT_TOPIC: &str = "roomsense";

/// Subtree carrying per-node liveness flags.
pub const ALIVE_TOPIC: &str = "roomsense/alive";

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field '{0}' is not coercible to an integer")]
    NotCoercible(&'static str),
}

/// One advertisement as carried on the wire. Unknown fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertPayload {
    pub rssi: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl AdvertPayload {
    /// Parse and validate a raw payload.
    pub fn parse(raw: &str) -> Result<Self, WireError> {
        let value: Value = serde_json::from_str(raw)?;
        let obj = value.as_object().ok_or(WireError::NotAnObject)?;

        let rssi = obj
            .get("rssi")
            .ok_or(WireError::MissingField("rssi"))
            .and_then(|v| coerce_int(v).ok_or(WireError::NotCoercible("rssi")))?;

        let timestamp = match obj.get("timestamp") {
            None | Some(Value::Null) => None,
            Some(v) => Some(coerce_int(v).ok_or(WireError::NotCoercible("timestamp"))?),
        };

        Ok(Self { rssi, timestamp })
    }
}

/// Integer coercion: native integers pass through, floats truncate,
/// strings parse as decimal integers.
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Subscription pattern matching every room topic of one beacon.
pub fn state_topic_filter(address: &BeaconAddress) -> String {
    format!("{ROOT_TOPIC}/{address}/+")
}

/// Retained liveness topic for one beacon's tracker instance.
pub fn alive_topic(address: &BeaconAddress) -> String {
    format!("{ALIVE_TOPIC}/{address}")
}

/// Extract the room key from a state topic.
///
/// Accepts exactly `roomsense/<address>/<room>`; the liveness subtree and
/// malformed topics yield `None`.
pub fn room_from_topic(topic: &str) -> Option<&str> {
    let mut segments = topic.split('/');
    let root = segments.next()?;
    let address = segments.next()?;
    let room = segments.next()?;
    if root != ROOT_TOPIC || address == "alive" || address.is_empty() || room.is_empty() {
        return None;
    }
    if segments.next().is_some() {
        return None;
    }
    Some(room)
}
