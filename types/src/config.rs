//! Persisted configuration records.
//!
//! Optional fields stay optional here; resolution to effective values
//! (name fallback, expiration/floor clamping) happens in the core's
//! config module so that "unset" is never smuggled around as a sentinel.

use serde::{Deserialize, Serialize};

use crate::address::BeaconAddress;
use crate::presence::MergeMode;

/// One tracked beacon as configured by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// MAC or UUID identifying the beacon.
    pub address: BeaconAddress,
    /// Display name; falls back to the address when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Silence window after which a room reading is forgotten, minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_minutes: Option<u32>,
    /// Weakest advertisement accepted, dBm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rssi: Option<i64>,
}

impl BeaconConfig {
    pub fn new(address: BeaconAddress) -> Self {
        Self {
            address,
            name: None,
            expiration_minutes: None,
            min_rssi: None,
        }
    }

    /// Effective display name.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.address.as_str().to_string())
    }
}

/// A virtual tracker combining several beacon trackers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedTrackerConfig {
    pub name: String,
    pub mode: MergeMode,
    /// Member beacon addresses; at least two are required.
    pub members: Vec<BeaconAddress>,
}
