//! Presence states and per-beacon snapshots.
//!
//! These are the read-only shapes handed to presentation adapters: the
//! tracker state machine only ever sees a `PresenceState`, the room
//! sensor consumes `BeaconSnapshot`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tri-state presence of a single tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Home,
    NotHome,
    Unknown,
}

impl PresenceState {
    /// Whether this state carries information (home or away, not unknown).
    pub fn is_known(self) -> bool {
        !matches!(self, PresenceState::Unknown)
    }
}

/// How member tracker states combine into one merged state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Away as soon as ANY member is away.
    AwayWhenAny,
    /// Away only once ALL members are away.
    AwayWhenAll,
}

impl MergeMode {
    /// Human-readable description of the logic, shown as entity metadata.
    pub fn describe(self) -> &'static str {
        match self {
            MergeMode::AwayWhenAny => "Home when all are home",
            MergeMode::AwayWhenAll => "Home when any is home",
        }
    }
}

/// Latest accepted reading for one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomReading {
    /// Signal strength as advertised, dBm.
    pub raw_rssi: i64,
    /// Kalman-smoothed signal strength, dBm.
    pub filtered_rssi: i64,
}

/// Read-only view of one beacon's live state.
///
/// Room keys are held in a `BTreeMap` so iteration order (and therefore
/// anything rendered from it) is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconSnapshot {
    /// Room with the strongest filtered signal, if any reading is live.
    pub current_room: Option<String>,
    /// All live rooms with their latest raw and filtered readings.
    pub rooms: BTreeMap<String, RoomReading>,
    /// Unix timestamp of the last accepted advertisement.
    pub last_seen: Option<i64>,
    /// Seconds between the two most recent accepted advertisements.
    /// Diagnostic only; no admission rule consults it.
    pub advert_gap_secs: Option<i64>,
}

impl BeaconSnapshot {
    /// Tracker presence derived from room occupancy: home iff some room
    /// currently holds a live reading.
    pub fn presence(&self) -> PresenceState {
        if self.current_room.is_some() {
            PresenceState::Home
        } else {
            PresenceState::NotHome
        }
    }

    /// Display attributes for the room sensor, `room -> "<dBm> dBm"`.
    /// Returns `None` when no rooms are live, matching the convention of
    /// omitting the attribute block entirely for an idle beacon.
    pub fn room_attributes(&self) -> Option<BTreeMap<String, String>> {
        if self.rooms.is_empty() {
            return None;
        }
        Some(
            self.rooms
                .iter()
                .map(|(room, r)| (room.clone(), format!("{} dBm", r.filtered_rssi)))
                .collect(),
        )
    }
}
