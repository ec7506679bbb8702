//! Per-room observation storage.
//!
//! Each live room holds its latest raw and filtered reading, the filter
//! state that produced it, and the armed expiration timer that will
//! eventually forget it. Observation and timer are created and destroyed
//! together under the coordinator's state lock; a reader never sees one
//! without the other.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use roomsense_types::RoomReading;
use tokio::task::JoinHandle;

use crate::filter::KalmanFilter;
use crate::selector::select_current_room;

/// Live state for one room.
#[derive(Debug)]
struct RoomObservation {
    raw: i64,
    filtered: i64,
    filter: KalmanFilter,
    /// Bumped on every (re)arm. An expiry firing with a stale generation
    /// lost a race against a rearm and must leave the room alone.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl RoomObservation {
    fn new() -> Self {
        Self {
            raw: 0,
            filtered: 0,
            filter: KalmanFilter::default(),
            generation: 0,
            timer: None,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for RoomObservation {
    fn drop(&mut self) {
        // Removal always cancels the pending expiry, whichever path
        // (expiration, teardown, map drop) removed the observation.
        self.cancel_timer();
    }
}

/// All live rooms of one beacon.
#[derive(Debug, Default)]
pub(super) struct RoomObservations {
    rooms: HashMap<String, RoomObservation>,
}

impl RoomObservations {
    /// Fold an admitted reading into the room's filter, creating the
    /// room on first sight. Cancels any armed timer and returns the
    /// filtered value together with the generation the caller must tag
    /// the replacement timer with.
    pub(super) fn record(&mut self, room: &str, raw: i64) -> (i64, u64) {
        let obs = self.rooms.entry_ref(room).or_insert_with(RoomObservation::new);
        obs.raw = raw;
        obs.filtered = obs.filter.filter(raw);
        obs.generation += 1;
        obs.cancel_timer();
        (obs.filtered, obs.generation)
    }

    /// Hand the freshly armed timer to its room. Must follow `record`
    /// (or an entry from `rearm_all`) within the same locked section.
    pub(super) fn attach_timer(&mut self, room: &str, timer: JoinHandle<()>) {
        if let Some(obs) = self.rooms.get_mut(room) {
            obs.cancel_timer();
            obs.timer = Some(timer);
        } else {
            // Room vanished between record and attach; nothing to arm.
            timer.abort();
        }
    }

    /// Drop a room's reading and filter state, but only if `generation`
    /// still matches. Expiring an already-removed or since-refreshed
    /// room is a no-op. Returns whether anything was removed.
    pub(super) fn expire(&mut self, room: &str, generation: u64) -> bool {
        match self.rooms.get(room) {
            Some(obs) if obs.generation == generation => {
                self.rooms.remove(room);
                true
            }
            _ => false,
        }
    }

    /// Cancel every armed timer and bump every generation, returning the
    /// `(room, generation)` pairs the caller re-arms with fresh timers.
    /// Used when the expiration window changes.
    pub(super) fn rearm_all(&mut self) -> Vec<(String, u64)> {
        self.rooms
            .iter_mut()
            .map(|(room, obs)| {
                obs.cancel_timer();
                obs.generation += 1;
                (room.clone(), obs.generation)
            })
            .collect()
    }

    /// Drop everything, cancelling all pending timers.
    pub(super) fn clear(&mut self) {
        self.rooms.clear();
    }

    pub(super) fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub(super) fn contains(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    /// Room with the strongest filtered signal.
    pub(super) fn current_room(&self) -> Option<&str> {
        select_current_room(self.rooms.iter().map(|(room, obs)| (room.as_str(), obs.filtered)))
    }

    /// Ordered view of all live readings.
    pub(super) fn readings(&self) -> BTreeMap<String, RoomReading> {
        self.rooms
            .iter()
            .map(|(room, obs)| {
                (
                    room.clone(),
                    RoomReading { raw_rssi: obs.raw, filtered_rssi: obs.filtered },
                )
            })
            .collect()
    }
}
