//! Beacon coordinator: advertisement admission, filtering, expiration.
//!
//! All mutation of one beacon's state happens under a single async
//! lock: ingestion, parameter changes, and expiry callbacks serialize on
//! it, so readers always observe a consistent room set. Expiry is a
//! spawned task per armed timer; rearming aborts the previous task
//! before spawning its replacement, and a generation tag on each room
//! makes a stale firing a no-op even if the abort raced.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use roomsense_types::{BeaconAddress, BeaconConfig, BeaconSnapshot, PresenceState};
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;

use super::rooms::RoomObservations;
use crate::config;

/// Outcome of offering one advertisement to the store. Rejections leave
/// every piece of state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Carried timestamp is older than the expiration window.
    StaleTimestamp,
    /// Signal strength below the configured floor.
    BelowFloor,
}

impl Admission {
    pub fn is_admitted(self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Everything known about one tracked beacon.
#[derive(Debug)]
pub struct BeaconCoordinator {
    address: BeaconAddress,
    name: String,
    state: Arc<RwLock<BeaconState>>,
    snapshot_tx: watch::Sender<BeaconSnapshot>,
    presence_tx: watch::Sender<PresenceState>,
}

#[derive(Debug)]
struct BeaconState {
    rooms: RoomObservations,
    expiration_minutes: u32,
    min_rssi: i64,
    last_accepted: Option<DateTime<Utc>>,
    advert_gap: Option<TimeDelta>,
}

impl BeaconState {
    fn window(&self) -> Duration {
        Duration::from_secs(u64::from(self.expiration_minutes) * 60)
    }

    fn window_secs(&self) -> i64 {
        i64::from(self.expiration_minutes) * 60
    }

    fn snapshot(&self) -> BeaconSnapshot {
        BeaconSnapshot {
            current_room: self.rooms.current_room().map(str::to_owned),
            rooms: self.rooms.readings(),
            last_seen: self.last_accepted.map(|t| t.timestamp()),
            advert_gap_secs: self.advert_gap.map(|d| d.num_seconds()),
        }
    }
}

impl BeaconCoordinator {
    pub fn new(config: &BeaconConfig) -> Self {
        let state = BeaconState {
            rooms: RoomObservations::default(),
            expiration_minutes: config::resolve_expiration_minutes(config.expiration_minutes),
            min_rssi: config::resolve_min_rssi(config.min_rssi),
            last_accepted: None,
            advert_gap: None,
        };
        let (snapshot_tx, _) = watch::channel(BeaconSnapshot::default());
        let (presence_tx, _) = watch::channel(PresenceState::NotHome);
        Self {
            address: config.address.clone(),
            name: config.display_name(),
            state: Arc::new(RwLock::new(state)),
            snapshot_tx,
            presence_tx,
        }
    }

    pub fn address(&self) -> &BeaconAddress {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offer one advertisement for `room`.
    pub async fn ingest(&self, room: &str, rssi: i64, timestamp: Option<i64>) -> Admission {
        self.ingest_at(room, rssi, timestamp, Utc::now()).await
    }

    /// Admission pipeline with an explicit "now", so tests control the
    /// staleness clock. Checks run in order; the first failure rejects
    /// the whole event with no state mutated.
    pub(crate) async fn ingest_at(
        &self,
        room: &str,
        rssi: i64,
        timestamp: Option<i64>,
        now: DateTime<Utc>,
    ) -> Admission {
        let mut state = self.state.write().await;

        if let Some(sent) = timestamp {
            if now.timestamp() - sent >= state.window_secs() {
                tracing::debug!(beacon = %self.address, room, "advertisement timestamp too old, skipping");
                return Admission::StaleTimestamp;
            }
        }

        if rssi < state.min_rssi {
            tracing::debug!(
                beacon = %self.address,
                room,
                rssi,
                floor = state.min_rssi,
                "advertisement below signal floor, skipping"
            );
            return Admission::BelowFloor;
        }

        state.advert_gap = state.last_accepted.map(|prev| now - prev);
        state.last_accepted = Some(now);

        let (_, generation) = state.rooms.record(room, rssi);
        let timer = self.spawn_expiry(room.to_string(), generation, state.window());
        state.rooms.attach_timer(room, timer);

        self.publish(&state);
        Admission::Admitted
    }

    /// Change the expiration window. The value clamps to the valid
    /// range and every live room timer is re-armed with the new
    /// duration immediately, without waiting for the next advertisement.
    pub async fn set_expiration_minutes(&self, minutes: u32) {
        let minutes = config::clamp_expiration_minutes(minutes);
        let mut state = self.state.write().await;
        state.expiration_minutes = minutes;
        tracing::debug!(beacon = %self.address, minutes, "expiration window changed, rearming timers");

        let window = state.window();
        for (room, generation) in state.rooms.rearm_all() {
            let timer = self.spawn_expiry(room.clone(), generation, window);
            state.rooms.attach_timer(&room, timer);
        }
    }

    /// Change the admission floor. Clamped; affects future admissions
    /// only. Rooms admitted under the old floor live out their timers.
    pub async fn set_min_rssi(&self, dbm: i64) {
        let dbm = config::clamp_min_rssi(dbm);
        let mut state = self.state.write().await;
        state.min_rssi = dbm;
    }

    pub async fn expiration_minutes(&self) -> u32 {
        self.state.read().await.expiration_minutes
    }

    pub async fn min_rssi(&self) -> i64 {
        self.state.read().await.min_rssi
    }

    /// Current read-only view of the beacon.
    pub fn snapshot(&self) -> BeaconSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Watch channel carrying every snapshot update.
    pub fn subscribe(&self) -> watch::Receiver<BeaconSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Watch channel carrying home/away transitions, for merged-tracker
    /// wiring. Only real transitions notify.
    pub fn presence(&self) -> watch::Receiver<PresenceState> {
        self.presence_tx.subscribe()
    }

    /// Forget all rooms and cancel every pending expiry. Called when the
    /// beacon is deconfigured.
    pub async fn teardown(&self) {
        let mut state = self.state.write().await;
        state.rooms.clear();
        self.publish(&state);
    }

    fn publish(&self, state: &BeaconState) {
        Self::publish_to(state, &self.snapshot_tx, &self.presence_tx);
    }

    fn publish_to(
        state: &BeaconState,
        snapshot_tx: &watch::Sender<BeaconSnapshot>,
        presence_tx: &watch::Sender<PresenceState>,
    ) {
        let snapshot = state.snapshot();
        let presence = snapshot.presence();
        snapshot_tx.send_replace(snapshot);
        presence_tx.send_if_modified(|current| {
            if *current == presence {
                false
            } else {
                *current = presence;
                true
            }
        });
    }

    /// Arm one expiry: sleep out the window, then remove the room if its
    /// generation still matches. The task holds only a weak reference to
    /// the beacon state, so a torn-down beacon is not kept alive by its
    /// pending timers.
    fn spawn_expiry(&self, room: String, generation: u64, window: Duration) -> JoinHandle<()> {
        let state = Arc::downgrade(&self.state);
        let snapshot_tx = self.snapshot_tx.clone();
        let presence_tx = self.presence_tx.clone();
        let address = self.address.clone();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let Some(state) = state.upgrade() else {
                return;
            };
            let mut state = state.write().await;
            if state.rooms.expire(&room, generation) {
                tracing::debug!(beacon = %address, room = %room, "room reading expired");
                Self::publish_to(&state, &snapshot_tx, &presence_tx);
            }
        })
    }
}
