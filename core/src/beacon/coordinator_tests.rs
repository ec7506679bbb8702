//! Tests for the beacon coordinator.
//!
//! Timer behavior runs under tokio's paused clock; staleness checks get
//! an explicit "now" through `ingest_at`.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use roomsense_types::{BeaconConfig, PresenceState, RoomReading};

use super::{Admission, BeaconCoordinator};

fn make_beacon() -> BeaconCoordinator {
    BeaconCoordinator::new(&BeaconConfig::new("AA:BB:CC:DD:EE:FF".parse().unwrap()))
}

fn make_beacon_with(expiration_minutes: Option<u32>, min_rssi: Option<i64>) -> BeaconCoordinator {
    let mut config = BeaconConfig::new("AA:BB:CC:DD:EE:FF".parse().unwrap());
    config.expiration_minutes = expiration_minutes;
    config.min_rssi = min_rssi;
    BeaconCoordinator::new(&config)
}

#[tokio::test]
async fn test_admitted_reading_creates_room() {
    let beacon = make_beacon();

    let admission = beacon.ingest("kitchen", -60, None).await;
    assert_eq!(admission, Admission::Admitted);

    let snapshot = beacon.snapshot();
    assert_eq!(snapshot.current_room.as_deref(), Some("kitchen"));
    assert_eq!(
        snapshot.rooms["kitchen"],
        RoomReading { raw_rssi: -60, filtered_rssi: -60 }
    );
    assert_eq!(snapshot.presence(), PresenceState::Home);
    assert!(snapshot.last_seen.is_some());
}

#[tokio::test]
async fn test_below_floor_reading_is_rejected_without_side_effects() {
    let beacon = make_beacon_with(None, Some(-70));

    let admission = beacon.ingest("kitchen", -75, None).await;
    assert_eq!(admission, Admission::BelowFloor);

    let snapshot = beacon.snapshot();
    assert_eq!(snapshot.current_room, None);
    assert!(snapshot.rooms.is_empty());
    assert_eq!(snapshot.last_seen, None);
    assert_eq!(snapshot.presence(), PresenceState::NotHome);
}

#[tokio::test]
async fn test_stale_timestamp_is_rejected_despite_strong_signal() {
    let beacon = make_beacon();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    // Default window is 2 minutes; a 200 second old message is stale.
    let admission = beacon
        .ingest_at("kitchen", -40, Some(now.timestamp() - 200), now)
        .await;
    assert_eq!(admission, Admission::StaleTimestamp);
    assert!(beacon.snapshot().rooms.is_empty());

    // Exactly window-old is already too old.
    let admission = beacon
        .ingest_at("kitchen", -40, Some(now.timestamp() - 120), now)
        .await;
    assert_eq!(admission, Admission::StaleTimestamp);

    // One second inside the window passes.
    let admission = beacon
        .ingest_at("kitchen", -40, Some(now.timestamp() - 119), now)
        .await;
    assert_eq!(admission, Admission::Admitted);
}

#[tokio::test(start_paused = true)]
async fn test_room_expires_after_silence() {
    let beacon = make_beacon();
    beacon.ingest("kitchen", -60, None).await;

    // Just inside the 2 minute window: still present.
    tokio::time::sleep(Duration::from_secs(119)).await;
    assert_eq!(beacon.snapshot().current_room.as_deref(), Some("kitchen"));

    tokio::time::sleep(Duration::from_secs(2)).await;
    let snapshot = beacon.snapshot();
    assert_eq!(snapshot.current_room, None);
    assert!(snapshot.rooms.is_empty());
    assert_eq!(snapshot.presence(), PresenceState::NotHome);
}

#[tokio::test(start_paused = true)]
async fn test_new_advertisement_rearms_expiry() {
    let beacon = make_beacon_with(Some(1), None);

    beacon.ingest("kitchen", -60, None).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    beacon.ingest("kitchen", -61, None).await;

    // Past the first admission's 60 second mark: the rearm must have
    // cancelled the original timer.
    tokio::time::sleep(Duration::from_secs(55)).await;
    assert_eq!(beacon.snapshot().current_room.as_deref(), Some("kitchen"));

    // 60 seconds after the second admission the room is gone.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(beacon.snapshot().current_room, None);
}

#[tokio::test(start_paused = true)]
async fn test_shrinking_window_rearms_live_timers_immediately() {
    let beacon = make_beacon();
    beacon.ingest("kitchen", -60, None).await;

    beacon.set_expiration_minutes(1).await;

    // Under the original 2 minute window this would still be live.
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(beacon.snapshot().current_room, None);
}

#[tokio::test(start_paused = true)]
async fn test_growing_window_outlives_original_deadline() {
    let beacon = make_beacon();
    beacon.ingest("kitchen", -60, None).await;

    beacon.set_expiration_minutes(10).await;

    // Past the original 120 second deadline.
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(beacon.snapshot().current_room.as_deref(), Some("kitchen"));

    tokio::time::sleep(Duration::from_secs(301)).await;
    assert_eq!(beacon.snapshot().current_room, None);
}

#[tokio::test]
async fn test_floor_change_only_affects_future_admissions() {
    let beacon = make_beacon();

    assert!(beacon.ingest("kitchen", -75, None).await.is_admitted());
    beacon.set_min_rssi(-60).await;

    // The already-admitted room survives the tightened floor.
    assert_eq!(beacon.snapshot().current_room.as_deref(), Some("kitchen"));

    // New advertisements at the same strength now fall below it.
    assert_eq!(beacon.ingest("hallway", -75, None).await, Admission::BelowFloor);
}

#[tokio::test]
async fn test_parameters_clamp_to_valid_ranges() {
    let beacon = make_beacon_with(Some(25), Some(-5));
    assert_eq!(beacon.expiration_minutes().await, 10);
    assert_eq!(beacon.min_rssi().await, -20);

    beacon.set_expiration_minutes(0).await;
    assert_eq!(beacon.expiration_minutes().await, 1);

    beacon.set_min_rssi(-120).await;
    assert_eq!(beacon.min_rssi().await, -100);
}

#[tokio::test]
async fn test_strongest_filtered_room_wins() {
    let beacon = make_beacon();
    beacon.ingest("hallway", -60, None).await;
    beacon.ingest("kitchen", -50, None).await;
    assert_eq!(beacon.snapshot().current_room.as_deref(), Some("kitchen"));
}

#[tokio::test]
async fn test_advert_gap_is_recorded() {
    let beacon = make_beacon();
    let first = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let second = first + chrono::TimeDelta::seconds(7);

    beacon.ingest_at("kitchen", -60, None, first).await;
    assert_eq!(beacon.snapshot().advert_gap_secs, None);

    beacon.ingest_at("kitchen", -61, None, second).await;
    let snapshot = beacon.snapshot();
    assert_eq!(snapshot.advert_gap_secs, Some(7));
    assert_eq!(snapshot.last_seen, Some(second.timestamp()));
}

#[tokio::test(start_paused = true)]
async fn test_teardown_cancels_pending_expiry() {
    let beacon = make_beacon();
    beacon.ingest("kitchen", -60, None).await;

    beacon.teardown().await;
    let snapshot = beacon.snapshot();
    assert!(snapshot.rooms.is_empty());
    assert_eq!(snapshot.presence(), PresenceState::NotHome);

    // Sleeping past the window must not resurrect or panic anything.
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(beacon.snapshot().rooms.is_empty());
}

#[tokio::test]
async fn test_presence_channel_only_notifies_on_transitions() {
    let beacon = make_beacon();
    let mut presence = beacon.presence();
    assert_eq!(*presence.borrow_and_update(), PresenceState::NotHome);

    beacon.ingest("kitchen", -60, None).await;
    assert!(presence.has_changed().unwrap());
    assert_eq!(*presence.borrow_and_update(), PresenceState::Home);

    // A second admission keeps presence at Home without a notification.
    beacon.ingest("kitchen", -61, None).await;
    assert!(!presence.has_changed().unwrap());
}
