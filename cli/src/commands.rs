//! REPL command implementations.
//!
//! Each command mutates the shared [`AppState`] and prints its outcome
//! directly. Configuration changes are persisted through confy so the
//! registry can be rebuilt on the next start.

use std::sync::Arc;

use roomsense_core::config::{self, ServiceConfig};
use roomsense_core::registry::Registry;
use roomsense_core::wire;
use roomsense_types::{BeaconAddress, BeaconConfig, MergeMode, MergedTrackerConfig};
use tokio::sync::RwLock;

pub struct AppState {
    pub registry: Registry,
    pub config: ServiceConfig,
}

fn parse_address(raw: &str) -> Result<BeaconAddress, String> {
    raw.parse().map_err(|e| format!("{e}"))
}

pub fn parse_mode(raw: &str) -> Result<MergeMode, String> {
    match raw {
        "away_when_any" | "any" | "or" => Ok(MergeMode::AwayWhenAny),
        "away_when_all" | "all" | "and" => Ok(MergeMode::AwayWhenAll),
        other => Err(format!(
            "unknown merge mode '{other}' (expected away_when_any or away_when_all)"
        )),
    }
}

fn persist(state: &AppState) {
    if let Err(e) = config::store(&state.config) {
        println!("Warning: failed to persist configuration: {e}");
    }
}

pub async fn add_beacon(state: Arc<RwLock<AppState>>, address: &str, name: Option<String>) {
    let address = match parse_address(address) {
        Ok(a) => a,
        Err(e) => return println!("{e}"),
    };

    let mut beacon_config = BeaconConfig::new(address);
    beacon_config.name = name;

    let mut s = state.write().await;
    match s.registry.add_beacon(&beacon_config) {
        Ok(coordinator) => {
            println!("Added beacon {} ({})", coordinator.address(), coordinator.name());
            println!("  subscribe: {}", wire::state_topic_filter(coordinator.address()));
            println!("  liveness:  {}", wire::alive_topic(coordinator.address()));
            s.config.beacons.push(beacon_config);
            persist(&s);
        }
        Err(e) => println!("{e}"),
    }
}

pub async fn remove_beacon(state: Arc<RwLock<AppState>>, address: &str) {
    let address = match parse_address(address) {
        Ok(a) => a,
        Err(e) => return println!("{e}"),
    };

    let mut s = state.write().await;
    match s.registry.remove_beacon(&address).await {
        Ok(()) => {
            s.config.beacons.retain(|b| b.address != address);
            persist(&s);
            println!("Removed beacon {address}");
        }
        Err(e) => println!("{e}"),
    }
}

pub async fn add_merged(state: Arc<RwLock<AppState>>, name: &str, mode: &str, members: &str) {
    let mode = match parse_mode(mode) {
        Ok(m) => m,
        Err(e) => return println!("{e}"),
    };
    let members: Result<Vec<BeaconAddress>, String> =
        members.split(',').map(|m| parse_address(m.trim())).collect();
    let members = match members {
        Ok(m) => m,
        Err(e) => return println!("{e}"),
    };

    let merged_config = MergedTrackerConfig { name: name.to_string(), mode, members };
    let mut s = state.write().await;
    match s.registry.add_merged(&merged_config) {
        Ok(handle) => {
            println!("Added merged tracker '{}' ({})", handle.name(), handle.mode().describe());
            s.config.merged.push(merged_config);
            persist(&s);
        }
        Err(e) => println!("{e}"),
    }
}

pub async fn remove_merged(state: Arc<RwLock<AppState>>, name: &str) {
    let mut s = state.write().await;
    match s.registry.remove_merged(name) {
        Ok(()) => {
            s.config.merged.retain(|m| m.name != name);
            persist(&s);
            println!("Removed merged tracker '{name}'");
        }
        Err(e) => println!("{e}"),
    }
}

pub async fn advertise(
    state: Arc<RwLock<AppState>>,
    address: &str,
    room: &str,
    rssi: i64,
    timestamp: Option<i64>,
) {
    let address = match parse_address(address) {
        Ok(a) => a,
        Err(e) => return println!("{e}"),
    };

    let s = state.read().await;
    let Some(beacon) = s.registry.beacon(&address) else {
        return println!("Beacon {address} is not configured");
    };
    let admission = beacon.ingest(room, rssi, timestamp).await;
    println!("{admission:?}; current room: {}", describe_room(beacon));
}

/// Feed a raw topic + JSON payload through the wire layer, the way a
/// broker bridge would.
pub async fn inject(state: Arc<RwLock<AppState>>, topic: &str, payload: &str) {
    let Some(room) = wire::room_from_topic(topic) else {
        return println!("'{topic}' is not a state topic");
    };
    let address = match topic.split('/').nth(1).map(parse_address) {
        Some(Ok(a)) => a,
        _ => return println!("'{topic}' carries no valid beacon address"),
    };
    let payload = match wire::AdvertPayload::parse(payload) {
        Ok(p) => p,
        Err(e) => return println!("Dropping malformed payload: {e}"),
    };

    let s = state.read().await;
    let Some(beacon) = s.registry.beacon(&address) else {
        return println!("Beacon {address} is not configured");
    };
    let admission = beacon.ingest(room, payload.rssi, payload.timestamp).await;
    println!("{admission:?}; current room: {}", describe_room(beacon));
}

pub async fn set_expiration(state: Arc<RwLock<AppState>>, address: &str, minutes: u32) {
    let address = match parse_address(address) {
        Ok(a) => a,
        Err(e) => return println!("{e}"),
    };

    let mut s = state.write().await;
    let Some(beacon) = s.registry.beacon(&address) else {
        return println!("Beacon {address} is not configured");
    };
    beacon.set_expiration_minutes(minutes).await;
    let effective = beacon.expiration_minutes().await;
    println!("Expiration window for {address}: {effective} min");

    if let Some(entry) = s.config.beacons.iter_mut().find(|b| b.address == address) {
        entry.expiration_minutes = Some(effective);
    }
    persist(&s);
}

pub async fn set_floor(state: Arc<RwLock<AppState>>, address: &str, dbm: i64) {
    let address = match parse_address(address) {
        Ok(a) => a,
        Err(e) => return println!("{e}"),
    };

    let mut s = state.write().await;
    let Some(beacon) = s.registry.beacon(&address) else {
        return println!("Beacon {address} is not configured");
    };
    beacon.set_min_rssi(dbm).await;
    let effective = beacon.min_rssi().await;
    println!("Signal floor for {address}: {effective} dBm");

    if let Some(entry) = s.config.beacons.iter_mut().find(|b| b.address == address) {
        entry.min_rssi = Some(effective);
    }
    persist(&s);
}

pub async fn status(state: Arc<RwLock<AppState>>) {
    let s = state.read().await;

    for beacon in s.registry.beacons() {
        let snapshot = beacon.snapshot();
        println!(
            "{} ({}): {:?}, room: {}",
            beacon.address(),
            beacon.name(),
            snapshot.presence(),
            describe_room(beacon),
        );
        if let Some(attrs) = snapshot.room_attributes() {
            for (room, reading) in attrs {
                println!("  {room}: {reading}");
            }
        }
        if let Some(gap) = snapshot.advert_gap_secs {
            println!("  advertisement gap: {gap}s");
        }
    }

    for merged in s.registry.merged_trackers() {
        println!(
            "'{}' [{}]: {:?} ({})",
            merged.name(),
            merged.member_ids().join(", "),
            merged.status(),
            merged.mode().describe(),
        );
    }
}

fn describe_room(beacon: &roomsense_core::BeaconCoordinator) -> String {
    beacon
        .snapshot()
        .current_room
        .unwrap_or_else(|| "none".to_string())
}
