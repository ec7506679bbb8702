//! Service configuration.
//!
//! The on-disk config (confy-managed TOML) is a flat list of beacon and
//! merged-tracker records. The two per-beacon tunables are resolved here:
//! unset values fall back to defaults, out-of-range values clamp to the
//! valid range rather than being rejected, so a hand-edited config file
//! can never keep the service from starting.

use roomsense_types::{BeaconConfig, MergedTrackerConfig};
use serde::{Deserialize, Serialize};

/// confy application name; decides the config file location.
pub const APP_NAME: &str = "roomsense";

/// Default silence window before a room reading is forgotten.
pub const DEFAULT_EXPIRATION_MINUTES: u32 = 2;
pub const MIN_EXPIRATION_MINUTES: u32 = 1;
pub const MAX_EXPIRATION_MINUTES: u32 = 10;

/// Default admission floor. Readings weaker than this are discarded.
pub const DEFAULT_MIN_RSSI: i64 = -80;
pub const WEAKEST_MIN_RSSI: i64 = -100;
pub const STRONGEST_MIN_RSSI: i64 = -20;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[source] confy::ConfyError),
    #[error("failed to store configuration: {0}")]
    Store(#[source] confy::ConfyError),
}

/// Everything the service needs to reconstruct its registry at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub beacons: Vec<BeaconConfig>,
    #[serde(default)]
    pub merged: Vec<MergedTrackerConfig>,
}

pub fn load() -> Result<ServiceConfig, ConfigError> {
    confy::load(APP_NAME, None).map_err(ConfigError::Load)
}

pub fn store(config: &ServiceConfig) -> Result<(), ConfigError> {
    confy::store(APP_NAME, None, config).map_err(ConfigError::Store)
}

pub fn clamp_expiration_minutes(minutes: u32) -> u32 {
    minutes.clamp(MIN_EXPIRATION_MINUTES, MAX_EXPIRATION_MINUTES)
}

/// Effective expiration window for a possibly-unset configured value.
pub fn resolve_expiration_minutes(configured: Option<u32>) -> u32 {
    clamp_expiration_minutes(configured.unwrap_or(DEFAULT_EXPIRATION_MINUTES))
}

pub fn clamp_min_rssi(dbm: i64) -> i64 {
    dbm.clamp(WEAKEST_MIN_RSSI, STRONGEST_MIN_RSSI)
}

/// Effective admission floor for a possibly-unset configured value.
pub fn resolve_min_rssi(configured: Option<i64>) -> i64 {
    clamp_min_rssi(configured.unwrap_or(DEFAULT_MIN_RSSI))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiration_clamps_at_both_bounds() {
        assert_eq!(clamp_expiration_minutes(0), 1);
        assert_eq!(clamp_expiration_minutes(1), 1);
        assert_eq!(clamp_expiration_minutes(7), 7);
        assert_eq!(clamp_expiration_minutes(10), 10);
        assert_eq!(clamp_expiration_minutes(90), 10);
    }

    #[test]
    fn test_min_rssi_clamps_at_both_bounds() {
        assert_eq!(clamp_min_rssi(-120), -100);
        assert_eq!(clamp_min_rssi(-80), -80);
        assert_eq!(clamp_min_rssi(-5), -20);
    }

    #[test]
    fn test_unset_values_resolve_to_defaults() {
        assert_eq!(resolve_expiration_minutes(None), DEFAULT_EXPIRATION_MINUTES);
        assert_eq!(resolve_min_rssi(None), DEFAULT_MIN_RSSI);
    }

    #[test]
    fn test_parse_service_config_toml() {
        let toml = r#"
[[beacons]]
address = "AA:BB:CC:DD:EE:FF"
name = "Key fob"
min_rssi = -75

[[beacons]]
address = "11:22:33:44:55:66"

[[merged]]
name = "Family"
mode = "away_when_any"
members = ["AA:BB:CC:DD:EE:FF", "11:22:33:44:55:66"]
"#;
        let config: ServiceConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.beacons.len(), 2);
        assert_eq!(config.beacons[0].min_rssi, Some(-75));
        assert_eq!(config.merged[0].members.len(), 2);
    }

    #[test]
    fn test_empty_config_parses() {
        let config: ServiceConfig = toml::from_str("").unwrap();
        assert!(config.beacons.is_empty());
        assert!(config.merged.is_empty());
    }
}
