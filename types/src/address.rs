//! Beacon hardware identifiers.
//!
//! Beacons are addressed either by a Bluetooth MAC (`AA:BB:CC:DD:EE:FF`)
//! or by an iBeacon-style 128-bit UUID. Addresses are validated and
//! normalized to uppercase on construction so they can serve as registry
//! keys and topic segments without further massaging.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A validated, uppercase-normalized beacon identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BeaconAddress(String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("'{0}' is neither a MAC address nor a UUID")]
    Invalid(String),
}

impl BeaconAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase identifier with separators flattened to underscores,
    /// suitable for entity ids and file names.
    pub fn slug(&self) -> String {
        self.0
            .chars()
            .map(|c| match c {
                ':' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect()
    }
}

impl fmt::Display for BeaconAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BeaconAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for BeaconAddress {
    type Err = AddressError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let candidate = raw.trim().to_ascii_uppercase();
        if is_mac(&candidate) || is_uuid(&candidate) {
            Ok(Self(candidate))
        } else {
            Err(AddressError::Invalid(raw.trim().to_string()))
        }
    }
}

impl<'de> Deserialize<'de> for BeaconAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Six colon-separated pairs of hex digits.
fn is_mac(s: &str) -> bool {
    let groups: Vec<&str> = s.split(':').collect();
    groups.len() == 6 && groups.iter().all(|g| is_hex(g, 2))
}

/// 8-4-4-4-12 hyphen-separated hex digits.
fn is_uuid(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    matches!(groups.as_slice(), [a, b, c, d, e]
        if is_hex(a, 8) && is_hex(b, 4) && is_hex(c, 4) && is_hex(d, 4) && is_hex(e, 12))
}

fn is_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_hexdigit())
}
