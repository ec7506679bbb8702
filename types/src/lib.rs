pub mod address;
pub mod config;
pub mod presence;

pub use address::{AddressError, BeaconAddress};
pub use config::{BeaconConfig, MergedTrackerConfig};
pub use presence::{BeaconSnapshot, MergeMode, PresenceState, RoomReading};
