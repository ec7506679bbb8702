//! Per-beacon presence estimation.
//!
//! A [`BeaconCoordinator`] owns everything known about one tracked
//! beacon: the per-room observation store with its expiration timers,
//! the admission parameters, and the watch channels presentation
//! adapters subscribe to.

mod coordinator;
mod rooms;

#[cfg(test)]
mod coordinator_tests;

pub use coordinator::{Admission, BeaconCoordinator};
