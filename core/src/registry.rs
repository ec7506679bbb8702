//! Runtime registry of configured beacons and merged trackers.
//!
//! One explicit owned map per kind, keyed by the external identifier.
//! Instances are created when their configuration appears and destroyed
//! when it is removed; destroying an entry cancels every timer and task
//! it spawned.

use std::sync::Arc;

use hashbrown::HashMap;
use roomsense_types::{BeaconAddress, BeaconConfig, MergedTrackerConfig};

use crate::beacon::BeaconCoordinator;
use crate::config::ServiceConfig;
use crate::merge::{MergedHandle, MergedMember};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("beacon {0} is already configured")]
    DuplicateBeacon(BeaconAddress),
    #[error("beacon {0} is not configured")]
    UnknownBeacon(BeaconAddress),
    #[error("merged tracker '{0}' is already configured")]
    DuplicateMerged(String),
    #[error("merged tracker '{0}' is not configured")]
    UnknownMerged(String),
    #[error("merged tracker '{0}' needs at least two members")]
    TooFewMembers(String),
    #[error("merged tracker '{name}' references unconfigured beacon {member}")]
    UnknownMember { name: String, member: BeaconAddress },
}

#[derive(Default)]
pub struct Registry {
    beacons: HashMap<BeaconAddress, Arc<BeaconCoordinator>>,
    merged: HashMap<String, MergedHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a persisted configuration. Beacons come up
    /// first so merged trackers can resolve their members.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for beacon in &config.beacons {
            registry.add_beacon(beacon)?;
        }
        for merged in &config.merged {
            registry.add_merged(merged)?;
        }
        Ok(registry)
    }

    pub fn add_beacon(
        &mut self,
        config: &BeaconConfig,
    ) -> Result<Arc<BeaconCoordinator>, RegistryError> {
        if self.beacons.contains_key(&config.address) {
            return Err(RegistryError::DuplicateBeacon(config.address.clone()));
        }
        let coordinator = Arc::new(BeaconCoordinator::new(config));
        tracing::info!(beacon = %config.address, name = coordinator.name(), "beacon configured");
        self.beacons.insert(config.address.clone(), Arc::clone(&coordinator));
        Ok(coordinator)
    }

    pub fn beacon(&self, address: &BeaconAddress) -> Option<&Arc<BeaconCoordinator>> {
        self.beacons.get(address)
    }

    pub fn beacons(&self) -> impl Iterator<Item = &Arc<BeaconCoordinator>> {
        self.beacons.values()
    }

    /// Deconfigure a beacon, cancelling all of its pending room timers.
    pub async fn remove_beacon(&mut self, address: &BeaconAddress) -> Result<(), RegistryError> {
        let coordinator = self
            .beacons
            .remove(address)
            .ok_or_else(|| RegistryError::UnknownBeacon(address.clone()))?;
        coordinator.teardown().await;
        tracing::info!(beacon = %address, "beacon removed");
        Ok(())
    }

    /// Configure a merged tracker over already-configured beacons.
    /// Requires at least two members, all resolvable.
    pub fn add_merged(
        &mut self,
        config: &MergedTrackerConfig,
    ) -> Result<&MergedHandle, RegistryError> {
        if self.merged.contains_key(&config.name) {
            return Err(RegistryError::DuplicateMerged(config.name.clone()));
        }
        if config.members.len() < 2 {
            return Err(RegistryError::TooFewMembers(config.name.clone()));
        }

        let mut members = Vec::with_capacity(config.members.len());
        for address in &config.members {
            let beacon = self.beacons.get(address).ok_or_else(|| RegistryError::UnknownMember {
                name: config.name.clone(),
                member: address.clone(),
            })?;
            members.push(MergedMember {
                id: address.slug(),
                presence: beacon.presence(),
            });
        }

        let handle = MergedHandle::spawn(config.name.clone(), config.mode, members);
        tracing::info!(tracker = %config.name, mode = ?config.mode, "merged tracker configured");
        Ok(self.merged.entry(config.name.clone()).or_insert(handle))
    }

    pub fn merged(&self, name: &str) -> Option<&MergedHandle> {
        self.merged.get(name)
    }

    pub fn merged_trackers(&self) -> impl Iterator<Item = &MergedHandle> {
        self.merged.values()
    }

    pub fn remove_merged(&mut self, name: &str) -> Result<(), RegistryError> {
        let handle = self
            .merged
            .remove(name)
            .ok_or_else(|| RegistryError::UnknownMerged(name.to_string()))?;
        handle.shutdown();
        tracing::info!(tracker = %name, "merged tracker removed");
        Ok(())
    }

    /// Tear everything down: merged trackers first, then beacons.
    pub async fn shutdown(&mut self) {
        for (_, handle) in self.merged.drain() {
            handle.shutdown();
        }
        for (_, coordinator) in self.beacons.drain() {
            coordinator.teardown().await;
        }
    }
}
