//! Engine context
//!
//! One `Engine` per process bundles the device registry and the track
//! manager as explicit owned values, so applications hold a single
//! handle instead of reaching for process-wide singletons.

use crate::device::DeviceRegistry;
use crate::track::TrackManager;

pub struct Engine {
    devices: DeviceRegistry,
    tracks: TrackManager,
}

impl Engine {
    /// Create an engine with its main track and device registry.
    pub fn new() -> Self {
        log::info!("Engine: initializing");
        Self {
            devices: DeviceRegistry::new(),
            tracks: TrackManager::new(),
        }
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn tracks(&self) -> &TrackManager {
        &self.tracks
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
