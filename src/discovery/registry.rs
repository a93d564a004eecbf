//! The set of currently discovered devices

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::types::{CastDevice, ConnectionState};

/// Discovered devices, unique by id
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, CastDevice>>,
}

impl DeviceRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device, or refresh a known one.
    ///
    /// Returns true if the id was not registered before.
    pub async fn insert(&self, device: CastDevice) -> bool {
        let mut devices = self.devices.write().await;
        if let Some(known) = devices.get_mut(&device.id) {
            known.merge(device);
            false
        } else {
            devices.insert(device.id.clone(), device);
            true
        }
    }

    /// Remove a device; unknown ids are ignored
    pub async fn remove(&self, id: &str) -> Option<CastDevice> {
        self.devices.write().await.remove(id)
    }

    /// Look up a device by id
    pub async fn get(&self, id: &str) -> Option<CastDevice> {
        self.devices.read().await.get(id).cloned()
    }

    /// Check if a device is registered
    pub async fn contains(&self, id: &str) -> bool {
        self.devices.read().await.contains_key(id)
    }

    /// Update the connection state of a registered device.
    ///
    /// Returns false if the device is not registered.
    pub async fn set_state(&self, id: &str, state: ConnectionState) -> bool {
        match self.devices.write().await.get_mut(id) {
            Some(device) => {
                device.state = state;
                true
            }
            None => false,
        }
    }

    /// Registered devices, ordered by id
    pub async fn list(&self) -> Vec<CastDevice> {
        let mut devices: Vec<_> = self.devices.read().await.values().cloned().collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    /// Registered ids
    pub async fn ids(&self) -> Vec<String> {
        self.devices.read().await.keys().cloned().collect()
    }

    /// Number of registered devices
    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Check if no device is registered
    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}
