//! Device discovery seam and registry
//!
//! A [`DeviceDiscovery`] backend is an owned object: the engine starts it
//! when attached and stops it on detach or shutdown. No backend ships with
//! this crate; platform mDNS integrations implement the trait.

use tokio::sync::mpsc;

use sair_core::prelude::*;
use sair_core::{DiscoveredDevice, DiscoveryEvent};

/// A scanner that reports devices appearing and disappearing
pub trait DeviceDiscovery: Send {
    /// Begin scanning, reporting on `events`. Calling while already scanning
    /// is a no-op.
    fn start(&mut self, events: mpsc::Sender<DiscoveryEvent>) -> Result<()>;

    /// Stop scanning. No-op when idle.
    fn stop(&mut self);

    fn is_scanning(&self) -> bool;
}

/// Devices seen during this run, in discovery order
#[derive(Debug, Default, Clone)]
pub struct DeviceRegistry {
    devices: Vec<DiscoveredDevice>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a discovery event and return the affected device
    pub fn apply(&mut self, event: DiscoveryEvent) -> Option<&DiscoveredDevice> {
        match event {
            DiscoveryEvent::Found(device) => Some(self.upsert(device)),
            DiscoveryEvent::Lost { name } => self.mark_offline(&name),
        }
    }

    /// Insert a new device, or refresh an existing one with the same name
    pub fn upsert(&mut self, device: DiscoveredDevice) -> &DiscoveredDevice {
        match self.devices.iter().position(|d| d.name == device.name) {
            Some(idx) => {
                self.devices[idx] = DiscoveredDevice {
                    is_online: true,
                    last_seen: chrono::Local::now(),
                    ..device
                };
                &self.devices[idx]
            }
            None => {
                debug!("Discovered {} at {}:{}", device.name, device.host, device.port);
                self.devices.push(device);
                &self.devices[self.devices.len() - 1]
            }
        }
    }

    /// Mark a device offline. It stays listed.
    pub fn mark_offline(&mut self, name: &str) -> Option<&DiscoveredDevice> {
        let device = self.devices.iter_mut().find(|d| d.name == name)?;
        device.is_online = false;
        device.last_seen = chrono::Local::now();
        Some(device)
    }

    pub fn get(&self, name: &str) -> Option<&DiscoveredDevice> {
        self.devices.iter().find(|d| d.name == name)
    }

    pub fn devices(&self) -> &[DiscoveredDevice] {
        &self.devices
    }

    pub fn online(&self) -> impl Iterator<Item = &DiscoveredDevice> {
        self.devices.iter().filter(|d| d.is_online)
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sair_core::ResolvedService;

    fn device(name: &str, host: &str) -> DiscoveredDevice {
        DiscoveredDevice::from_service(ResolvedService {
            name: Some(name.to_string()),
            host: Some(host.to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_found_inserts_and_refreshes_by_name() {
        let mut registry = DeviceRegistry::new();
        registry.apply(DiscoveryEvent::Found(device("Bench", "10.0.0.5")));
        registry.apply(DiscoveryEvent::Found(device("Garage", "10.0.0.6")));
        registry.apply(DiscoveryEvent::Found(device("Bench", "10.0.0.9")));

        assert_eq!(registry.devices().len(), 2);
        assert_eq!(registry.get("Bench").unwrap().host, "10.0.0.9");
        assert_eq!(registry.devices()[0].name, "Bench");
    }

    #[test]
    fn test_lost_marks_offline_without_removing() {
        let mut registry = DeviceRegistry::new();
        registry.apply(DiscoveryEvent::Found(device("Bench", "10.0.0.5")));

        let lost = registry
            .apply(DiscoveryEvent::Lost {
                name: "Bench".into(),
            })
            .unwrap();
        assert!(!lost.is_online);
        assert_eq!(registry.devices().len(), 1);
        assert_eq!(registry.online().count(), 0);

        registry.apply(DiscoveryEvent::Found(device("Bench", "10.0.0.5")));
        assert!(registry.get("Bench").unwrap().is_online);
    }

    #[test]
    fn test_lost_unknown_device_is_ignored() {
        let mut registry = DeviceRegistry::new();
        assert!(registry
            .apply(DiscoveryEvent::Lost {
                name: "ghost".into()
            })
            .is_none());
    }

    #[test]
    fn test_clear() {
        let mut registry = DeviceRegistry::new();
        registry.apply(DiscoveryEvent::Found(device("Bench", "10.0.0.5")));
        registry.clear();
        assert!(registry.devices().is_empty());
    }
}
