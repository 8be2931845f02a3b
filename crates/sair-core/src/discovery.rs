//! Discovered device records
//!
//! Network discovery itself lives behind a trait in `sair-app`. This module
//! only defines what a resolved service looks like and how it maps to a
//! [`DiscoveredDevice`].

use std::collections::HashMap;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::types::{Endpoint, DEFAULT_PORT};

/// mDNS service type advertised by WirelessSerial firmware
pub const MDNS_SERVICE_TYPE: &str = "_serial-air._tcp.";

const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

/// Raw resolution result handed over by a discovery backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedService {
    pub name: Option<String>,
    pub host: Option<String>,
    pub addresses: Vec<String>,
    pub port: Option<u16>,
    pub txt: HashMap<String, String>,
}

/// A device seen on the local network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_version: Option<String>,
    pub is_online: bool,
    pub last_seen: DateTime<Local>,
}

impl DiscoveredDevice {
    /// Build a device from a resolved service.
    ///
    /// Returns `None` when the service carries neither a host name nor an
    /// address, since there is nothing to connect to.
    pub fn from_service(service: ResolvedService) -> Option<Self> {
        let host = service
            .host
            .filter(|h| !h.is_empty())
            .or_else(|| service.addresses.into_iter().find(|a| !a.is_empty()))?;

        let name = service
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string());

        let port = match service.port {
            Some(p) if p != 0 => p,
            _ => DEFAULT_PORT,
        };

        let mut txt = service.txt;
        Some(Self {
            name,
            host,
            port,
            device_type: txt.remove("device"),
            library_version: txt.remove("version"),
            is_online: true,
            last_seen: Local::now(),
        })
    }

    /// Endpoint for connecting to this device, named after it
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port).with_name(self.name.clone())
    }
}

/// Callback payload from a discovery backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Found(DiscoveredDevice),
    Lost { name: String },
}
