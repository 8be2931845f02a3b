//! Recently used connections, persisted as `recent.json`

use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use sair_core::prelude::*;
use sair_core::Endpoint;

const RECENT_FILENAME: &str = "recent.json";

/// Maximum number of remembered connections
pub const MAX_RECENT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentConnection {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    pub last_connected: DateTime<Local>,
}

impl RecentConnection {
    pub fn endpoint(&self) -> Endpoint {
        let endpoint = Endpoint::new(self.host.clone(), self.port);
        match &self.device_name {
            Some(name) => endpoint.with_name(name.clone()),
            None => endpoint,
        }
    }
}

/// Most-recent-first list, unique per `(host, port)`, capped at [`MAX_RECENT`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentConnections {
    entries: Vec<RecentConnection>,
}

impl RecentConnections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `recent.json` in `dir`; any failure yields an empty list.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(RECENT_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No recent connections at {:?}: {}", path, e);
                return Self::default();
            }
        };

        match serde_json::from_str::<Vec<RecentConnection>>(&content) {
            Ok(mut entries) => {
                entries.truncate(MAX_RECENT);
                Self { entries }
            }
            Err(e) => {
                warn!("Ignoring malformed {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let content = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(dir.join(RECENT_FILENAME), content)
            .with_context(|| format!("Failed to write {}", RECENT_FILENAME))
    }

    /// Move `endpoint` to the front, replacing any entry with the same
    /// host and port.
    pub fn record(&mut self, endpoint: &Endpoint, at: DateTime<Local>) {
        self.entries
            .retain(|c| !(c.host == endpoint.host && c.port == endpoint.port));
        self.entries.insert(
            0,
            RecentConnection {
                host: endpoint.host.clone(),
                port: endpoint.port,
                device_name: endpoint.display_name.clone(),
                last_connected: at,
            },
        );
        self.entries.truncate(MAX_RECENT);
    }

    pub fn get(&self, index: usize) -> Option<&RecentConnection> {
        self.entries.get(index)
    }

    pub fn most_recent(&self) -> Option<&RecentConnection> {
        self.entries.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecentConnection> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ep(host: &str, port: u16) -> Endpoint {
        Endpoint::new(host, port)
    }

    #[test]
    fn test_record_is_most_recent_first() {
        let mut recent = RecentConnections::new();
        recent.record(&ep("10.0.0.1", 23), Local::now());
        recent.record(&ep("10.0.0.2", 23), Local::now());

        let hosts: Vec<_> = recent.iter().map(|c| c.host.as_str()).collect();
        assert_eq!(hosts, vec!["10.0.0.2", "10.0.0.1"]);
    }

    #[test]
    fn test_record_deduplicates_on_host_and_port() {
        let mut recent = RecentConnections::new();
        recent.record(&ep("10.0.0.1", 23), Local::now());
        recent.record(&ep("10.0.0.1", 2323), Local::now());
        recent.record(&ep("10.0.0.1", 23).with_name("Bench"), Local::now());

        assert_eq!(recent.len(), 2);
        let first = recent.most_recent().unwrap();
        assert_eq!(first.port, 23);
        assert_eq!(first.device_name.as_deref(), Some("Bench"));
        assert_eq!(recent.get(1).unwrap().port, 2323);
    }

    #[test]
    fn test_record_caps_at_max() {
        let mut recent = RecentConnections::new();
        for i in 0..15u16 {
            recent.record(&ep("10.0.0.1", 1000 + i), Local::now());
        }
        assert_eq!(recent.len(), MAX_RECENT);
        assert_eq!(recent.most_recent().unwrap().port, 1014);
        assert_eq!(recent.get(MAX_RECENT - 1).unwrap().port, 1005);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let mut recent = RecentConnections::new();
        recent.record(&ep("esp.local", 23).with_name("Garage"), Local::now());
        recent.save(dir.path()).unwrap();

        let loaded = RecentConnections::load(dir.path());
        assert_eq!(loaded, recent);
        assert_eq!(loaded.most_recent().unwrap().endpoint().label(), "Garage");
    }

    #[test]
    fn test_load_missing_or_corrupt_is_empty() {
        let dir = tempdir().unwrap();
        assert!(RecentConnections::load(dir.path()).is_empty());

        std::fs::write(dir.path().join(RECENT_FILENAME), "{not json").unwrap();
        assert!(RecentConnections::load(dir.path()).is_empty());
    }
}
