//! Configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use sair_core::prelude::*;
use sair_core::DEFAULT_PORT;
use sair_link::TransportConfig;

const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 5_000;
const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_LOG_LINES: usize = 10_000;

/// Settings from `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub connection: ConnectionSettings,

    #[serde(default)]
    pub log: LogSettings,
}

/// `[connection]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Port used when none is given
    #[serde(default = "default_port")]
    pub default_port: u16,

    /// Retry after an unintentional disconnect
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Bound on establishing the socket
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            default_port: default_port(),
            auto_reconnect: true,
            reconnect_interval_ms: default_reconnect_interval_ms(),
            connection_timeout_ms: default_connection_timeout_ms(),
        }
    }
}

/// `[log]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    /// Log buffer capacity
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
            show_timestamps: true,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

fn default_reconnect_interval_ms() -> u64 {
    DEFAULT_RECONNECT_INTERVAL_MS
}

fn default_connection_timeout_ms() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_MS
}

fn default_max_lines() -> usize {
    DEFAULT_MAX_LOG_LINES
}

impl Settings {
    /// Replace values that can never work with their defaults.
    pub fn validated(mut self) -> Self {
        if self.connection.default_port == 0 {
            warn!("connection.default_port = 0 is invalid, using {}", DEFAULT_PORT);
            self.connection.default_port = DEFAULT_PORT;
        }
        if self.connection.reconnect_interval_ms == 0 {
            warn!(
                "connection.reconnect_interval_ms = 0 is invalid, using {}",
                DEFAULT_RECONNECT_INTERVAL_MS
            );
            self.connection.reconnect_interval_ms = DEFAULT_RECONNECT_INTERVAL_MS;
        }
        if self.connection.connection_timeout_ms == 0 {
            warn!(
                "connection.connection_timeout_ms = 0 is invalid, using {}",
                DEFAULT_CONNECTION_TIMEOUT_MS
            );
            self.connection.connection_timeout_ms = DEFAULT_CONNECTION_TIMEOUT_MS;
        }
        if self.log.max_lines == 0 {
            warn!("log.max_lines = 0 is invalid, using {}", DEFAULT_MAX_LOG_LINES);
            self.log.max_lines = DEFAULT_MAX_LOG_LINES;
        }
        self
    }

    /// Read-only view handed to a new connection session
    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            connection_timeout: Duration::from_millis(self.connection.connection_timeout_ms),
            auto_reconnect: self.connection.auto_reconnect,
            reconnect_interval: Duration::from_millis(self.connection.reconnect_interval_ms),
            max_log_lines: self.log.max_lines,
        }
    }
}

/// Values a session reads once, when it starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsSnapshot {
    pub connection_timeout: Duration,
    pub auto_reconnect: bool,
    pub reconnect_interval: Duration,
    pub max_log_lines: usize,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Settings::default().snapshot()
    }
}

impl SettingsSnapshot {
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.connection_timeout,
            reconnect_enabled: self.auto_reconnect,
            reconnect_interval: self.reconnect_interval,
        }
    }
}
