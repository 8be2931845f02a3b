//! Core domain types for device connections and received log lines

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default TCP port of a serial bridge device (telnet-style)
pub const DEFAULT_PORT: u16 = 23;

// ─────────────────────────────────────────────────────────
// Endpoint
// ─────────────────────────────────────────────────────────

/// Target of a connection attempt.
///
/// Created by the caller from manual entry, a discovered device or a recent
/// connection. Never mutated once a connection attempt has started.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            display_name: None,
        }
    }

    /// Attach a human-readable name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Name shown to users: the display name, or `host:port`
    pub fn label(&self) -> String {
        match &self.display_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self.address(),
        }
    }

    /// `host:port` form, bracketing IPv6 literals
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Reject endpoints that can never be connected to.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::invalid_endpoint("host is empty"));
        }
        if self.port == 0 {
            return Err(Error::invalid_endpoint("port must be between 1 and 65535"));
        }
        Ok(())
    }

    /// Parse `host`, `host:port` or `[v6]:port`, using `default_port` when
    /// no port is given.
    pub fn parse(input: &str, default_port: u16) -> Result<Self> {
        let (host, port) = Self::split_host_port(input)?;
        let endpoint = Self::new(host, port.unwrap_or(default_port));
        endpoint.validate()?;
        Ok(endpoint)
    }

    /// Split user input into host and the port it names, if any
    pub fn split_host_port(input: &str) -> Result<(&str, Option<u16>)> {
        let input = input.trim();

        let (host, port) = if let Some(rest) = input.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| Error::invalid_endpoint(format!("unterminated '[' in {input}")))?;
            match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if tail.is_empty() => (host, None),
                None => return Err(Error::invalid_endpoint(format!("unexpected '{tail}'"))),
            }
        } else {
            match input.rsplit_once(':') {
                // A bare IPv6 literal has several colons and no port
                Some((host, _)) if host.contains(':') => (input, None),
                Some((host, port)) => (host, Some(port)),
                None => (input, None),
            }
        };

        let port = port
            .map(|p| {
                p.parse::<u16>()
                    .map_err(|_| Error::invalid_endpoint(format!("invalid port '{p}'")))
            })
            .transpose()?;

        Ok((host, port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

// ─────────────────────────────────────────────────────────
// ConnectionStatus
// ─────────────────────────────────────────────────────────

/// Observable connection status of the active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No session, or the socket just closed
    #[default]
    Disconnected,
    /// First connection attempt in progress
    Connecting,
    /// Socket open and streaming
    Connected,
    /// Connection lost; a retry timer is pending
    Reconnecting {
        /// Retry number within the session (1-indexed)
        attempt: u32,
    },
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    /// Short lowercase label for display and event output
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting { .. } => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Reconnecting { attempt } => {
                write!(f, "reconnecting (attempt {attempt})")
            }
            other => f.write_str(other.label()),
        }
    }
}

// ─────────────────────────────────────────────────────────
// LogRecord
// ─────────────────────────────────────────────────────────

/// One complete line received from the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Buffer-local sequence number, starting at 1
    pub id: u64,
    pub timestamp: DateTime<Local>,
    /// Line with trailing whitespace removed
    pub text: String,
    /// Line exactly as received
    pub raw: String,
}

impl LogRecord {
    /// Create a record stamped with the current local time
    pub fn new(id: u64, raw: impl Into<String>) -> Self {
        Self::with_timestamp(id, Local::now(), raw)
    }

    pub fn with_timestamp(id: u64, timestamp: DateTime<Local>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            id,
            timestamp,
            text: raw.trim_end().to_string(),
            raw,
        }
    }

    /// Format timestamp for display
    pub fn formatted_time(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }

    /// Case-insensitive substring match against `text`.
    ///
    /// `needle_lower` must already be lowercased.
    pub fn matches_lowercase(&self, needle_lower: &str) -> bool {
        needle_lower.is_empty() || self.text.to_lowercase().contains(needle_lower)
    }
}
