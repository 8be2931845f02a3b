//! Headless mode - NDJSON event output
//!
//! `sair` has no interactive UI. It drives the [`Engine`](sair_app::Engine)
//! from stdin and reports everything that happens as newline-delimited JSON
//! on stdout, one event per line. Each event has an `"event"` field naming
//! its type and a millisecond `"timestamp"`.
//!
//! # Example Output
//!
//! ```json
//! {"event":"status","state":"connecting","attempt":null,"endpoint":"10.0.0.5:23","name":"Bench","error":null,"timestamp":1704700001000}
//! {"event":"status","state":"connected","attempt":null,"endpoint":"10.0.0.5:23","name":"Bench","error":null,"timestamp":1704700001040}
//! {"event":"line","id":1,"time":"10:00:01","text":"WirelessSerial v1.0.0","timestamp":1704700001050}
//! ```

pub mod runner;

use std::io::{self, Write};

use chrono::Utc;
use serde::Serialize;
use tracing::error;

use sair_app::{ConnectionSnapshot, EngineEvent, LogBuffer};
use sair_core::{DiscoveredDevice, LogRecord};

pub use runner::{parse_input_line, run_headless, HeadlessOptions};

/// Events emitted in headless mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// Connection status changed
    Status {
        state: String,
        attempt: Option<u32>,
        endpoint: Option<String>,
        name: Option<String>,
        error: Option<String>,
        timestamp: i64,
    },

    /// Line received from the device and stored
    Line {
        id: u64,
        /// Local `HH:MM:SS`, omitted when `show_timestamps` is off
        #[serde(skip_serializing_if = "Option::is_none")]
        time: Option<String>,
        text: String,
        timestamp: i64,
    },

    /// Command written to the device
    CommandSent { text: String, timestamp: i64 },

    /// Error occurred
    Error { message: String, timestamp: i64 },

    /// Log capture paused or resumed
    Paused { paused: bool, timestamp: i64 },

    /// Log buffer emptied
    Cleared { timestamp: i64 },

    /// Filter text replaced
    Filter { filter: String, timestamp: i64 },

    /// Export written
    Exported { path: String, timestamp: i64 },

    DeviceFound {
        name: String,
        host: String,
        port: u16,
        device_type: Option<String>,
        timestamp: i64,
    },

    DeviceLost { name: String, timestamp: i64 },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = self.write_to(&mut stdout) {
            error!("Failed to write headless event to stdout: {}", e);
        }
    }

    /// Write this event as one NDJSON line and flush
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let json = serde_json::to_string(self).map_err(io::Error::other)?;
        writeln!(out, "{}", json)?;
        out.flush()
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Translate an engine event.
    ///
    /// Returns `None` for events with no headless form and for lines hidden
    /// by the active filter in `logs`.
    pub fn from_engine_event(
        event: &EngineEvent,
        logs: &LogBuffer,
        show_timestamps: bool,
    ) -> Option<Self> {
        let converted = match event {
            EngineEvent::StatusChanged(snapshot) => Self::status(snapshot),
            EngineEvent::LineAdded(record) => {
                if !logs.matches(record) {
                    return None;
                }
                Self::line(record, show_timestamps)
            }
            EngineEvent::CommandSent { text } => Self::CommandSent {
                text: text.clone(),
                timestamp: Self::now(),
            },
            EngineEvent::Error { message } => Self::error(message.clone()),
            EngineEvent::PauseToggled { paused } => Self::Paused {
                paused: *paused,
                timestamp: Self::now(),
            },
            EngineEvent::LogsCleared => Self::Cleared {
                timestamp: Self::now(),
            },
            EngineEvent::FilterChanged { filter } => Self::Filter {
                filter: filter.clone(),
                timestamp: Self::now(),
            },
            EngineEvent::Exported { path } => Self::Exported {
                path: path.display().to_string(),
                timestamp: Self::now(),
            },
            EngineEvent::DeviceFound(device) => Self::device_found(device),
            EngineEvent::DeviceLost { name } => Self::DeviceLost {
                name: name.clone(),
                timestamp: Self::now(),
            },
            EngineEvent::Shutdown => return None,
        };
        Some(converted)
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn status(snapshot: &ConnectionSnapshot) -> Self {
        let attempt = match snapshot.status {
            sair_core::ConnectionStatus::Reconnecting { attempt } => Some(attempt),
            _ => None,
        };
        Self::Status {
            state: snapshot.status.label().to_string(),
            attempt,
            endpoint: snapshot.endpoint.as_ref().map(|e| e.address()),
            name: snapshot
                .endpoint
                .as_ref()
                .and_then(|e| e.display_name.clone()),
            error: snapshot.last_error.clone(),
            timestamp: Self::now(),
        }
    }

    pub fn line(record: &LogRecord, show_timestamps: bool) -> Self {
        Self::Line {
            id: record.id,
            time: show_timestamps.then(|| record.formatted_time()),
            text: record.text.clone(),
            timestamp: Self::now(),
        }
    }

    pub fn device_found(device: &DiscoveredDevice) -> Self {
        Self::DeviceFound {
            name: device.name.clone(),
            host: device.host.clone(),
            port: device.port,
            device_type: device.device_type.clone(),
            timestamp: Self::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            timestamp: Self::now(),
        }
    }
}
