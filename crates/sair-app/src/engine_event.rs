//! Domain events emitted by the Engine for external consumers
//!
//! Events are broadcast after each processed message via
//! `Engine::subscribe()`. Runners render them; nothing feeds back.

use std::path::PathBuf;

use sair_core::{DiscoveredDevice, LogRecord};

use crate::coordinator::ConnectionSnapshot;

#[derive(Debug, Clone)]
pub enum EngineEvent {
    // ─────────────────────────────────────────────────────────
    // Connection
    // ─────────────────────────────────────────────────────────
    /// Status, endpoint or last error changed
    StatusChanged(ConnectionSnapshot),

    /// A command was handed to the transport
    CommandSent { text: String },

    // ─────────────────────────────────────────────────────────
    // Log Buffer
    // ─────────────────────────────────────────────────────────
    /// A line was appended (not emitted while paused)
    LineAdded(LogRecord),

    LogsCleared,

    PauseToggled { paused: bool },

    FilterChanged { filter: String },

    Exported { path: PathBuf },

    // ─────────────────────────────────────────────────────────
    // Discovery
    // ─────────────────────────────────────────────────────────
    DeviceFound(DiscoveredDevice),

    DeviceLost { name: String },

    // ─────────────────────────────────────────────────────────
    // Errors & Lifecycle
    // ─────────────────────────────────────────────────────────
    /// A failure worth showing to the user
    Error { message: String },

    /// The engine is shutting down
    Shutdown,
}

impl EngineEvent {
    /// Short name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::StatusChanged(_) => "status_changed",
            EngineEvent::CommandSent { .. } => "command_sent",
            EngineEvent::LineAdded(_) => "line_added",
            EngineEvent::LogsCleared => "logs_cleared",
            EngineEvent::PauseToggled { .. } => "pause_toggled",
            EngineEvent::FilterChanged { .. } => "filter_changed",
            EngineEvent::Exported { .. } => "exported",
            EngineEvent::DeviceFound(_) => "device_found",
            EngineEvent::DeviceLost { .. } => "device_lost",
            EngineEvent::Error { .. } => "error",
            EngineEvent::Shutdown => "shutdown",
        }
    }
}
