//! Message types for the engine update loop

use std::path::PathBuf;

use sair_core::{DiscoveryEvent, Endpoint, TaggedEvent};

/// All inputs the [`Engine`](crate::engine::Engine) reacts to
#[derive(Debug, Clone)]
pub enum Message {
    // ─────────────────────────────────────────────────────────
    // Connection
    // ─────────────────────────────────────────────────────────
    /// Start a session to an endpoint, replacing any current one
    Connect(Endpoint),
    /// Replay an entry from the recent connections list
    ConnectRecent(usize),
    /// User-initiated disconnect
    Disconnect,
    /// Send a command line to the device
    SendCommand(String),

    // ─────────────────────────────────────────────────────────
    // Log Buffer
    // ─────────────────────────────────────────────────────────
    TogglePause,
    SetFilter(String),
    ClearLogs,
    /// Write the filtered log to a file in this directory
    Export(PathBuf),

    // ─────────────────────────────────────────────────────────
    // Background Sources
    // ─────────────────────────────────────────────────────────
    /// Event from the active transport
    Link(TaggedEvent),
    /// Event from the discovery backend
    Discovery(DiscoveryEvent),

    Quit,
}
