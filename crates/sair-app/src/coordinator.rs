//! Connection coordinator
//!
//! Owns the single active session and turns transport events into
//! connection status, log lines and a `last_error` string.
//!
//! ```text
//!                 connect()
//! Disconnected ─────────────▶ Connecting ──Connected──▶ Connected
//!      ▲                          │                        │  ▲
//!      │ disconnect() / Closed    │ Reconnecting{n}        │  │ Connected
//!      └──────────────────────────┴────────────────▶ Reconnecting{n}
//! ```
//!
//! Each `connect()` starts a new epoch. Events tagged with any other epoch,
//! or arriving after `disconnect()`, are dropped before they reach the state
//! machine.

use tokio::sync::{mpsc, watch};

use crate::config::SettingsSnapshot;
use crate::log_buffer::LogBuffer;
use sair_core::prelude::*;
use sair_core::{ConnectionStatus, Endpoint, Epoch, LogRecord, TaggedEvent, TransportEvent};
use sair_link::Transport;

/// Observable view of the coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    pub endpoint: Option<Endpoint>,
    pub last_error: Option<String>,
    pub epoch: Epoch,
}

/// What applying one transport event changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventOutcome {
    /// Event belonged to a superseded or closed session
    pub stale: bool,
    /// Status, endpoint or error changed
    pub status_changed: bool,
    /// Record appended to the log buffer
    pub line: Option<LogRecord>,
}

impl EventOutcome {
    fn stale() -> Self {
        Self {
            stale: true,
            ..Default::default()
        }
    }
}

/// Next status for `event`. Data and error events leave the status alone.
pub fn transition(status: ConnectionStatus, event: &TransportEvent) -> ConnectionStatus {
    match event {
        TransportEvent::Connected => ConnectionStatus::Connected,
        TransportEvent::Reconnecting { attempt } => ConnectionStatus::Reconnecting {
            attempt: *attempt,
        },
        TransportEvent::Closed => ConnectionStatus::Disconnected,
        TransportEvent::Line(_) | TransportEvent::Error(_) => status,
    }
}

pub struct ConnectionCoordinator {
    status: ConnectionStatus,
    endpoint: Option<Endpoint>,
    last_error: Option<String>,
    epoch: Epoch,
    /// Reconnect policy of the active session
    auto_reconnect: bool,
    link: Option<Transport>,
    event_tx: mpsc::Sender<TaggedEvent>,
    snapshot_tx: watch::Sender<ConnectionSnapshot>,
}

impl ConnectionCoordinator {
    /// `event_tx` is handed to every transport this coordinator starts.
    pub fn new(event_tx: mpsc::Sender<TaggedEvent>) -> Self {
        let (snapshot_tx, _) = watch::channel(ConnectionSnapshot::default());
        Self {
            status: ConnectionStatus::Disconnected,
            endpoint: None,
            last_error: None,
            epoch: 0,
            auto_reconnect: false,
            link: None,
            event_tx,
            snapshot_tx,
        }
    }

    /// Start a new session, replacing any existing one.
    ///
    /// The endpoint is validated first; an invalid endpoint leaves the
    /// current session untouched. The previous transport is torn down
    /// without waiting, and its late events are discarded by epoch.
    pub fn connect(&mut self, endpoint: Endpoint, settings: &SettingsSnapshot) -> Result<Epoch> {
        endpoint.validate()?;

        self.teardown();
        self.epoch += 1;
        self.status = ConnectionStatus::Connecting;
        self.endpoint = Some(endpoint.clone());
        self.auto_reconnect = settings.auto_reconnect;
        self.link = Some(Transport::connect(
            endpoint,
            settings.transport_config(),
            self.epoch,
            self.event_tx.clone(),
        ));

        self.publish();
        Ok(self.epoch)
    }

    /// End the session. Always lands in `Disconnected` with no endpoint
    /// and no error.
    pub fn disconnect(&mut self) {
        let had_session = self.link.is_some() || self.endpoint.is_some();
        self.teardown();
        self.epoch += 1;
        self.status = ConnectionStatus::Disconnected;
        self.endpoint = None;
        self.last_error = None;

        if had_session {
            info!("Session closed by user");
        }
        self.publish();
    }

    /// Apply one transport event.
    ///
    /// Lines go to `logs`; everything else drives the status machine.
    pub fn handle_event(&mut self, tagged: TaggedEvent, logs: &mut LogBuffer) -> EventOutcome {
        if tagged.epoch != self.epoch || self.link.is_none() {
            debug!(
                "Dropping stale {} event (epoch {}, current {})",
                tagged.event.kind(),
                tagged.epoch,
                self.epoch
            );
            return EventOutcome::stale();
        }

        let mut outcome = EventOutcome::default();
        let before = self.snapshot();

        match &tagged.event {
            TransportEvent::Line(line) => {
                outcome.line = logs.add_line(line.as_str()).cloned();
            }
            TransportEvent::Error(message) => {
                self.last_error = Some(message.clone());
            }
            TransportEvent::Connected => {
                self.last_error = None;
            }
            TransportEvent::Closed => {
                if !self.auto_reconnect {
                    // No retry will follow; the session is over.
                    self.link = None;
                }
            }
            TransportEvent::Reconnecting { .. } => {}
        }

        self.status = transition(self.status, &tagged.event);

        if self.snapshot() != before {
            debug!("Connection status: {}", self.status);
            outcome.status_changed = true;
            self.publish();
        }
        outcome
    }

    /// Send a command line to the device.
    ///
    /// Trailing `\r`/`\n` are stripped before the transport appends its
    /// terminator. Returns `false` when nothing was sent (blank command or
    /// no live socket).
    pub fn send_command(&self, text: &str) -> bool {
        let text = text.trim_end_matches(['\r', '\n']);
        if text.trim().is_empty() {
            return false;
        }
        match &self.link {
            Some(link) => match link.send(text) {
                Ok(sent) => sent,
                Err(e) => {
                    warn!("Command not sent: {}", e);
                    false
                }
            },
            None => {
                debug!("Not connected, dropping command");
                false
            }
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(Transport::is_connected)
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            status: self.status,
            endpoint: self.endpoint.clone(),
            last_error: self.last_error.clone(),
            epoch: self.epoch,
        }
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    fn teardown(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.disconnect();
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}
