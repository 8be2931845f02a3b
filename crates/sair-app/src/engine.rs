//! Engine - application context shared by all runners
//!
//! The Engine owns every piece of runtime state: settings, the connection
//! coordinator, the log buffer, the device registry, recent connections and
//! an optional discovery backend. Nothing is global; runners hold an
//! `Engine` and drive it with [`Engine::next_message`] and
//! [`Engine::process_message`].

use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::sync::{broadcast, mpsc};

use crate::config::{self, RecentConnections, Settings};
use crate::coordinator::{ConnectionCoordinator, ConnectionSnapshot};
use crate::discovery::{DeviceDiscovery, DeviceRegistry};
use crate::engine_event::EngineEvent;
use crate::export;
use crate::log_buffer::LogBuffer;
use crate::message::Message;
use crate::signals;
use sair_core::prelude::*;
use sair_core::{DiscoveryEvent, Endpoint, TaggedEvent};

/// Capacity of the input message channel
const MSG_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the transport event channel
const LINK_CHANNEL_CAPACITY: usize = 1024;

/// Capacity of the engine event broadcast
const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub struct Engine {
    /// Loaded settings, read by each new session
    settings: Settings,

    /// Directory holding `config.toml` and `recent.json`
    config_dir: PathBuf,

    coordinator: ConnectionCoordinator,
    logs: LogBuffer,
    devices: DeviceRegistry,
    recent: RecentConnections,
    discovery: Option<Box<dyn DeviceDiscovery>>,

    /// Sender half of the input message channel.
    /// Clone this to give to input sources (stdin, signals, discovery).
    msg_tx: mpsc::Sender<Message>,
    msg_rx: mpsc::Receiver<Message>,

    /// Events from whichever transport is current
    link_rx: mpsc::Receiver<TaggedEvent>,

    event_tx: broadcast::Sender<EngineEvent>,

    quit: bool,
}

impl Engine {
    /// Create an Engine using `config_dir` for settings and history.
    ///
    /// Performs all shared initialization:
    /// - Writes a default `config.toml` if missing (non-fatal)
    /// - Loads settings and recent connections
    /// - Creates the message, transport and event channels
    /// - Spawns the signal handler
    pub fn new(config_dir: PathBuf) -> Self {
        if let Err(e) = config::init_config_dir(&config_dir) {
            warn!("Failed to initialize config directory: {}", e);
        }

        let settings = config::load_settings(&config_dir);
        let recent = RecentConnections::load(&config_dir);

        let engine = Self::with_settings(settings, config_dir, recent);
        signals::spawn_signal_handler(engine.msg_tx.clone());
        engine
    }

    /// Create an Engine from already loaded state, without touching disk
    /// or installing signal handlers.
    pub fn with_settings(
        settings: Settings,
        config_dir: PathBuf,
        recent: RecentConnections,
    ) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(MSG_CHANNEL_CAPACITY);
        let (link_tx, link_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            logs: LogBuffer::new(settings.log.max_lines),
            settings,
            config_dir,
            coordinator: ConnectionCoordinator::new(link_tx),
            devices: DeviceRegistry::new(),
            recent,
            discovery: None,
            msg_tx,
            msg_rx,
            link_rx,
            event_tx,
            quit: false,
        }
    }

    /// Subscribe to engine events.
    ///
    /// Slow subscribers miss events (`RecvError::Lagged`) rather than
    /// blocking the engine.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Clone of the input sender for spawning input sources
    pub fn msg_sender(&self) -> mpsc::Sender<Message> {
        self.msg_tx.clone()
    }

    /// Wait for the next input from a runner or the active transport.
    pub async fn next_message(&mut self) -> Option<Message> {
        tokio::select! {
            Some(msg) = self.msg_rx.recv() => Some(msg),
            Some(event) = self.link_rx.recv() => Some(Message::Link(event)),
            else => None,
        }
    }

    /// Apply one message and broadcast what changed.
    pub fn process_message(&mut self, msg: Message) {
        match msg {
            Message::Connect(endpoint) => self.connect(endpoint),
            Message::ConnectRecent(index) => match self.recent.get(index).map(|c| c.endpoint()) {
                Some(endpoint) => self.connect(endpoint),
                None => self.emit(EngineEvent::Error {
                    message: format!("No recent connection at index {index}"),
                }),
            },
            Message::Disconnect => {
                self.coordinator.disconnect();
                self.emit_status();
            }
            Message::SendCommand(text) => {
                if self.coordinator.send_command(&text) {
                    let text = text.trim_end_matches(['\r', '\n']).to_string();
                    self.emit(EngineEvent::CommandSent { text });
                }
            }
            Message::TogglePause => {
                let paused = self.logs.toggle_pause();
                info!("Log {}", if paused { "paused" } else { "resumed" });
                self.emit(EngineEvent::PauseToggled { paused });
            }
            Message::SetFilter(filter) => {
                self.logs.set_filter(filter.clone());
                self.emit(EngineEvent::FilterChanged { filter });
            }
            Message::ClearLogs => {
                self.logs.clear();
                self.emit(EngineEvent::LogsCleared);
            }
            Message::Export(dir) => match export::write_export(&dir, self.logs.filtered_lines()) {
                Ok(path) => self.emit(EngineEvent::Exported { path }),
                Err(e) => {
                    error!("Export failed: {}", e);
                    self.emit(EngineEvent::Error {
                        message: e.to_string(),
                    });
                }
            },
            Message::Link(event) => {
                let outcome = self.coordinator.handle_event(event, &mut self.logs);
                if outcome.status_changed {
                    self.emit_status();
                }
                if let Some(record) = outcome.line {
                    self.emit(EngineEvent::LineAdded(record));
                }
            }
            Message::Discovery(event) => self.handle_discovery(event),
            Message::Quit => {
                info!("Quit requested");
                self.quit = true;
            }
        }
    }

    fn connect(&mut self, endpoint: Endpoint) {
        let snapshot = self.settings.snapshot();

        match self.coordinator.connect(endpoint.clone(), &snapshot) {
            Ok(epoch) => {
                self.logs.set_capacity(snapshot.max_log_lines);
                debug!("Session {} started for {}", epoch, endpoint);
                self.recent.record(&endpoint, Local::now());
                if let Err(e) = self.recent.save(&self.config_dir) {
                    warn!("Failed to save recent connections: {}", e);
                }
                self.emit_status();
            }
            Err(e) => {
                warn!("Rejected connection to {}: {}", endpoint, e);
                self.emit(EngineEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    fn handle_discovery(&mut self, event: DiscoveryEvent) {
        let Some(device) = self.devices.apply(event).cloned() else {
            return;
        };
        if device.is_online {
            self.emit(EngineEvent::DeviceFound(device));
        } else {
            self.emit(EngineEvent::DeviceLost { name: device.name });
        }
    }

    /// Start a discovery backend and route its events into the engine.
    ///
    /// Any previously attached backend is stopped first.
    pub fn attach_discovery(&mut self, mut backend: Box<dyn DeviceDiscovery>) -> Result<()> {
        self.detach_discovery();

        let (discovery_tx, mut discovery_rx) = mpsc::channel::<DiscoveryEvent>(32);
        backend.start(discovery_tx)?;

        // Bridge discovery events to app messages
        let msg_tx = self.msg_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = discovery_rx.recv().await {
                if msg_tx.send(Message::Discovery(event)).await.is_err() {
                    break;
                }
            }
        });

        self.discovery = Some(backend);
        Ok(())
    }

    /// Stop and drop the discovery backend, if any
    pub fn detach_discovery(&mut self) {
        if let Some(mut backend) = self.discovery.take() {
            backend.stop();
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.discovery.as_ref().is_some_and(|d| d.is_scanning())
    }

    /// Disconnect, stop discovery and persist history.
    pub fn shutdown(&mut self) {
        self.emit(EngineEvent::Shutdown);
        self.coordinator.disconnect();
        self.detach_discovery();
        if let Err(e) = self.recent.save(&self.config_dir) {
            warn!("Failed to save recent connections: {}", e);
        }
        info!("Engine shut down");
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace settings. Takes effect on the next connect.
    pub fn update_settings(&mut self, settings: Settings) {
        self.settings = settings.validated();
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn recent(&self) -> &RecentConnections {
        &self.recent
    }

    pub fn connection(&self) -> ConnectionSnapshot {
        self.coordinator.snapshot()
    }

    pub fn is_connected(&self) -> bool {
        self.coordinator.is_connected()
    }

    fn emit_status(&self) {
        self.emit(EngineEvent::StatusChanged(self.coordinator.snapshot()));
    }

    /// send() fails only when nobody is subscribed
    fn emit(&self, event: EngineEvent) {
        trace!("EngineEvent: {}", event.event_type());
        let _ = self.event_tx.send(event);
    }
}
