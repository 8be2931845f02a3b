//! # sair-app - Application State and Orchestration
//!
//! Binds the transport from [`sair_link`] to a bounded log buffer and a
//! connection state machine, and wraps everything in an [`Engine`] that
//! runners drive with messages.
//!
//! ## Public API
//!
//! ### Engine
//! - [`Engine`] - Application context owning all runtime state
//! - [`Message`] - Inputs processed by the engine
//! - [`EngineEvent`] - Broadcast notifications for runners
//!
//! ### Connection
//! - [`ConnectionCoordinator`] - Session ownership and status machine
//! - [`ConnectionSnapshot`] - Observable status, endpoint and last error
//!
//! ### Logs
//! - [`LogBuffer`] - Capacity-bounded, pausable, filterable record store
//! - [`export`] - Plain-text export of the filtered view
//!
//! ### Configuration & Discovery
//! - [`Settings`], [`SettingsSnapshot`], [`RecentConnections`]
//! - [`DeviceDiscovery`], [`DeviceRegistry`]

pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod engine;
pub mod engine_event;
pub mod export;
pub mod log_buffer;
pub mod message;
pub mod signals;

pub use config::{RecentConnection, RecentConnections, Settings, SettingsSnapshot};
pub use coordinator::{ConnectionCoordinator, ConnectionSnapshot, EventOutcome};
pub use discovery::{DeviceDiscovery, DeviceRegistry};
pub use engine::Engine;
pub use engine_event::EngineEvent;
pub use log_buffer::LogBuffer;
pub use message::Message;
