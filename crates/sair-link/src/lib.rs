//! # sair-link - Reconnecting TCP Transport
//!
//! Owns the socket to a single serial bridge device. A background Tokio task
//! opens the connection, frames incoming bytes into lines, writes outbound
//! commands, and retries on a fixed interval after unintentional loss.
//!
//! Depends on [`sair_core`] for domain types, framing and events.
//!
//! ## Public API
//!
//! - [`Transport`] - Handle to one connection session
//! - [`TransportConfig`] - Timeout and reconnect policy for a session
//!
//! Every event is delivered as a [`sair_core::TaggedEvent`] carrying the
//! epoch the transport was created with.

pub mod transport;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use transport::{Transport, TransportConfig};
