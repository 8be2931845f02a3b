//! # sair-core - Core Domain Types
//!
//! Foundation crate for Serial Air. Provides domain types, the line framer,
//! transport event definitions, discovery records, error handling and logging
//! setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`Endpoint`] - Host/port pair identifying a device, with optional display name
//! - [`ConnectionStatus`] - Disconnected, Connecting, Connected, Reconnecting
//! - [`LogRecord`] - A single received line with id and timestamp
//!
//! ### Framing (`framer`)
//! - [`LineFramer`] - Splits an arbitrarily chunked byte stream into lines
//!
//! ### Events (`events`)
//! - [`TransportEvent`] - Lifecycle and data events emitted by a transport
//! - [`TaggedEvent`] - A transport event stamped with its session [`Epoch`]
//!
//! ### Discovery (`discovery`)
//! - [`DiscoveredDevice`], [`DiscoveryEvent`], [`ResolvedService`]
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use sair_core::prelude::*;
//! ```

pub mod discovery;
pub mod error;
pub mod events;
pub mod framer;
pub mod logging;
pub mod prelude;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use discovery::{DiscoveredDevice, DiscoveryEvent, ResolvedService, MDNS_SERVICE_TYPE};
pub use error::{Error, Result, ResultExt};
pub use events::{Epoch, TaggedEvent, TransportEvent};
pub use framer::LineFramer;
pub use types::{ConnectionStatus, Endpoint, LogRecord, DEFAULT_PORT};
