//! Serial Air Library
//!
//! Headless monitor for network-attached serial bridge devices. The
//! connection, log and configuration machinery lives in the `sair-*`
//! workspace crates; this crate adds the stdin/NDJSON front end.

pub mod headless;

// Re-export main entry points
pub use headless::{run_headless, HeadlessOptions};
