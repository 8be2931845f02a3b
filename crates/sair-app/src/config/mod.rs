//! Configuration for Serial Air
//!
//! Supports:
//! - `<config_dir>/serial-air/config.toml` - Connection and log settings
//! - `<config_dir>/serial-air/recent.json` - Recently used connections

pub mod recent;
pub mod settings;
pub mod types;

pub use recent::{RecentConnection, RecentConnections, MAX_RECENT};
pub use settings::{config_dir, init_config_dir, load_settings, save_settings, CONFIG_DIR_ENV_VAR};
pub use types::{ConnectionSettings, LogSettings, Settings, SettingsSnapshot};
