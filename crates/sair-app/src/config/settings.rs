//! Settings loader for `<config_dir>/serial-air/config.toml`

use std::path::{Path, PathBuf};

use super::types::Settings;
use sair_core::prelude::*;

pub(crate) const CONFIG_FILENAME: &str = "config.toml";
const APP_DIR: &str = "serial-air";

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV_VAR: &str = "SAIR_CONFIG_DIR";

/// Resolve the configuration directory.
///
/// `SAIR_CONFIG_DIR` wins when set and non-empty, otherwise the platform
/// config directory (e.g. `~/.config/serial-air`).
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV_VAR).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Load settings from `config.toml` in `dir`.
///
/// Never fails: a missing, unreadable or malformed file yields defaults.
pub fn load_settings(dir: &Path) -> Settings {
    let config_path = dir.join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str::<Settings>(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings.validated()
            }
            Err(e) => {
                let err = Error::config_invalid(&config_path, e.to_string());
                warn!("{}; using defaults", err);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Write a commented default `config.toml` if none exists
pub fn init_config_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::config(format!("Failed to create {}: {}", dir.display(), e)))?;

    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        std::fs::write(&config_path, generate_default_config())
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Created default {:?}", config_path);
    }
    Ok(())
}

/// Persist settings, replacing the file atomically
pub fn save_settings(dir: &Path, settings: &Settings) -> Result<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::config(format!("Failed to create {}: {}", dir.display(), e)))?;

    let config_path = dir.join(CONFIG_FILENAME);
    let temp_path = dir.join(".config.toml.tmp");

    let content = toml::to_string_pretty(settings)
        .map_err(|e| Error::config(format!("Failed to serialize settings: {}", e)))?;
    let full_content = format!("{}{}", generate_config_header(), content);

    std::fs::write(&temp_path, &full_content)
        .map_err(|e| Error::config(format!("Failed to write temp file: {}", e)))?;
    std::fs::rename(&temp_path, &config_path)
        .map_err(|e| Error::config(format!("Failed to rename temp file: {}", e)))?;

    debug!("Saved settings to {:?}", config_path);
    Ok(())
}

fn generate_config_header() -> &'static str {
    "# Serial Air Configuration\n\n"
}

fn generate_default_config() -> String {
    format!(
        r#"{}[connection]
default_port = 23             # Port used when only a host is given
auto_reconnect = true         # Retry after the device drops the connection
reconnect_interval_ms = 5000  # Delay between retries
connection_timeout_ms = 10000 # Give up on a connection attempt after this long

[log]
max_lines = 10000             # Oldest lines are discarded beyond this
show_timestamps = true
"#,
        generate_config_header()
    )
}
