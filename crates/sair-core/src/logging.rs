//! File logging through tracing
//!
//! stdout carries the headless event stream, so diagnostics only ever go to
//! a daily rolling file under `<data_local_dir>/serial-air/logs/`.

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Environment variable controlling the log filter
pub const LOG_ENV_VAR: &str = "SAIR_LOG";

const DEFAULT_FILTER: &str = "serial_air=info,sair_app=info,sair_link=info,warn";

const LOG_FILE_PREFIX: &str = "sair.log";

/// Install the global subscriber.
///
/// ```bash
/// SAIR_LOG=debug sair 192.168.4.1
/// SAIR_LOG=sair_link=trace sair 192.168.4.1
/// ```
pub fn init() -> Result<()> {
    let dir = log_directory();
    std::fs::create_dir_all(&dir)?;

    let appender = RollingFileAppender::new(Rotation::DAILY, &dir, LOG_FILE_PREFIX);
    let layer = fmt::layer()
        .with_writer(appender)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_timer(fmt::time::ChronoLocal::new(
            "%Y-%m-%d %H:%M:%S%.3f".to_string(),
        ));

    tracing_subscriber::registry()
        .with(env_filter(std::env::var(LOG_ENV_VAR).ok().as_deref()))
        .with(layer)
        .init();

    tracing::info!("Serial Air {} logging to {}", env!("CARGO_PKG_VERSION"), dir.display());
    Ok(())
}

/// Filter from a `SAIR_LOG` value, falling back to the default when the
/// value is missing or does not parse
fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Directory holding the rolling log files
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("serial-air")
        .join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directory_is_namespaced() {
        assert!(log_directory().ends_with("serial-air/logs"));
    }

    #[test]
    fn test_env_filter_uses_override_or_default() {
        assert_eq!(env_filter(None).to_string(), EnvFilter::new(DEFAULT_FILTER).to_string());
        assert_eq!(
            env_filter(Some("debug")).to_string(),
            EnvFilter::new("debug").to_string()
        );
    }
}
