//! Serial Air - headless monitor for WirelessSerial devices
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;

use serial_air::HeadlessOptions;

/// Serial Air - stream logs from a WirelessSerial device over TCP
#[derive(Parser, Debug)]
#[command(name = "sair")]
#[command(about = "Stream and filter logs from network serial bridges", long_about = None)]
struct Args {
    /// Device host, `host:port` or `[ipv6]:port`
    #[arg(value_name = "HOST")]
    host: Option<String>,

    /// Port used when HOST has none (defaults to the configured port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Display name for the device
    #[arg(short, long)]
    name: Option<String>,

    /// Reconnect to the most recent device when no HOST is given
    #[arg(long)]
    recent: bool,

    /// Only print lines containing this text (case-insensitive)
    #[arg(short, long, value_name = "TEXT")]
    filter: Option<String>,

    /// Do not retry after the connection drops
    #[arg(long)]
    no_reconnect: bool,

    /// Directory holding config.toml and recent.json
    #[arg(long, value_name = "DIR", env = "SAIR_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
}

impl From<Args> for HeadlessOptions {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            name: args.name,
            recent: args.recent,
            filter: args.filter,
            no_reconnect: args.no_reconnect,
            config_dir: args.config_dir,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    if let Err(e) = sair_core::logging::init() {
        eprintln!("Warning: file logging disabled: {e}");
    }

    serial_air::run_headless(args.into()).await?;
    Ok(())
}
