//! Headless mode runner - main event loop
//!
//! Reads commands from stdin, feeds them to the [`Engine`] and writes every
//! resulting [`EngineEvent`] to stdout as a [`HeadlessEvent`].

use std::io::Write;
use std::path::PathBuf;

use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use sair_app::{Engine, EngineEvent, Message};
use sair_core::prelude::*;
use sair_core::Endpoint;

use super::HeadlessEvent;

/// Startup options taken from the command line
#[derive(Debug, Clone, Default)]
pub struct HeadlessOptions {
    /// `host`, `host:port` or `[v6]:port` to connect to at startup
    pub host: Option<String>,
    /// Port used when `host` carries none
    pub port: Option<u16>,
    pub name: Option<String>,
    /// Reconnect to the most recent connection when `host` is absent
    pub recent: bool,
    pub filter: Option<String>,
    pub no_reconnect: bool,
    /// Overrides the settings directory
    pub config_dir: Option<PathBuf>,
}

/// Run in headless mode - output JSON events on stdout
pub async fn run_headless(options: HeadlessOptions) -> Result<()> {
    let config_dir = options
        .config_dir
        .clone()
        .unwrap_or_else(sair_app::config::config_dir);

    info!("═══════════════════════════════════════════════════════");
    info!("Serial Air starting in HEADLESS mode");
    info!("Config: {}", config_dir.display());
    info!("═══════════════════════════════════════════════════════");

    let mut engine = Engine::new(config_dir);
    let mut events = engine.subscribe();
    let mut stdout = std::io::stdout();

    let startup = startup_messages(&mut engine, &options)?;
    for msg in startup {
        engine.process_message(msg);
    }
    drain_events(&engine, &mut events, &mut stdout);

    // Spawn headless-specific stdin reader
    let stdin_tx = engine.msg_sender();
    let default_port = engine.settings().connection.default_port;
    std::thread::spawn(move || {
        spawn_stdin_reader_blocking(stdin_tx, default_port);
    });

    let result = headless_event_loop(&mut engine, &mut events, &mut stdout).await;

    engine.shutdown();
    drain_events(&engine, &mut events, &mut stdout);

    info!("Serial Air headless mode exiting");
    result
}

/// Apply command-line settings overrides and build the initial messages.
///
/// Fails when the startup host cannot be parsed.
pub fn startup_messages(engine: &mut Engine, options: &HeadlessOptions) -> Result<Vec<Message>> {
    if options.no_reconnect {
        let mut settings = engine.settings().clone();
        settings.connection.auto_reconnect = false;
        engine.update_settings(settings);
    }

    let mut messages = Vec::new();
    if let Some(filter) = &options.filter {
        messages.push(Message::SetFilter(filter.clone()));
    }

    match &options.host {
        Some(host) => {
            let (_, explicit_port) = Endpoint::split_host_port(host)?;
            if let (Some(in_host), Some(flag)) = (explicit_port, options.port) {
                return Err(Error::invalid_endpoint(format!(
                    "port given twice: {in_host} in HOST and {flag} in --port"
                )));
            }
            let port = options
                .port
                .unwrap_or(engine.settings().connection.default_port);
            let mut endpoint = Endpoint::parse(host, port)?;
            if let Some(name) = &options.name {
                endpoint = endpoint.with_name(name.clone());
            }
            messages.push(Message::Connect(endpoint));
        }
        None if options.recent => messages.push(Message::ConnectRecent(0)),
        None => info!("No host given, waiting for :connect"),
    }

    Ok(messages)
}

/// Process messages until quit is requested or all inputs close
pub async fn headless_event_loop<W: Write>(
    engine: &mut Engine,
    events: &mut broadcast::Receiver<EngineEvent>,
    out: &mut W,
) -> Result<()> {
    loop {
        if engine.should_quit() {
            info!("Quit requested");
            break;
        }

        match engine.next_message().await {
            Some(msg) => {
                engine.process_message(msg);
                drain_events(engine, events, out);
            }
            None => {
                info!("Message channel closed");
                break;
            }
        }
    }

    Ok(())
}

/// Write every pending engine event to `out`
fn drain_events<W: Write>(
    engine: &Engine,
    events: &mut broadcast::Receiver<EngineEvent>,
    out: &mut W,
) {
    loop {
        match events.try_recv() {
            Ok(event) => {
                let show_timestamps = engine.settings().log.show_timestamps;
                if let Some(headless) =
                    HeadlessEvent::from_engine_event(&event, engine.logs(), show_timestamps)
                {
                    if let Err(e) = headless.write_to(out) {
                        error!("Failed to write headless event: {}", e);
                    }
                }
            }
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                warn!("Headless output skipped {} events", n);
            }
            Err(_) => break,
        }
    }
}

/// Turn one stdin line into an engine message.
///
/// Returns `Ok(None)` for blank lines. Lines starting with `:` are runner
/// commands; `::` escapes a literal leading colon. Everything else is sent
/// to the device.
pub fn parse_input_line(line: &str, default_port: u16) -> Result<Option<Message>> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.trim().is_empty() {
        return Ok(None);
    }

    let Some(command) = trimmed.strip_prefix(':') else {
        return Ok(Some(Message::SendCommand(trimmed.to_string())));
    };
    if command.starts_with(':') {
        return Ok(Some(Message::SendCommand(command.to_string())));
    }

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    let msg = match name {
        "connect" => {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let target = parts.next().unwrap_or_default();
            if target.is_empty() {
                return Err(Error::invalid_endpoint("usage: :connect host[:port] [name]"));
            }
            let mut endpoint = Endpoint::parse(target, default_port)?;
            if let Some(label) = parts.next().map(str::trim).filter(|s| !s.is_empty()) {
                endpoint = endpoint.with_name(label);
            }
            Message::Connect(endpoint)
        }
        "disconnect" => Message::Disconnect,
        "pause" => Message::TogglePause,
        "clear" => Message::ClearLogs,
        "filter" => Message::SetFilter(rest.to_string()),
        "export" => {
            let dir = if rest.is_empty() { "." } else { rest };
            Message::Export(PathBuf::from(dir))
        }
        "recent" => {
            let index = if rest.is_empty() {
                0
            } else {
                rest.parse::<usize>()
                    .map_err(|_| Error::invalid_input(format!("invalid recent index: {rest}")))?
            };
            Message::ConnectRecent(index)
        }
        "quit" | "q" => Message::Quit,
        other => return Err(Error::invalid_input(format!("unknown command: :{other}"))),
    };

    Ok(Some(msg))
}

/// Spawn stdin reader task that sends commands to message channel (blocking version)
fn spawn_stdin_reader_blocking(msg_tx: mpsc::Sender<Message>, default_port: u16) {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    let reader = stdin.lock();

    for line in reader.lines() {
        match line {
            Ok(line) => match parse_input_line(&line, default_port) {
                Ok(Some(msg)) => {
                    let quit = matches!(msg, Message::Quit);
                    if msg_tx.blocking_send(msg).is_err() || quit {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Rejected stdin command {:?}: {}", line, e);
                    HeadlessEvent::error(e.to_string()).emit();
                }
            },
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }

    info!("Stdin reader exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use sair_app::{RecentConnections, Settings};

    fn parse(line: &str) -> Option<Message> {
        parse_input_line(line, 23).unwrap()
    }

    #[test]
    fn test_plain_text_is_sent_to_device() {
        match parse("status\r\n") {
            Some(Message::SendCommand(text)) => assert_eq!(text, "status"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        assert!(parse("").is_none());
        assert!(parse("   ").is_none());
    }

    #[test]
    fn test_double_colon_escapes() {
        match parse("::AT+RST") {
            Some(Message::SendCommand(text)) => assert_eq!(text, ":AT+RST"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_connect_command() {
        match parse(":connect 10.0.0.5") {
            Some(Message::Connect(ep)) => assert_eq!(ep, Endpoint::new("10.0.0.5", 23)),
            other => panic!("unexpected: {:?}", other),
        }

        match parse(":connect 10.0.0.5:2323 Garage door") {
            Some(Message::Connect(ep)) => {
                assert_eq!(ep.port, 2323);
                assert_eq!(ep.label(), "Garage door");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_connect_without_target_is_rejected() {
        let err = parse_input_line(":connect", 23).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_simple_commands() {
        assert!(matches!(parse(":disconnect"), Some(Message::Disconnect)));
        assert!(matches!(parse(":pause"), Some(Message::TogglePause)));
        assert!(matches!(parse(":clear"), Some(Message::ClearLogs)));
        assert!(matches!(parse(":quit"), Some(Message::Quit)));
        assert!(matches!(parse(":q"), Some(Message::Quit)));
    }

    #[test]
    fn test_filter_command_keeps_inner_spaces() {
        match parse(":filter wifi connected") {
            Some(Message::SetFilter(text)) => assert_eq!(text, "wifi connected"),
            other => panic!("unexpected: {:?}", other),
        }
        match parse(":filter") {
            Some(Message::SetFilter(text)) => assert!(text.is_empty()),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_export_and_recent_defaults() {
        match parse(":export") {
            Some(Message::Export(dir)) => assert_eq!(dir, PathBuf::from(".")),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(parse(":recent"), Some(Message::ConnectRecent(0))));
        assert!(matches!(parse(":recent 3"), Some(Message::ConnectRecent(3))));
        assert!(parse_input_line(":recent last", 23).is_err());
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let err = parse_input_line(":reboot", 23).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
        assert!(err.to_string().contains(":reboot"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_bad_recent_index_is_input_error() {
        let err = parse_input_line(":recent last", 23).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    fn engine() -> (Engine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::with_settings(
            Settings::default(),
            dir.path().to_path_buf(),
            RecentConnections::new(),
        );
        (engine, dir)
    }

    #[tokio::test]
    async fn test_startup_messages_with_host() {
        let (mut engine, _dir) = engine();
        let options = HeadlessOptions {
            host: Some("bench.local".into()),
            port: Some(2323),
            name: Some("Bench".into()),
            filter: Some("err".into()),
            no_reconnect: true,
            ..Default::default()
        };

        let messages = startup_messages(&mut engine, &options).unwrap();
        assert!(!engine.settings().connection.auto_reconnect);
        assert!(matches!(&messages[0], Message::SetFilter(f) if f == "err"));
        match &messages[1] {
            Message::Connect(ep) => {
                assert_eq!(ep.address(), "bench.local:2323");
                assert_eq!(ep.label(), "Bench");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_startup_messages_recent_and_idle() {
        let (mut engine, _dir) = engine();
        let recent = HeadlessOptions {
            recent: true,
            ..Default::default()
        };
        let messages = startup_messages(&mut engine, &recent).unwrap();
        assert!(matches!(messages[..], [Message::ConnectRecent(0)]));

        let idle = startup_messages(&mut engine, &HeadlessOptions::default()).unwrap();
        assert!(idle.is_empty());
        assert!(engine.settings().connection.auto_reconnect);
    }

    #[tokio::test]
    async fn test_startup_messages_rejects_port_given_twice() {
        let (mut engine, _dir) = engine();
        let options = HeadlessOptions {
            host: Some("10.0.0.5:24".into()),
            port: Some(2323),
            ..Default::default()
        };
        let err = startup_messages(&mut engine, &options).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("port given twice"));

        let host_port_only = HeadlessOptions {
            host: Some("10.0.0.5:24".into()),
            ..Default::default()
        };
        match &startup_messages(&mut engine, &host_port_only).unwrap()[..] {
            [Message::Connect(ep)] => assert_eq!(ep.port, 24),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_startup_messages_bad_host() {
        let (mut engine, _dir) = engine();
        let options = HeadlessOptions {
            host: Some("10.0.0.5:notaport".into()),
            ..Default::default()
        };
        assert!(startup_messages(&mut engine, &options).is_err());
    }
}
