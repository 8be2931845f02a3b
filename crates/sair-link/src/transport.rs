//! Reconnecting TCP transport
//!
//! [`Transport::connect`] spawns a background task that owns the socket for
//! the whole session. The task reports everything it does as
//! [`TransportEvent`]s tagged with the session epoch:
//!
//! ```text
//! connect ──ok──▶ Connected ─▶ Line* ─▶ Closed ─┐
//!    │                                          │ (reconnect enabled,
//!    └──fail──▶ Error ─▶ Closed ────────────────┤  not disconnected)
//!                                               ▼
//!                         Reconnecting{n} ─▶ sleep(interval) ─▶ connect
//! ```
//!
//! Retries are unbounded; only [`Transport::disconnect`] (or dropping the
//! handle) stops them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use sair_core::prelude::*;
use sair_core::{Endpoint, Epoch, LineFramer, TaggedEvent, TransportEvent};

/// Capacity of the command channel from the handle to the background task
const CMD_CHANNEL_CAPACITY: usize = 32;

/// Size of the socket read buffer
const READ_BUFFER_SIZE: usize = 4096;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Per-session connection policy, fixed when the session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Upper bound on establishing the socket
    pub timeout: Duration,
    /// Retry after an unintentional close
    pub reconnect_enabled: bool,
    /// Delay between a close and the next attempt
    pub reconnect_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(10_000),
            reconnect_enabled: true,
            reconnect_interval: Duration::from_millis(5_000),
        }
    }
}

/// Internal messages sent from the handle to the background task.
#[derive(Debug)]
enum LinkCommand {
    /// Write a line to the socket (terminator appended by the task)
    Send(String),
    /// Close the socket and stop the task
    Disconnect,
}

/// How a single socket's I/O loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoOutcome {
    /// Peer closed or the socket failed
    Lost,
    /// Disconnect requested or the handle went away
    Shutdown,
}

// ---------------------------------------------------------------------------
// Transport handle
// ---------------------------------------------------------------------------

/// Handle to one connection session.
///
/// The background task is aborted when the handle is dropped, so a replaced
/// session never keeps retrying on its own.
#[derive(Debug)]
pub struct Transport {
    epoch: Epoch,
    endpoint: Endpoint,
    cmd_tx: mpsc::Sender<LinkCommand>,
    connected: Arc<AtomicBool>,
    intentional_close: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl Transport {
    /// Start connecting to `endpoint` in the background.
    ///
    /// Returns immediately; progress arrives on `event_tx`. Must be called
    /// from within a Tokio runtime.
    pub fn connect(
        endpoint: Endpoint,
        config: TransportConfig,
        epoch: Epoch,
        event_tx: mpsc::Sender<TaggedEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(CMD_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let intentional_close = Arc::new(AtomicBool::new(false));

        info!(
            "Connecting to {} (epoch {}, reconnect: {}, interval: {:?})",
            endpoint, epoch, config.reconnect_enabled, config.reconnect_interval
        );

        let task = tokio::spawn(run_link_task(
            endpoint.clone(),
            config,
            cmd_rx,
            EventEmitter { epoch, event_tx },
            Arc::clone(&connected),
            Arc::clone(&intentional_close),
        ));

        Self {
            epoch,
            endpoint,
            cmd_tx,
            connected,
            intentional_close,
            task: Some(task),
        }
    }

    /// Stop the session: close the socket and cancel any pending retry.
    ///
    /// Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        self.intentional_close.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);

        if let Some(task) = self.task.take() {
            // Best effort graceful close; the abort below covers a task that
            // is mid-connect or sleeping.
            let _ = self.cmd_tx.try_send(LinkCommand::Disconnect);
            task.abort();
            info!("Disconnected from {} (epoch {})", self.endpoint, self.epoch);
        }
    }

    /// Queue `text` to be written followed by `\n`.
    ///
    /// Returns `Ok(false)` without queueing when no socket is open.
    pub fn send(&self, text: &str) -> Result<bool> {
        if !self.is_connected() {
            debug!("Dropping outbound text while disconnected");
            return Ok(false);
        }
        match self.cmd_tx.try_send(LinkCommand::Send(text.to_string())) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(Error::channel_send("outbound queue is full"))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(Error::ChannelClosed),
        }
    }

    /// Whether a live socket currently exists
    pub fn is_connected(&self) -> bool {
        self.task.is_some() && self.connected.load(Ordering::SeqCst)
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

/// Stamps events with the session epoch.
struct EventEmitter {
    epoch: Epoch,
    event_tx: mpsc::Sender<TaggedEvent>,
}

impl EventEmitter {
    /// Returns `false` once the receiver is gone.
    async fn emit(&self, event: TransportEvent) -> bool {
        trace!("epoch {} -> {}", self.epoch, event.kind());
        self.event_tx
            .send(TaggedEvent::new(self.epoch, event))
            .await
            .is_ok()
    }
}

async fn run_link_task(
    endpoint: Endpoint,
    config: TransportConfig,
    mut cmd_rx: mpsc::Receiver<LinkCommand>,
    emitter: EventEmitter,
    connected: Arc<AtomicBool>,
    intentional_close: Arc<AtomicBool>,
) {
    let mut attempt: u32 = 0;

    loop {
        match open_socket(&endpoint, config.timeout).await {
            Ok(stream) => {
                info!("Connected to {}", endpoint);
                attempt = 0;
                connected.store(true, Ordering::SeqCst);

                let outcome = if emitter.emit(TransportEvent::Connected).await {
                    run_io_loop(stream, &mut cmd_rx, &emitter).await
                } else {
                    IoOutcome::Shutdown
                };

                connected.store(false, Ordering::SeqCst);
                if !emitter.emit(TransportEvent::Closed).await || outcome == IoOutcome::Shutdown {
                    break;
                }
            }
            Err(err) => {
                warn!("Connection to {} failed: {}", endpoint, err);
                if !emitter.emit(TransportEvent::Error(err.to_string())).await
                    || !emitter.emit(TransportEvent::Closed).await
                {
                    break;
                }
            }
        }

        if intentional_close.load(Ordering::SeqCst) || !config.reconnect_enabled {
            break;
        }

        attempt = attempt.saturating_add(1);
        warn!(
            "Connection to {} lost, retrying in {:?} (attempt {})",
            endpoint, config.reconnect_interval, attempt
        );
        if !emitter.emit(TransportEvent::Reconnecting { attempt }).await {
            break;
        }

        if !wait_for_retry(config.reconnect_interval, &mut cmd_rx).await {
            break;
        }
    }

    debug!("Link task for {} exiting", endpoint);
}

/// Sleep out the reconnect interval.
///
/// Returns `false` if a disconnect arrived or the handle was dropped.
async fn wait_for_retry(interval: Duration, cmd_rx: &mut mpsc::Receiver<LinkCommand>) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            cmd = cmd_rx.recv() => match cmd {
                Some(LinkCommand::Send(_)) => {
                    debug!("Dropping outbound text while reconnecting");
                }
                Some(LinkCommand::Disconnect) | None => return false,
            }
        }
    }
}

async fn open_socket(endpoint: &Endpoint, timeout: Duration) -> Result<TcpStream> {
    let address = endpoint.address();
    match tokio::time::timeout(timeout, TcpStream::connect(&address)).await {
        Ok(Ok(stream)) => {
            if let Err(e) = stream.set_nodelay(true) {
                debug!("Could not set TCP_NODELAY on {}: {}", address, e);
            }
            Ok(stream)
        }
        Ok(Err(e)) => Err(Error::connection(format!("{address}: {e}"))),
        Err(_) => Err(Error::timeout(timeout.as_millis() as u64)),
    }
}

/// Run one socket's read/write select loop.
async fn run_io_loop(
    stream: TcpStream,
    cmd_rx: &mut mpsc::Receiver<LinkCommand>,
    emitter: &EventEmitter,
) -> IoOutcome {
    let (mut reader, mut writer) = stream.into_split();
    let mut framer = LineFramer::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            // ── Incoming bytes ───────────────────────────────────────────
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    debug!("Peer closed the connection");
                    return IoOutcome::Lost;
                }
                Ok(n) => {
                    for line in framer.push_bytes(&buf[..n]) {
                        if !emitter.emit(TransportEvent::Line(line)).await {
                            return IoOutcome::Shutdown;
                        }
                    }
                }
                Err(e) => {
                    warn!("Socket read error: {}", e);
                    if !emitter.emit(TransportEvent::Error(e.to_string())).await {
                        return IoOutcome::Shutdown;
                    }
                    return IoOutcome::Lost;
                }
            },

            // ── Outgoing command from the handle ─────────────────────────
            cmd = cmd_rx.recv() => match cmd {
                Some(LinkCommand::Send(text)) => {
                    let mut payload = text.into_bytes();
                    payload.push(b'\n');
                    if let Err(e) = writer.write_all(&payload).await {
                        warn!("Socket write error: {}", e);
                        if !emitter.emit(TransportEvent::Error(e.to_string())).await {
                            return IoOutcome::Shutdown;
                        }
                        return IoOutcome::Lost;
                    }
                }
                Some(LinkCommand::Disconnect) | None => {
                    let _ = writer.shutdown().await;
                    return IoOutcome::Shutdown;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        refused_endpoint, MockDevice, MockDeviceOptions, StalledListener, BOOT_BANNER,
    };
    use tokio::time::{timeout, Instant};
    use tokio_test::assert_ok;

    const WAIT: Duration = Duration::from_secs(5);

    fn fast_config(reconnect: bool) -> TransportConfig {
        TransportConfig {
            timeout: Duration::from_secs(2),
            reconnect_enabled: reconnect,
            reconnect_interval: Duration::from_millis(300),
        }
    }

    async fn next_event(rx: &mut mpsc::Receiver<TaggedEvent>) -> TaggedEvent {
        timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for transport event")
            .expect("event channel closed")
    }

    /// Skip `Line` events until a lifecycle event arrives
    async fn next_lifecycle(rx: &mut mpsc::Receiver<TaggedEvent>) -> TransportEvent {
        loop {
            let ev = next_event(rx).await;
            if !matches!(ev.event, TransportEvent::Line(_)) {
                return ev.event;
            }
        }
    }

    #[test]
    fn test_default_config_matches_app_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.reconnect_enabled);
        assert_eq!(config.reconnect_interval, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_connect_receives_banner_lines_in_order() {
        let device = MockDevice::start().await.unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        let mut transport = Transport::connect(device.endpoint(), fast_config(false), 7, tx);

        let first = next_event(&mut rx).await;
        assert_eq!(first, TaggedEvent::new(7, TransportEvent::Connected));

        for expected in BOOT_BANNER {
            let ev = next_event(&mut rx).await;
            assert_eq!(ev.epoch, 7);
            assert_eq!(ev.event, TransportEvent::Line(expected.to_string()));
        }

        assert!(transport.is_connected());
        transport.disconnect();
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_send_appends_newline_and_device_echoes() {
        let device = MockDevice::start().await.unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        let mut transport = Transport::connect(device.endpoint(), fast_config(false), 1, tx);

        assert_eq!(next_lifecycle(&mut rx).await, TransportEvent::Connected);
        assert!(assert_ok!(transport.send("AT+RESET")));

        loop {
            let ev = next_event(&mut rx).await;
            if ev.event == TransportEvent::Line("[Echo] AT+RESET".into()) {
                break;
            }
        }
        assert_eq!(device.received(), vec!["AT+RESET".to_string()]);
        transport.disconnect();
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_noop() {
        let (tx, _rx) = mpsc::channel(64);
        let transport = Transport::connect(refused_endpoint().await, fast_config(false), 1, tx);
        assert!(!transport.is_connected());
        assert!(!assert_ok!(transport.send("AT+RESET")));
    }

    #[tokio::test]
    async fn test_refused_without_reconnect_reports_error_then_closes() {
        let (tx, mut rx) = mpsc::channel(64);
        let _transport = Transport::connect(refused_endpoint().await, fast_config(false), 3, tx);

        let ev = next_event(&mut rx).await;
        assert_eq!(ev.epoch, 3);
        assert!(matches!(ev.event, TransportEvent::Error(_)));
        assert_eq!(next_event(&mut rx).await.event, TransportEvent::Closed);

        // Task exits without scheduling a retry
        assert!(timeout(WAIT, rx.recv()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refused_with_reconnect_retries_with_increasing_attempts() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut transport = Transport::connect(refused_endpoint().await, fast_config(true), 1, tx);

        for attempt in 1..=2 {
            assert!(matches!(next_lifecycle(&mut rx).await, TransportEvent::Error(_)));
            assert_eq!(next_lifecycle(&mut rx).await, TransportEvent::Closed);
            assert_eq!(
                next_lifecycle(&mut rx).await,
                TransportEvent::Reconnecting { attempt }
            );
        }
        transport.disconnect();
    }

    #[tokio::test]
    async fn test_connect_timeout_reports_error_then_retries() {
        let stalled = StalledListener::start().await.unwrap();
        let config = TransportConfig {
            timeout: Duration::from_millis(150),
            reconnect_enabled: true,
            reconnect_interval: Duration::from_millis(300),
        };
        let (tx, mut rx) = mpsc::channel(64);
        let started = Instant::now();
        let mut transport = Transport::connect(stalled.endpoint(), config, 3, tx);

        let ev = next_event(&mut rx).await;
        assert_eq!(ev.epoch, 3);
        assert_eq!(
            ev.event,
            TransportEvent::Error("Connection timeout after 150ms".into())
        );
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(next_lifecycle(&mut rx).await, TransportEvent::Closed);
        assert_eq!(
            next_lifecycle(&mut rx).await,
            TransportEvent::Reconnecting { attempt: 1 }
        );
        assert!(!transport.is_connected());
        transport.disconnect();
    }

    #[tokio::test]
    async fn test_server_close_triggers_reconnect_after_interval() {
        let device = MockDevice::with_options(MockDeviceOptions {
            close_after: Some(Duration::from_millis(100)),
            ..Default::default()
        })
        .await
        .unwrap();
        let config = fast_config(true);
        let (tx, mut rx) = mpsc::channel(64);
        let mut transport = Transport::connect(device.endpoint(), config.clone(), 1, tx);

        assert_eq!(next_lifecycle(&mut rx).await, TransportEvent::Connected);
        assert_eq!(next_lifecycle(&mut rx).await, TransportEvent::Closed);
        let closed_at = Instant::now();
        assert_eq!(
            next_lifecycle(&mut rx).await,
            TransportEvent::Reconnecting { attempt: 1 }
        );
        assert_eq!(next_lifecycle(&mut rx).await, TransportEvent::Connected);
        // Closed is observed slightly after the retry timer starts
        let slack = Duration::from_millis(50);
        assert!(closed_at.elapsed() + slack >= config.reconnect_interval);
        assert!(device.wait_for_connections(2, WAIT).await);

        transport.disconnect();
    }

    #[tokio::test]
    async fn test_disconnect_cancels_pending_retry() {
        let device = MockDevice::with_options(MockDeviceOptions {
            close_after: Some(Duration::from_millis(50)),
            ..Default::default()
        })
        .await
        .unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        let mut transport = Transport::connect(device.endpoint(), fast_config(true), 1, tx);

        assert_eq!(next_lifecycle(&mut rx).await, TransportEvent::Connected);
        assert_eq!(next_lifecycle(&mut rx).await, TransportEvent::Closed);
        assert_eq!(
            next_lifecycle(&mut rx).await,
            TransportEvent::Reconnecting { attempt: 1 }
        );

        transport.disconnect();
        transport.disconnect();

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(device.connections(), 1);
    }

    #[tokio::test]
    async fn test_drop_stops_background_task() {
        let (tx, mut rx) = mpsc::channel(64);
        let transport = Transport::connect(refused_endpoint().await, fast_config(true), 1, tx);
        drop(transport);

        // Sender lives in the aborted task, so the channel closes
        let drained = timeout(WAIT, async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok());
    }
}
