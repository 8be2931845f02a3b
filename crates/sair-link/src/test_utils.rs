//! Test utilities for transport consumers
//!
//! [`MockDevice`] is a loopback TCP server that behaves like a WirelessSerial
//! bridge: it greets each client with a boot banner, echoes every command
//! back as `[Echo] <cmd>`, and can be scripted to hang up after a delay.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinHandle;

use sair_core::{Endpoint, LineFramer};

/// Lines written to every client right after accept
pub const BOOT_BANNER: [&str; 5] = [
    "Boot complete",
    "WiFi connected",
    "IP: 192.168.4.1",
    "WirelessSerial v1.0.0",
    "---",
];

/// Behaviour knobs for a [`MockDevice`]
#[derive(Debug, Clone)]
pub struct MockDeviceOptions {
    /// Lines sent on accept
    pub banner: Vec<String>,
    /// Reply `[Echo] <cmd>` to each received command
    pub echo: bool,
    /// Hang up on each client after this long
    pub close_after: Option<Duration>,
}

impl Default for MockDeviceOptions {
    fn default() -> Self {
        Self {
            banner: BOOT_BANNER.iter().map(|s| s.to_string()).collect(),
            echo: true,
            close_after: None,
        }
    }
}

/// Loopback device emulator. Stops accepting when dropped.
pub struct MockDevice {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl MockDevice {
    /// Start with the default banner and echo behaviour
    pub async fn start() -> std::io::Result<Self> {
        Self::with_options(MockDeviceOptions::default()).await
    }

    pub async fn with_options(options: MockDeviceOptions) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let connections = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));

        let task = tokio::spawn(accept_loop(
            listener,
            options,
            Arc::clone(&connections),
            Arc::clone(&received),
        ));

        Ok(Self {
            addr,
            connections,
            received,
            task,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.port())
    }

    /// Number of clients accepted so far
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Poll until at least `n` clients have been accepted
    pub async fn wait_for_connections(&self, n: usize, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if self.connections() >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.connections() >= n
    }

    /// Commands received from all clients, trimmed, in arrival order
    pub fn received(&self) -> Vec<String> {
        self.received
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Endpoint on localhost with nothing listening
pub async fn refused_endpoint() -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    Endpoint::new("127.0.0.1", port)
}

/// A listener that never accepts and whose accept queue is already full.
///
/// The kernel drops further SYNs, so a new connection attempt hangs until
/// the client gives up. Linux semantics; other kernels may refuse instead.
pub struct StalledListener {
    endpoint: Endpoint,
    _listener: TcpListener,
    _queued: Vec<TcpStream>,
}

impl StalledListener {
    pub async fn start() -> std::io::Result<Self> {
        let socket = TcpSocket::new_v4()?;
        socket.bind(SocketAddr::from(([127, 0, 0, 1], 0)))?;
        let listener = socket.listen(1)?;
        let addr = listener.local_addr()?;

        let mut queued = Vec::new();
        for _ in 0..8 {
            if let Ok(Ok(stream)) =
                tokio::time::timeout(Duration::from_millis(100), TcpStream::connect(addr)).await
            {
                queued.push(stream);
            }
        }

        Ok(Self {
            endpoint: Endpoint::new("127.0.0.1", addr.port()),
            _listener: listener,
            _queued: queued,
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint.clone()
    }
}

async fn accept_loop(
    listener: TcpListener,
    options: MockDeviceOptions,
    connections: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<String>>>,
) {
    let mut clients = Vec::new();
    while let Ok((socket, _)) = listener.accept().await {
        connections.fetch_add(1, Ordering::SeqCst);
        clients.push(tokio::spawn(serve_client(
            socket,
            options.clone(),
            Arc::clone(&received),
        )));
    }
    for client in clients {
        client.abort();
    }
}

async fn serve_client(
    mut socket: TcpStream,
    options: MockDeviceOptions,
    received: Arc<Mutex<Vec<String>>>,
) {
    for line in &options.banner {
        if socket.write_all(format!("{line}\n").as_bytes()).await.is_err() {
            return;
        }
    }

    let hang_up = async {
        match options.close_after {
            Some(delay) => tokio::time::sleep(delay).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(hang_up);

    let mut framer = LineFramer::new();
    let mut buf = [0u8; 1024];
    loop {
        tokio::select! {
            _ = &mut hang_up => return,
            read = socket.read(&mut buf) => {
                let n = match read {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                for line in framer.push_bytes(&buf[..n]) {
                    let cmd = line.trim().to_string();
                    if cmd.is_empty() {
                        continue;
                    }
                    if let Ok(mut guard) = received.lock() {
                        guard.push(cmd.clone());
                    }
                    if options.echo
                        && socket
                            .write_all(format!("[Echo] {cmd}\n").as_bytes())
                            .await
                            .is_err()
                    {
                        return;
                    }
                }
            }
        }
    }
}
