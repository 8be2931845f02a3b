//! Transport lifecycle events

/// Monotonic session identity. Every `connect()` gets a fresh epoch, and
/// events carrying an older one are discarded by the coordinator.
pub type Epoch = u64;

/// Event emitted by a transport's background task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Socket established
    Connected,
    /// One complete line received from the device
    Line(String),
    /// Socket error or connect timeout (never fatal to the transport)
    Error(String),
    /// Socket closed, intentionally or not
    Closed,
    /// A retry is scheduled after an unintentional close
    Reconnecting { attempt: u32 },
}

impl TransportEvent {
    /// Short name used in debug logging
    pub fn kind(&self) -> &'static str {
        match self {
            TransportEvent::Connected => "connected",
            TransportEvent::Line(_) => "line",
            TransportEvent::Error(_) => "error",
            TransportEvent::Closed => "closed",
            TransportEvent::Reconnecting { .. } => "reconnecting",
        }
    }
}

/// A [`TransportEvent`] stamped with the epoch of the session that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub epoch: Epoch,
    pub event: TransportEvent,
}

impl TaggedEvent {
    pub fn new(epoch: Epoch, event: TransportEvent) -> Self {
        Self { epoch, event }
    }
}
