//! Transport seams used by the relay pumps.
//!
//! Each duplex transport is split into an [`EventSource`] (owned by exactly one
//! pump) and a [`CommandSink`] (shared by every writer of that direction). Sinks
//! expose a cheap liveness check so writers can tolerate the peer having been
//! closed concurrently by the other pump.

use async_trait::async_trait;
use thiserror::Error;

use crate::core::realtime::messages::{ClientEvent, ServerEvent};
use crate::core::telephony::messages::{TelephonyCommand, TelephonyEvent};

/// Errors surfaced by a transport receive or send operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The channel was closed before the operation could complete
    #[error("Channel closed")]
    Closed,

    /// The underlying WebSocket reported an I/O or protocol failure
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// A frame arrived that could not be decoded into an event
    #[error("Malformed frame: {0}")]
    Malformed(String),

    /// An outbound command could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TransportError {
    /// Whether the error concerns a single frame rather than the transport itself.
    pub fn is_malformed(&self) -> bool {
        matches!(self, TransportError::Malformed(_))
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Ordered inbound event sequence of one transport.
#[async_trait]
pub trait EventSource<E>: Send {
    /// Wait for the next event. `None` means the peer closed the stream.
    async fn recv(&mut self) -> Option<TransportResult<E>>;
}

/// Outbound half of one transport.
#[async_trait]
pub trait CommandSink<C: Sync>: Send + Sync {
    /// Cheap liveness check performed before every send.
    fn is_open(&self) -> bool;

    /// Send one command.
    async fn send(&self, command: &C) -> TransportResult<()>;

    /// Close the channel. Closing an already-closed channel is a no-op.
    async fn close(&self) -> TransportResult<()>;
}

/// Inbound telephony media stream events.
pub type TelephonySource = dyn EventSource<TelephonyEvent>;
/// Outbound telephony media stream commands.
pub type TelephonySink = dyn CommandSink<TelephonyCommand>;
/// Inbound AI realtime events.
pub type AiSource = dyn EventSource<ServerEvent>;
/// Outbound AI realtime commands.
pub type AiSink = dyn CommandSink<ClientEvent>;
