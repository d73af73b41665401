//! Twilio media stream transport over the accepted axum WebSocket.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tracing::debug;

use super::messages::{TelephonyCommand, TelephonyEvent};
use crate::relay::transport::{CommandSink, EventSource, TransportError, TransportResult};

/// Read half of the media stream socket.
pub struct MediaStreamEvents {
    stream: SplitStream<WebSocket>,
    open: Arc<AtomicBool>,
}

/// Write half of the media stream socket.
pub struct MediaStreamSink {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    open: Arc<AtomicBool>,
}

/// Split an accepted socket into its relay halves.
pub fn split(socket: WebSocket) -> (MediaStreamEvents, MediaStreamSink) {
    let (sink, stream) = socket.split();
    let open = Arc::new(AtomicBool::new(true));
    (
        MediaStreamEvents {
            stream,
            open: open.clone(),
        },
        MediaStreamSink {
            sink: Mutex::new(sink),
            open,
        },
    )
}

#[async_trait]
impl EventSource<TelephonyEvent> for MediaStreamEvents {
    async fn recv(&mut self) -> Option<TransportResult<TelephonyEvent>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(
                        TelephonyEvent::parse(&text)
                            .map_err(|e| TransportError::Malformed(e.to_string())),
                    );
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Media stream closed by Twilio");
                    self.open.store(false, Ordering::SeqCst);
                    return None;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.open.store(false, Ordering::SeqCst);
                    return Some(Err(TransportError::WebSocket(e.to_string())));
                }
                None => {
                    self.open.store(false, Ordering::SeqCst);
                    return None;
                }
            }
        }
    }
}

#[async_trait]
impl CommandSink<TelephonyCommand> for MediaStreamSink {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send(&self, command: &TelephonyCommand) -> TransportResult<()> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        let json = serde_json::to_string(command)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;

        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(Message::Text(json.into())).await {
            self.open.store(false, Ordering::SeqCst);
            return Err(TransportError::WebSocket(e.to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let mut sink = self.sink.lock().await;
        // The peer may already be gone; a failed close frame is not an error.
        if let Err(e) = sink.send(Message::Close(None)).await {
            debug!("Media stream close frame not sent: {}", e);
        }
        let _ = sink.close().await;
        Ok(())
    }
}
