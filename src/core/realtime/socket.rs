//! Realtime WebSocket transport.
//!
//! The socket is split once after the handshake: the read half becomes the
//! egress pump's [`EventSource`], the write half a shared [`CommandSink`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::config::RealtimeSettings;
use super::error::{RealtimeError, RealtimeResult};
use super::messages::{ClientEvent, ServerEvent};
use crate::relay::transport::{CommandSink, EventSource, TransportError, TransportResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Read half of the realtime socket.
pub struct AiEventStream {
    stream: SplitStream<WsStream>,
    open: Arc<AtomicBool>,
}

/// Write half of the realtime socket.
pub struct AiCommandSink {
    sink: Mutex<SplitSink<WsStream, Message>>,
    open: Arc<AtomicBool>,
}

/// Split an established socket into its relay halves.
pub fn split(ws: WsStream) -> (AiEventStream, AiCommandSink) {
    let (sink, stream) = ws.split();
    let open = Arc::new(AtomicBool::new(true));
    (
        AiEventStream {
            stream,
            open: open.clone(),
        },
        AiCommandSink {
            sink: Mutex::new(sink),
            open,
        },
    )
}

#[async_trait]
impl EventSource<ServerEvent> for AiEventStream {
    async fn recv(&mut self) -> Option<TransportResult<ServerEvent>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(
                        ServerEvent::parse(&text)
                            .map_err(|e| TransportError::Malformed(e.to_string())),
                    );
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Realtime socket closed by peer");
                    self.open.store(false, Ordering::SeqCst);
                    return None;
                }
                Some(Ok(Message::Binary(_)))
                | Some(Ok(Message::Ping(_)))
                | Some(Ok(Message::Pong(_)))
                | Some(Ok(Message::Frame(_))) => continue,
                Some(Err(tungstenite::Error::ConnectionClosed)) | None => {
                    self.open.store(false, Ordering::SeqCst);
                    return None;
                }
                Some(Err(e)) => {
                    self.open.store(false, Ordering::SeqCst);
                    return Some(Err(TransportError::WebSocket(e.to_string())));
                }
            }
        }
    }
}

#[async_trait]
impl CommandSink<ClientEvent> for AiCommandSink {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send(&self, command: &ClientEvent) -> TransportResult<()> {
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
        match sink.close().await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::WebSocket(e.to_string())),
        }
    }
}

/// Open the realtime socket once.
pub async fn connect(
    settings: &RealtimeSettings,
) -> RealtimeResult<(AiEventStream, AiCommandSink)> {
    if settings.api_key.is_empty() {
        return Err(RealtimeError::InvalidConfiguration(
            "OpenAI API key is not configured".to_string(),
        ));
    }

    let url = settings.ws_url();
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| RealtimeError::InvalidConfiguration(format!("Invalid WebSocket URL: {e}")))?;

    let auth = HeaderValue::from_str(&format!("Bearer {}", settings.api_key))
        .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
    request.headers_mut().insert("Authorization", auth);
    request
        .headers_mut()
        .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

    match tokio_tungstenite::connect_async(request).await {
        Ok((ws, _response)) => {
            info!(model = %settings.model, "Connected to OpenAI Realtime API");
            Ok(split(ws))
        }
        Err(tungstenite::Error::Http(response))
            if response.status() == StatusCode::UNAUTHORIZED
                || response.status() == StatusCode::FORBIDDEN =>
        {
            Err(RealtimeError::AuthenticationFailed(format!(
                "handshake rejected with {}",
                response.status()
            )))
        }
        Err(e) => Err(RealtimeError::ConnectionFailed(e.to_string())),
    }
}

/// Open the realtime socket, retrying with exponential backoff.
///
/// Authentication failures are not retried.
pub async fn connect_with_retry(
    settings: &RealtimeSettings,
) -> RealtimeResult<(AiEventStream, AiCommandSink)> {
    let retry = &settings.retry;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match connect(settings).await {
            Ok(halves) => return Ok(halves),
            Err(
                e @ (RealtimeError::AuthenticationFailed(_)
                | RealtimeError::InvalidConfiguration(_)),
            ) => {
                return Err(e);
            }
            Err(e) if retry.should_retry(attempt) => {
                let delay = retry.calculate_delay(attempt);
                warn!(
                    attempt,
                    max_attempts = retry.max_attempts,
                    delay_ms = delay,
                    "Realtime connection failed: {}",
                    e
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Err(e) => {
                return Err(RealtimeError::ConnectionFailed(format!(
                    "giving up after {attempt} attempts: {e}"
                )));
            }
        }
    }
}
