//! Twilio media stream WebSocket.
//!
//! Twilio opens `GET /call-stream/{call_id}` once the callee answers. The
//! handler connects the AI side, configures the session and hands both
//! transports to the [`StreamOrchestrator`] for the lifetime of the call.

use std::sync::Arc;

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use tracing::{error, info, warn};

use crate::core::realtime::{connect_with_retry, send_session_update};
use crate::core::telephony::media_stream;
use crate::relay::{CommandSink, RelayChannels, StreamOrchestrator};
use crate::state::AppState;

/// Maximum WebSocket message size (1 MB); media frames are far smaller
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

pub async fn call_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
) -> Response {
    info!(call_id = %call_id, "Media stream upgrade requested");
    ws.max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_call_stream(socket, state, call_id))
}

async fn close_socket(mut socket: WebSocket) {
    if let Err(e) = socket.send(Message::Close(None)).await {
        warn!("Failed to close media stream: {}", e);
    }
}

async fn handle_call_stream(socket: WebSocket, state: Arc<AppState>, call_id: String) {
    let Some(call) = state.calls.get(&call_id) else {
        warn!(call_id = %call_id, "Media stream for unknown call");
        close_socket(socket).await;
        return;
    };

    let (mut ai_events, ai_sink) = match connect_with_retry(&state.realtime).await {
        Ok(halves) => halves,
        Err(e) => {
            error!(call_id = %call_id, "Failed to connect to the AI: {}", e);
            close_socket(socket).await;
            state.calls.remove(&call_id);
            return;
        }
    };

    if let Err(e) =
        send_session_update(&ai_sink, &mut ai_events, call.metadata(), &state.realtime).await
    {
        error!(call_id = %call_id, "Session setup failed: {}", e);
        let _ = ai_sink.close().await;
        close_socket(socket).await;
        state.calls.remove(&call_id);
        return;
    }

    let (telephony_events, telephony_sink) = media_stream::split(socket);
    let channels = RelayChannels {
        telephony_events: Box::new(telephony_events),
        telephony_sink: Box::new(telephony_sink),
        ai_events: Box::new(ai_events),
        ai_sink: Box::new(ai_sink),
    };

    let orchestrator = StreamOrchestrator::new(state.records.clone(), state.timing.clone());
    let report = orchestrator.run(call, channels).await;
    if let Some(e) = &report.error {
        warn!(call_id = %call_id, ended_by = ?report.ended_by, "Relay ended with error: {}", e);
    }

    state.calls.remove(&call_id);
    info!(call_id = %call_id, "Media stream closed");
}
