//! Twilio webhook and media stream routes.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{stream::call_stream_handler, twilio};
use crate::state::AppState;
use std::sync::Arc;

/// Create the Twilio router
///
/// # Endpoints
///
/// - `POST /twilio/call-initiate/{call_id}` - TwiML connecting the call to the media stream
/// - `POST /twilio/call-completed` - call status callback (form encoded)
/// - `GET /call-stream/{call_id}` - WebSocket upgrade for the media stream
pub fn create_twilio_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/twilio/call-initiate/{call_id}", post(twilio::call_initiate))
        .route("/twilio/call-completed", post(twilio::call_completed))
        .route("/call-stream/{call_id}", get(call_stream_handler))
        .layer(TraceLayer::new_for_http())
}
