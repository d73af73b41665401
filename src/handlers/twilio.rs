//! Twilio voice webhooks.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::calls::{CallStatus, CompletionDetails};
use crate::core::telephony::stream_twiml;
use crate::state::AppState;

/// TwiML instructing Twilio to open the media stream for `call_id`.
pub async fn call_initiate(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    info!(call_id = %call_id, "Call answered, connecting media stream");
    let twiml = stream_twiml(&state.config.public_domain(), &call_id);
    debug!(call_id = %call_id, twiml = %twiml, "Call initiate response");
    ([(header::CONTENT_TYPE, "application/xml")], twiml)
}

/// Status callback. Publishes the reported status to the call's relay.
pub async fn call_completed(
    State(state): State<Arc<AppState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<Value> {
    let call_sid = form.get("CallSid").cloned().unwrap_or_default();
    let status = CallStatus::parse(form.get("CallStatus").map(String::as_str).unwrap_or(""));
    info!(twilio_call_sid = %call_sid, status = %status, "Call status webhook");

    let completion = status
        .is_post_call()
        .then(|| CompletionDetails::from_form(&form));
    match state.calls.update_status(&call_sid, status, completion) {
        Some(call_id) => {
            debug!(call_id = %call_id, "Call status published");
            Json(json!({ "status": "received" }))
        }
        None => {
            warn!(twilio_call_sid = %call_sid, "Status webhook for unknown call");
            Json(json!({ "status": "error", "message": "Call not found." }))
        }
    }
}
