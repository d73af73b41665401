//! `POST /call`: place an outbound call.

use std::sync::Arc;

use axum::{Json, extract::State};
use tracing::info;
use uuid::Uuid;

use crate::calls::{ActiveCall, CallMetadata, CallRequest, CallStatus};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

pub async fn make_call(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CallRequest>,
) -> AppResult<Json<ActiveCall>> {
    if request.phone_number.trim().is_empty() {
        return Err(AppError::BadRequest("phone_number is required".to_string()));
    }
    let Some(domain) = state.config.public_domain.clone() else {
        return Err(AppError::NotConfigured("PUBLIC_DOMAIN is not set".to_string()));
    };

    let call_id = Uuid::new_v4().to_string();
    let created = state
        .twilio
        .create_call(&request.phone_number, &call_id, &domain)
        .await?;

    let call_status = CallStatus::parse(&created.status);
    let metadata = CallMetadata::from_request(call_id.clone(), created.sid, request);
    state.calls.register(metadata.clone(), call_status.clone());
    info!(call_id = %call_id, status = %call_status, "Call initiated");

    Ok(Json(ActiveCall {
        metadata,
        call_status,
    }))
}
