use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, calls};
use crate::state::AppState;
use std::sync::Arc;

/// Health check and call placement.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/call", post(calls::make_call))
        .layer(TraceLayer::new_for_http())
}
