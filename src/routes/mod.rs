pub mod api;
pub mod twilio;

use std::sync::Arc;

use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::state::AppState;

/// All routes with shared state and security headers applied.
///
/// Rate limiting is layered on in `main`, where peer addresses are available.
pub fn create_router(state: Arc<AppState>) -> Router {
    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            http::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_FRAME_OPTIONS,
            http::HeaderValue::from_static("DENY"),
        ));

    api::create_api_router()
        .merge(twilio::create_twilio_router())
        .with_state(state)
        .layer(security_headers)
}
