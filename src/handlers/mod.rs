//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `calls` - Outbound call placement
//! - `twilio` - Twilio voice webhooks (TwiML and call status)
//! - `stream` - Twilio media stream WebSocket

pub mod api;
pub mod calls;
pub mod stream;
pub mod twilio;

pub use stream::call_stream_handler;
