//! OpenAI Realtime API integration.
//!
//! - [`messages`]: client and server event types
//! - [`socket`]: WebSocket transport and connection retry
//! - [`session`]: initial session configuration
//! - [`instructions`]: assistant persona built from the call metadata

pub mod config;
pub mod error;
pub mod instructions;
pub mod messages;
pub mod session;
pub mod socket;

pub use config::{
    DEFAULT_REALTIME_MODEL, DEFAULT_REALTIME_VOICE, OPENAI_REALTIME_URL, RealtimeSettings,
};
pub use error::{RealtimeError, RealtimeResult, RetryConfig};
pub use messages::{ClientEvent, ServerEvent};
pub use session::{build_session_update, send_session_update};
pub use socket::{AiCommandSink, AiEventStream, connect_with_retry};
