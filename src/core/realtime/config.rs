//! Settings for the OpenAI realtime connection.

use std::fmt;

use super::error::RetryConfig;

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Default realtime model.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview";

/// Default assistant voice.
pub const DEFAULT_REALTIME_VOICE: &str = "alloy";

/// Audio format shared with the telephony media stream (8 kHz mu-law).
pub const TELEPHONY_AUDIO_FORMAT: &str = "g711_ulaw";

/// Everything needed to open and configure one realtime session.
#[derive(Clone)]
pub struct RealtimeSettings {
    pub api_key: String,
    /// Base WebSocket URL without query string
    pub url: String,
    pub model: String,
    pub voice: String,
    pub retry: RetryConfig,
}

impl RealtimeSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            url: OPENAI_REALTIME_URL.to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
            voice: DEFAULT_REALTIME_VOICE.to_string(),
            retry: RetryConfig::default(),
        }
    }

    /// Full connection URL including the model parameter.
    pub fn ws_url(&self) -> String {
        format!("{}?model={}", self.url, self.model)
    }
}

impl fmt::Debug for RealtimeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeSettings")
            .field("api_key", &"<redacted>")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("retry", &self.retry)
            .finish()
    }
}
