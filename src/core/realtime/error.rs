//! Errors and retry policy for the AI realtime connection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while establishing or configuring the realtime session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Session error
    #[error("Session error: {0}")]
    SessionError(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Bounded exponential backoff used when opening the realtime socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total connection attempts, including the first.
    /// Default: 5
    pub max_attempts: u32,

    /// Delay after the first failed attempt (milliseconds).
    /// Default: 1000ms
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay (milliseconds).
    /// Default: 30000ms
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff.
    /// Default: 1.5
    pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 1.5,
        }
    }
}

impl RetryConfig {
    /// Delay in milliseconds after failed attempt number `attempt` (1-based).
    pub fn calculate_delay(&self, attempt: u32) -> u64 {
        let base_delay = self.initial_delay_ms as f64;
        let multiplier = self.backoff_multiplier as f64;

        // base_delay * multiplier^(attempt-1)
        let delay = base_delay * multiplier.powi(attempt.saturating_sub(1) as i32);
        delay.min(self.max_delay_ms as f64) as u64
    }

    /// Whether another attempt is allowed after `attempt` attempts were made.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
