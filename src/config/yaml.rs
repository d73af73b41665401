//! YAML configuration file support
//!
//! Every field is optional; anything left out falls back to the environment.
//!
//! # Example YAML structure
//! ```yaml
//! server:
//!   host: "0.0.0.0"
//!   port: 3001
//!   public_domain: "agent.example.com"
//!   tls:
//!     enabled: true
//!     cert_path: "/etc/certs/server.crt"
//!     key_path: "/etc/certs/server.key"
//!
//! openai:
//!   api_key: "sk-..."
//!   model: "gpt-4o-realtime-preview"
//!   voice: "alloy"
//!   connect_attempts: 5
//!   connect_backoff_ms: 1000
//!   connect_backoff_multiplier: 1.5
//!
//! twilio:
//!   account_sid: "AC..."
//!   auth_token: "..."
//!   phone_number: "+15550100"
//!
//! records:
//!   dir: "/var/lib/voice-agent"
//!
//! security:
//!   rate_limit_requests_per_second: 60
//!   rate_limit_burst_size: 10
//!
//! relay:
//!   post_call_enabled: true
//!   post_call_status_wait_secs: 30
//!   post_call_pause_secs: 5
//!   tool_pacing_ms: 1000
//!   interruption_debounce_ms: 10
//! ```

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub openai: Option<OpenAiYaml>,
    pub twilio: Option<TwilioYaml>,
    pub records: Option<RecordsYaml>,
    pub security: Option<SecurityYaml>,
    pub relay: Option<RelayYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_domain: Option<String>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAiYaml {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub connect_attempts: Option<u32>,
    pub connect_backoff_ms: Option<u64>,
    pub connect_backoff_multiplier: Option<f32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TwilioYaml {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub phone_number: Option<String>,
    pub api_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RecordsYaml {
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: Option<u32>,
}

/// Relay pacing from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RelayYaml {
    pub post_call_enabled: Option<bool>,
    pub post_call_status_wait_secs: Option<u64>,
    pub post_call_pause_secs: Option<u64>,
    pub tool_pacing_ms: Option<u64>,
    pub interruption_debounce_ms: Option<u64>,
}

impl YamlConfig {
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
