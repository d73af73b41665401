//! Configuration module for the voice agent server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Applying YAML overrides on top of the environment
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use waav_voice_agent::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::core::realtime::{
    DEFAULT_REALTIME_MODEL, DEFAULT_REALTIME_VOICE, RealtimeSettings, RetryConfig,
};
use crate::core::telephony::TwilioSettings;
use crate::core::telephony::twilio::TWILIO_API_BASE_URL;
use crate::relay::RelayTiming;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    /// TLS configuration (optional)
    pub tls: Option<TlsConfig>,
    /// Public host name used in webhook and media stream URLs (no scheme)
    pub public_domain: Option<String>,

    // OpenAI realtime
    pub openai_api_key: Option<String>,
    /// Default: gpt-4o-realtime-preview
    pub openai_realtime_model: String,
    /// Default: alloy
    pub openai_realtime_voice: String,
    /// Total connection attempts to the realtime API
    /// Default: 5
    pub ai_connect_attempts: u32,
    /// Delay after the first failed attempt
    /// Default: 1000
    pub ai_connect_backoff_ms: u64,
    /// Default: 1.5
    pub ai_connect_backoff_multiplier: f32,

    // Twilio
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_phone_number: Option<String>,
    /// Default: https://api.twilio.com
    pub twilio_api_base_url: String,

    /// Directory for appointments.json and call summaries
    /// Default: "."
    pub records_dir: PathBuf,

    // Rate limiting
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Default: 10
    pub rate_limit_burst_size: u32,

    // Relay pacing
    /// Default: true
    pub post_call_enabled: bool,
    /// Default: 30
    pub post_call_status_wait_secs: u64,
    /// Default: 5
    pub post_call_pause_secs: u64,
    /// Default: 1000
    pub tool_pacing_ms: u64,
    /// Default: 10
    pub interruption_debounce_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            tls: None,
            public_domain: None,
            openai_api_key: None,
            openai_realtime_model: DEFAULT_REALTIME_MODEL.to_string(),
            openai_realtime_voice: DEFAULT_REALTIME_VOICE.to_string(),
            ai_connect_attempts: 5,
            ai_connect_backoff_ms: 1000,
            ai_connect_backoff_multiplier: 1.5,
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_phone_number: None,
            twilio_api_base_url: TWILIO_API_BASE_URL.to_string(),
            records_dir: PathBuf::from("."),
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            post_call_enabled: true,
            post_call_status_wait_secs: 30,
            post_call_pause_secs: 5,
            tool_pacing_ms: 1000,
            interruption_debounce_ms: 10,
        }
    }
}

/// Zeroize secret fields when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut token) = self.twilio_auth_token {
            token.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// The .env file is loaded in `main` before this is called.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Server address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Public domain for webhook URLs, falling back to the bind address.
    pub fn public_domain(&self) -> String {
        self.public_domain
            .clone()
            .unwrap_or_else(|| self.address())
    }

    /// Connection settings for the realtime API.
    pub fn realtime_settings(&self) -> RealtimeSettings {
        let mut settings = RealtimeSettings::new(self.openai_api_key.clone().unwrap_or_default());
        settings.model = self.openai_realtime_model.clone();
        settings.voice = self.openai_realtime_voice.clone();
        settings.retry = RetryConfig {
            max_attempts: self.ai_connect_attempts,
            initial_delay_ms: self.ai_connect_backoff_ms,
            backoff_multiplier: self.ai_connect_backoff_multiplier,
            ..RetryConfig::default()
        };
        settings
    }

    pub fn twilio_settings(&self) -> TwilioSettings {
        TwilioSettings {
            account_sid: self.twilio_account_sid.clone().unwrap_or_default(),
            auth_token: self.twilio_auth_token.clone().unwrap_or_default(),
            phone_number: self.twilio_phone_number.clone().unwrap_or_default(),
            api_base_url: self.twilio_api_base_url.clone(),
        }
    }

    pub fn relay_timing(&self) -> RelayTiming {
        RelayTiming {
            interruption_debounce: Duration::from_millis(self.interruption_debounce_ms),
            tool_pacing: Duration::from_millis(self.tool_pacing_ms),
            post_call_enabled: self.post_call_enabled,
            post_call_status_wait: Duration::from_secs(self.post_call_status_wait_secs),
            post_call_pause: Duration::from_secs(self.post_call_pause_secs),
            ..RelayTiming::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    const ENV_KEYS: &[&str] = &[
        "HOST",
        "PORT",
        "TLS_CERT_PATH",
        "TLS_KEY_PATH",
        "PUBLIC_DOMAIN",
        "OPENAI_API_KEY",
        "OPENAI_REALTIME_MODEL",
        "OPENAI_REALTIME_VOICE",
        "TWILIO_ACCOUNT_SID",
        "TWILIO_AUTH_TOKEN",
        "TWILIO_PHONE_NUMBER",
        "TWILIO_API_BASE_URL",
        "RECORDS_DIR",
        "AI_CONNECT_ATTEMPTS",
        "AI_CONNECT_BACKOFF_MS",
        "AI_CONNECT_BACKOFF_MULTIPLIER",
        "RATE_LIMIT_REQUESTS_PER_SECOND",
        "RATE_LIMIT_BURST_SIZE",
        "POST_CALL_ENABLED",
        "POST_CALL_STATUS_WAIT_SECS",
        "POST_CALL_PAUSE_SECS",
        "TOOL_PACING_MS",
        "INTERRUPTION_DEBOUNCE_MS",
    ];

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        for key in ENV_KEYS {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3001);
        assert!(config.tls.is_none());
        assert_eq!(config.openai_realtime_model, "gpt-4o-realtime-preview");
        assert_eq!(config.openai_realtime_voice, "alloy");
        assert_eq!(config.twilio_api_base_url, "https://api.twilio.com");
        assert_eq!(config.records_dir, PathBuf::from("."));
        assert_eq!(config.ai_connect_attempts, 5);
        assert_eq!(config.rate_limit_requests_per_second, 60);
        assert_eq!(config.rate_limit_burst_size, 10);
        assert!(config.post_call_enabled);
        assert_eq!(config.relay_timing(), RelayTiming::default());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_values() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "8443");
            env::set_var("PUBLIC_DOMAIN", "agent.example.com");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("POST_CALL_ENABLED", "false");
            env::set_var("TOOL_PACING_MS", "250");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 8443);
        assert_eq!(config.public_domain(), "agent.example.com");
        assert_eq!(config.realtime_settings().api_key, "sk-env");
        let timing = config.relay_timing();
        assert!(!timing.post_call_enabled);
        assert_eq!(timing.tool_pacing, Duration::from_millis(250));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "not-a-port");
        }

        let result = ServerConfig::from_env();
        assert!(result.unwrap_err().to_string().contains("PORT"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_scheme_in_domain() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PUBLIC_DOMAIN", "https://agent.example.com");
        }

        assert!(ServerConfig::from_env().is_err());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080
  public_domain: "yaml.example.com"

openai:
  api_key: "sk-yaml"
  voice: "verse"
  connect_attempts: 3

relay:
  tool_pacing_ms: 0
"#;
        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("TWILIO_ACCOUNT_SID", "AC-env");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-yaml"));
        // ENV value kept where YAML is silent
        assert_eq!(config.twilio_account_sid.as_deref(), Some("AC-env"));

        let settings = config.realtime_settings();
        assert_eq!(settings.voice, "verse");
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(config.relay_timing().tool_pacing, Duration::ZERO);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    #[serial]
    fn test_from_file_tls_requires_both_paths() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            "server:\n  tls:\n    enabled: true\n    cert_path: \"/certs/cert.pem\"\n",
        )
        .unwrap();

        assert!(ServerConfig::from_file(&config_path).is_err());
    }

    #[test]
    #[serial]
    fn test_twilio_settings_from_config() {
        cleanup_env_vars();
        unsafe {
            env::set_var("TWILIO_ACCOUNT_SID", "AC123");
            env::set_var("TWILIO_AUTH_TOKEN", "token");
            env::set_var("TWILIO_PHONE_NUMBER", "+15550001");
        }

        let config = ServerConfig::from_env().unwrap();
        let twilio = config.twilio_settings();
        assert!(twilio.is_configured());
        assert_eq!(twilio.api_base_url, "https://api.twilio.com");

        cleanup_env_vars();
    }
}
