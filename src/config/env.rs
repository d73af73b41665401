//! Environment variable loading.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::ServerConfig;
use super::validation::tls_from_paths;

/// Read a variable, treating empty values as unset.
pub(super) fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(name: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| format!("Invalid value for {name}: '{raw}' ({e})")),
        None => Ok(default),
    }
}

pub(super) fn parse_bool(name: &str, raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("Invalid boolean for {name}: '{raw}'")),
    }
}

fn env_bool(name: &str, default: bool) -> Result<bool, String> {
    match env_var(name) {
        Some(raw) => parse_bool(name, &raw),
        None => Ok(default),
    }
}

/// Build a configuration from environment variables and defaults.
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = ServerConfig::default();

    if let Some(host) = env_var("HOST") {
        config.host = host;
    }
    config.port = env_parse("PORT", config.port)?;
    config.tls = tls_from_paths(env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH"))?;
    config.public_domain = env_var("PUBLIC_DOMAIN");

    config.openai_api_key = env_var("OPENAI_API_KEY");
    if let Some(model) = env_var("OPENAI_REALTIME_MODEL") {
        config.openai_realtime_model = model;
    }
    if let Some(voice) = env_var("OPENAI_REALTIME_VOICE") {
        config.openai_realtime_voice = voice;
    }
    config.ai_connect_attempts = env_parse("AI_CONNECT_ATTEMPTS", config.ai_connect_attempts)?;
    config.ai_connect_backoff_ms =
        env_parse("AI_CONNECT_BACKOFF_MS", config.ai_connect_backoff_ms)?;
    config.ai_connect_backoff_multiplier = env_parse(
        "AI_CONNECT_BACKOFF_MULTIPLIER",
        config.ai_connect_backoff_multiplier,
    )?;

    config.twilio_account_sid = env_var("TWILIO_ACCOUNT_SID");
    config.twilio_auth_token = env_var("TWILIO_AUTH_TOKEN");
    config.twilio_phone_number = env_var("TWILIO_PHONE_NUMBER");
    if let Some(url) = env_var("TWILIO_API_BASE_URL") {
        config.twilio_api_base_url = url;
    }

    if let Some(dir) = env_var("RECORDS_DIR") {
        config.records_dir = PathBuf::from(dir);
    }

    config.rate_limit_requests_per_second = env_parse(
        "RATE_LIMIT_REQUESTS_PER_SECOND",
        config.rate_limit_requests_per_second,
    )?;
    config.rate_limit_burst_size =
        env_parse("RATE_LIMIT_BURST_SIZE", config.rate_limit_burst_size)?;

    config.post_call_enabled = env_bool("POST_CALL_ENABLED", config.post_call_enabled)?;
    config.post_call_status_wait_secs =
        env_parse("POST_CALL_STATUS_WAIT_SECS", config.post_call_status_wait_secs)?;
    config.post_call_pause_secs = env_parse("POST_CALL_PAUSE_SECS", config.post_call_pause_secs)?;
    config.tool_pacing_ms = env_parse("TOOL_PACING_MS", config.tool_pacing_ms)?;
    config.interruption_debounce_ms =
        env_parse("INTERRUPTION_DEBOUNCE_MS", config.interruption_debounce_ms)?;

    Ok(config)
}
