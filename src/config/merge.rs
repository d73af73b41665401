//! Applying YAML overrides on top of the environment configuration.

use std::path::PathBuf;

use super::ServerConfig;
use super::env::load_from_env;
use super::validation::tls_from_paths;
use super::yaml::YamlConfig;

/// Environment (with defaults) as the base, YAML values on top.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if server.public_domain.is_some() {
            config.public_domain = server.public_domain;
        }
        if let Some(tls) = server.tls {
            if tls.enabled == Some(false) {
                config.tls = None;
            } else if tls.cert_path.is_some() || tls.key_path.is_some() || tls.enabled == Some(true)
            {
                config.tls = tls_from_paths(tls.cert_path, tls.key_path)?;
                if config.tls.is_none() {
                    return Err("TLS is enabled but cert_path and key_path are missing".into());
                }
            }
        }
    }

    if let Some(openai) = yaml.openai {
        if openai.api_key.is_some() {
            config.openai_api_key = openai.api_key;
        }
        if let Some(model) = openai.model {
            config.openai_realtime_model = model;
        }
        if let Some(voice) = openai.voice {
            config.openai_realtime_voice = voice;
        }
        if let Some(attempts) = openai.connect_attempts {
            config.ai_connect_attempts = attempts;
        }
        if let Some(backoff) = openai.connect_backoff_ms {
            config.ai_connect_backoff_ms = backoff;
        }
        if let Some(multiplier) = openai.connect_backoff_multiplier {
            config.ai_connect_backoff_multiplier = multiplier;
        }
    }

    if let Some(twilio) = yaml.twilio {
        if twilio.account_sid.is_some() {
            config.twilio_account_sid = twilio.account_sid;
        }
        if twilio.auth_token.is_some() {
            config.twilio_auth_token = twilio.auth_token;
        }
        if twilio.phone_number.is_some() {
            config.twilio_phone_number = twilio.phone_number;
        }
        if let Some(url) = twilio.api_base_url {
            config.twilio_api_base_url = url;
        }
    }

    if let Some(dir) = yaml.records.and_then(|records| records.dir) {
        config.records_dir = PathBuf::from(dir);
    }

    if let Some(security) = yaml.security {
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
    }

    if let Some(relay) = yaml.relay {
        if let Some(enabled) = relay.post_call_enabled {
            config.post_call_enabled = enabled;
        }
        if let Some(wait) = relay.post_call_status_wait_secs {
            config.post_call_status_wait_secs = wait;
        }
        if let Some(pause) = relay.post_call_pause_secs {
            config.post_call_pause_secs = pause;
        }
        if let Some(pacing) = relay.tool_pacing_ms {
            config.tool_pacing_ms = pacing;
        }
        if let Some(debounce) = relay.interruption_debounce_ms {
            config.interruption_debounce_ms = debounce;
        }
    }

    Ok(config)
}
