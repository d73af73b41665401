//! Configuration validation logic.

use std::path::PathBuf;

use url::Url;

use super::{ServerConfig, TlsConfig};

/// TLS paths are only meaningful as a pair.
pub(super) fn tls_from_paths(
    cert_path: Option<String>,
    key_path: Option<String>,
) -> Result<Option<TlsConfig>, String> {
    match (cert_path, key_path) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err("TLS certificate path is set but the key path is missing".into()),
        (None, Some(_)) => Err("TLS key path is set but the certificate path is missing".into()),
    }
}

/// The public domain is a bare host (optionally with port) used to build
/// `https://` and `wss://` URLs.
pub(super) fn validate_public_domain(domain: &Option<String>) -> Result<(), String> {
    let Some(domain) = domain else {
        return Ok(());
    };
    if domain.contains("://") {
        return Err(format!(
            "PUBLIC_DOMAIN must be a host name without a scheme, got '{domain}'"
        ));
    }
    Url::parse(&format!("https://{domain}"))
        .ok()
        .filter(|url| url.host_str().is_some() && url.path() == "/")
        .map(|_| ())
        .ok_or_else(|| format!("PUBLIC_DOMAIN is not a valid host name: '{domain}'"))
}

pub(super) fn validate_connect_attempts(attempts: u32) -> Result<(), String> {
    if attempts == 0 {
        return Err("AI_CONNECT_ATTEMPTS must be at least 1".into());
    }
    Ok(())
}

pub(super) fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_public_domain(&config.public_domain)?;
    validate_connect_attempts(config.ai_connect_attempts)?;
    if config.rate_limit_requests_per_second == 0 || config.rate_limit_burst_size == 0 {
        return Err("Rate limit values must be greater than zero".into());
    }
    Ok(())
}
