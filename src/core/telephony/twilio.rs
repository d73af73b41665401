//! Twilio REST client and TwiML for outbound calls.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Default Twilio REST API base URL.
pub const TWILIO_API_BASE_URL: &str = "https://api.twilio.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum TwilioError {
    #[error("Twilio request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Twilio API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode Twilio response: {0}")]
    Decode(String),

    #[error("Twilio credentials are not configured")]
    MissingCredentials,
}

/// Account credentials and caller id.
#[derive(Clone, Default)]
pub struct TwilioSettings {
    pub account_sid: String,
    pub auth_token: String,
    /// E.164 number calls are placed from
    pub phone_number: String,
    pub api_base_url: String,
}

impl TwilioSettings {
    pub fn is_configured(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.phone_number.is_empty()
    }
}

impl fmt::Debug for TwilioSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioSettings")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("phone_number", &self.phone_number)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// Call resource returned by `Calls.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedCall {
    pub sid: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Minimal client for placing outbound calls.
pub struct TwilioClient {
    settings: TwilioSettings,
    /// Pooled HTTP client for connection reuse
    client: reqwest::Client,
}

impl TwilioClient {
    pub fn new(settings: TwilioSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }

    pub fn settings(&self) -> &TwilioSettings {
        &self.settings
    }

    /// Place a call to `to`. Twilio fetches TwiML for the call from the
    /// call-initiate webhook and reports completion to the status webhook.
    pub async fn create_call(
        &self,
        to: &str,
        call_id: &str,
        public_domain: &str,
    ) -> Result<CreatedCall, TwilioError> {
        if !self.settings.is_configured() {
            return Err(TwilioError::MissingCredentials);
        }

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.settings.api_base_url.trim_end_matches('/'),
            self.settings.account_sid
        );
        let twiml_url = format!("https://{public_domain}/twilio/call-initiate/{call_id}");
        let status_url = format!("https://{public_domain}/twilio/call-completed");

        debug!(call_id, to, "Placing outbound call");

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .form(&[
                ("To", to),
                ("From", self.settings.phone_number.as_str()),
                ("Url", twiml_url.as_str()),
                ("StatusCallback", status_url.as_str()),
                ("StatusCallbackEvent", "completed"),
                ("StatusCallbackMethod", "POST"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or(body);
            return Err(TwilioError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let call: CreatedCall =
            serde_json::from_str(&body).map_err(|e| TwilioError::Decode(e.to_string()))?;
        info!(call_id, twilio_call_sid = %call.sid, status = %call.status, "Outbound call created");
        Ok(call)
    }
}

/// TwiML connecting the answered call to the media stream endpoint.
pub fn stream_twiml(public_domain: &str, call_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response><Connect><Stream url="wss://{public_domain}/call-stream/{call_id}"/></Connect></Response>"#
    )
}
