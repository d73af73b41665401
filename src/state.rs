use std::sync::Arc;

use tracing::{info, warn};

use crate::calls::CallRegistry;
use crate::config::ServerConfig;
use crate::core::realtime::RealtimeSettings;
use crate::core::telephony::TwilioClient;
use crate::records::{CallRecordStore, FileRecordStore};
use crate::relay::RelayTiming;

/// Shared application state handed to every handler.
pub struct AppState {
    pub config: ServerConfig,
    pub calls: CallRegistry,
    pub twilio: TwilioClient,
    pub records: Arc<dyn CallRecordStore>,
    pub realtime: RealtimeSettings,
    pub timing: RelayTiming,
}

impl AppState {
    pub async fn new(config: ServerConfig) -> Arc<Self> {
        if let Err(e) = tokio::fs::create_dir_all(&config.records_dir).await {
            warn!(
                dir = %config.records_dir.display(),
                "Failed to create records directory: {}", e
            );
        }
        let records: Arc<dyn CallRecordStore> =
            Arc::new(FileRecordStore::new(config.records_dir.clone()));
        Self::with_records(config, records)
    }

    /// Build the state around a caller-supplied record store.
    pub fn with_records(config: ServerConfig, records: Arc<dyn CallRecordStore>) -> Arc<Self> {
        let twilio_settings = config.twilio_settings();
        if !twilio_settings.is_configured() {
            warn!("Twilio credentials are not configured; POST /call will fail");
        }
        if config.openai_api_key.is_none() {
            warn!("OPENAI_API_KEY is not set; media streams cannot reach the AI");
        }
        info!(
            public_domain = %config.public_domain(),
            model = %config.openai_realtime_model,
            "Application state initialised"
        );

        Arc::new(Self {
            calls: CallRegistry::new(),
            twilio: TwilioClient::new(twilio_settings),
            records,
            realtime: config.realtime_settings(),
            timing: config.relay_timing(),
            config,
        })
    }
}
