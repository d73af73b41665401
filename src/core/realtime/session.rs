//! Initial `session.update` sent before the relay starts.

use tracing::{debug, warn};

use crate::calls::CallMetadata;
use crate::relay::tools::tool_definitions;
use crate::relay::transport::{AiSink, AiSource};

use super::config::{RealtimeSettings, TELEPHONY_AUDIO_FORMAT};
use super::error::{RealtimeError, RealtimeResult};
use super::instructions::build_instructions;
use super::messages::{ClientEvent, ServerEvent, SessionConfig, TurnDetection};

/// Session configuration for one call.
pub fn build_session_update(call: &CallMetadata, settings: &RealtimeSettings) -> ClientEvent {
    ClientEvent::SessionUpdate {
        session: SessionConfig {
            turn_detection: Some(TurnDetection::ServerVad {
                threshold: Some(0.3),
                prefix_padding_ms: Some(1000),
                silence_duration_ms: Some(700),
                create_response: Some(true),
            }),
            input_audio_format: Some(TELEPHONY_AUDIO_FORMAT.to_string()),
            output_audio_format: Some(TELEPHONY_AUDIO_FORMAT.to_string()),
            voice: Some(settings.voice.clone()),
            instructions: Some(build_instructions(call)),
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            temperature: Some(0.8),
            tools: Some(tool_definitions()),
            tool_choice: Some("auto".to_string()),
        },
    }
}

/// Send the session configuration and read its acknowledgement.
///
/// Returns the acknowledging event.
pub async fn send_session_update(
    ai_sink: &AiSink,
    ai_events: &mut AiSource,
    call: &CallMetadata,
    settings: &RealtimeSettings,
) -> RealtimeResult<ServerEvent> {
    if !ai_sink.is_open() {
        return Err(RealtimeError::NotConnected);
    }

    ai_sink
        .send(&build_session_update(call, settings))
        .await
        .map_err(|e| RealtimeError::WebSocketError(e.to_string()))?;
    debug!(call_id = %call.call_id, "Session update sent");

    match ai_events.recv().await {
        Some(Ok(ServerEvent::Error { error })) => {
            warn!("Session update rejected: {}", error.message);
            Err(RealtimeError::SessionError(error.message))
        }
        Some(Ok(event)) => {
            debug!(event = event.name(), "Session update acknowledged");
            Ok(event)
        }
        Some(Err(e)) => Err(RealtimeError::WebSocketError(e.to_string())),
        None => Err(RealtimeError::NotConnected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::messages::{ApiError, Session};
    use crate::relay::memory;
    use crate::relay::transport::EventSource;
    use serde_json::Value;

    #[test]
    fn test_session_update_shape() {
        let event = build_session_update(
            &CallMetadata::for_tests("call-1"),
            &RealtimeSettings::new("sk-test"),
        );
        let value: Value = serde_json::to_value(&event).unwrap();
        let session = &value["session"];

        assert_eq!(value["type"], "session.update");
        assert_eq!(session["turn_detection"]["type"], "server_vad");
        assert_eq!(session["turn_detection"]["silence_duration_ms"], 700);
        assert_eq!(session["input_audio_format"], "g711_ulaw");
        assert_eq!(session["output_audio_format"], "g711_ulaw");
        assert_eq!(session["voice"], "alloy");
        assert_eq!(session["tool_choice"], "auto");
        assert_eq!(session["tools"].as_array().unwrap().len(), 3);
        assert!(session["instructions"].as_str().unwrap().contains("Dana"));
    }

    #[tokio::test]
    async fn test_send_reads_one_ack() {
        let (sink, probe) = memory::sink::<ClientEvent>();
        let (feeder, mut events) = memory::source();
        feeder.push(ServerEvent::SessionUpdated {
            session: Some(Session::default()),
        });
        feeder.push(ServerEvent::SpeechTooQuiet);

        let ack = send_session_update(
            &sink,
            &mut events,
            &CallMetadata::for_tests("call-1"),
            &RealtimeSettings::new("sk-test"),
        )
        .await
        .unwrap();

        assert_eq!(ack.name(), "session.updated");
        assert_eq!(probe.sent().len(), 1);
        assert_eq!(events.recv().await, Some(Ok(ServerEvent::SpeechTooQuiet)));
    }

    #[tokio::test]
    async fn test_rejected_update_is_an_error() {
        let (sink, _probe) = memory::sink::<ClientEvent>();
        let (feeder, mut events) = memory::source();
        feeder.push(ServerEvent::Error {
            error: ApiError {
                message: "bad voice".to_string(),
                ..Default::default()
            },
        });

        let result = send_session_update(
            &sink,
            &mut events,
            &CallMetadata::for_tests("call-1"),
            &RealtimeSettings::new("sk-test"),
        )
        .await;
        assert_eq!(result, Err(RealtimeError::SessionError("bad voice".to_string())));
    }
}
