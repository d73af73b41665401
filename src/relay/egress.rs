//! AI to telephony direction.

use std::sync::Arc;

use base64::prelude::*;
use tracing::{debug, error, info, warn};

use crate::core::realtime::messages::ServerEvent;
use crate::core::telephony::messages::TelephonyCommand;
use crate::records::CallRecordStore;

use super::error::{RelayError, RelayResult};
use super::events::AiEventQueue;
use super::interruption::InterruptionController;
use super::session::{SessionState, SpeechTurn};
use super::timing::RelayTiming;
use super::tools::{ToolDispatcher, deliver_outputs};
use super::transport::{AiSink, TelephonySink, TransportError};

/// Reads AI events and plays assistant audio to the caller.
///
/// Owns the [`SpeechTurn`] and every read of the AI stream. Acknowledgement
/// reads by the interruption controller and tool output delivery go through
/// the same [`AiEventQueue`], so events they pass over come back here.
pub struct AiEgressPump<'a> {
    session: &'a SessionState,
    telephony: &'a TelephonySink,
    ai_sink: &'a AiSink,
    records: Arc<dyn CallRecordStore>,
    timing: &'a RelayTiming,
}

impl<'a> AiEgressPump<'a> {
    pub fn new(
        session: &'a SessionState,
        telephony: &'a TelephonySink,
        ai_sink: &'a AiSink,
        records: Arc<dyn CallRecordStore>,
        timing: &'a RelayTiming,
    ) -> Self {
        Self {
            session,
            telephony,
            ai_sink,
            records,
            timing,
        }
    }

    /// Wait for the stream identity, then relay AI events until the AI stream
    /// ends or fails.
    pub async fn run(&self, events: &mut AiEventQueue) -> RelayResult<()> {
        let stream_sid = self.session.stream().ready().await;
        debug!(stream_sid = %stream_sid, "Egress pump ready");

        let interruptions = InterruptionController::new(
            self.ai_sink,
            self.telephony,
            self.timing.interruption_debounce,
        );
        let dispatcher = ToolDispatcher::new(
            self.session,
            self.records.clone(),
            Some(self.telephony),
            self.timing.tool_pacing,
            self.timing.hangup_grace,
        );
        let mut turn = SpeechTurn::default();

        while let Some(next) = events.recv().await {
            let event = match next {
                Ok(event) => event,
                Err(e) => {
                    error!("AI stream failed: {}", e);
                    return Err(e.into());
                }
            };

            match event {
                ServerEvent::Error { error } => {
                    error!(
                        error_type = %error.error_type,
                        code = ?error.code,
                        "AI reported an error: {}",
                        error.message
                    );
                }
                ServerEvent::ResponseDone { response } => {
                    debug!(response_id = ?response.id, "Response done");
                    let outputs = dispatcher.dispatch(&response).await;
                    deliver_outputs(self.ai_sink, events, outputs).await?;
                    turn.clear();
                }
                ServerEvent::AudioDelta { item_id, delta, .. } => {
                    self.play_fragment(&stream_sid, &delta).await?;
                    if turn.track_fragment(&item_id, self.session.latest_media_time()) {
                        debug!(
                            item_id = %item_id,
                            response_start_time = ?turn.response_start_time,
                            "Assistant turn started"
                        );
                    }
                }
                ServerEvent::SpeechStarted { .. } => {
                    info!("Caller speech started");
                    interruptions
                        .on_speech_started(
                            &mut turn,
                            self.session.latest_media_time(),
                            events,
                            &stream_sid,
                        )
                        .await;
                }
                ServerEvent::SpeechStopped { .. } => debug!("Caller speech stopped"),
                ServerEvent::SpeechTooQuiet => debug!("Caller speech too quiet"),
                other => debug!(event = other.name(), "AI event"),
            }
        }

        info!("AI stream ended");
        Ok(())
    }

    /// Forward one audio fragment, dropping it if the call can no longer hear it.
    async fn play_fragment(&self, stream_sid: &str, delta: &str) -> RelayResult<()> {
        let audio = ServerEvent::decode_audio_delta(delta)
            .map_err(|e| RelayError::Malformed(format!("audio delta is not base64: {e}")))?;

        if !self.session.call_active() {
            debug!("Call ended, dropping assistant audio");
            return Ok(());
        }
        if !self.telephony.is_open() {
            warn!("Telephony channel is closed, dropping assistant audio");
            return Ok(());
        }

        let command = TelephonyCommand::media(stream_sid, BASE64_STANDARD.encode(&audio));
        match self.telephony.send(&command).await {
            Ok(()) => {
                debug!(bytes = audio.len(), "Forwarded assistant audio");
                Ok(())
            }
            Err(TransportError::Closed) => {
                warn!("Telephony channel closed while sending assistant audio");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
