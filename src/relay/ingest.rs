//! Telephony to AI direction.

use tracing::{debug, error, info, warn};

use crate::core::realtime::messages::ClientEvent;
use crate::core::telephony::messages::TelephonyEvent;

use super::error::RelayResult;
use super::session::SessionState;
use super::transport::{AiSink, TelephonySink, TelephonySource, TransportError};

/// Counters reported when the ingest pump ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub frames_forwarded: u64,
    pub frames_dropped: u64,
    /// The telephony side sent `stop` (as opposed to disconnecting)
    pub stopped: bool,
}

/// Reads the telephony media stream and feeds caller audio to the AI.
///
/// The only writer of the stream identity.
pub struct TelephonyIngestPump<'a> {
    session: &'a SessionState,
    telephony: &'a TelephonySink,
    ai_sink: &'a AiSink,
}

impl<'a> TelephonyIngestPump<'a> {
    pub fn new(
        session: &'a SessionState,
        telephony: &'a TelephonySink,
        ai_sink: &'a AiSink,
    ) -> Self {
        Self {
            session,
            telephony,
            ai_sink,
        }
    }

    /// Run until the caller's stream stops or the transport fails.
    pub async fn run(&self, events: &mut TelephonySource) -> RelayResult<IngestSummary> {
        let mut summary = IngestSummary::default();

        while let Some(next) = events.recv().await {
            let event = match next {
                Ok(event) => event,
                Err(e) if e.is_malformed() => {
                    warn!("Skipping malformed telephony frame: {}", e);
                    continue;
                }
                Err(e) => {
                    error!("Telephony stream failed: {}", e);
                    return Err(e.into());
                }
            };

            match event {
                TelephonyEvent::Start(start) => {
                    if self.session.stream().publish(&start.stream_sid) {
                        info!(
                            call_id = %self.session.call().call_id(),
                            stream_sid = %start.stream_sid,
                            "Incoming stream has started"
                        );
                    } else {
                        debug!(stream_sid = %start.stream_sid, "Ignoring repeated start event");
                    }
                }
                TelephonyEvent::Media(media) => {
                    self.session.observe_media_time(media.timestamp);
                    if self.forward_audio(media.payload).await? {
                        summary.frames_forwarded += 1;
                    } else {
                        summary.frames_dropped += 1;
                    }
                }
                TelephonyEvent::Stop => {
                    info!(call_id = %self.session.call().call_id(), "Telephony stream stopped");
                    if let Err(e) = self.telephony.close().await {
                        warn!("Failed to close telephony channel: {}", e);
                    }
                    summary.stopped = true;
                    break;
                }
                TelephonyEvent::Connected | TelephonyEvent::Mark(_) => {
                    debug!(event = event.name(), "Telephony event");
                }
                TelephonyEvent::Unrecognized(name) => {
                    debug!(event = %name, "Unrecognized telephony event");
                }
            }
        }

        if summary.frames_dropped > 0 {
            warn!(
                dropped = summary.frames_dropped,
                "Caller audio frames dropped while the AI channel was closed"
            );
        }
        Ok(summary)
    }

    /// Returns `false` if the frame was dropped because the AI channel is closed.
    async fn forward_audio(&self, payload: String) -> RelayResult<bool> {
        if !self.ai_sink.is_open() {
            debug!("AI channel closed, dropping caller audio frame");
            return Ok(false);
        }
        match self.ai_sink.send(&ClientEvent::audio_append(payload)).await {
            Ok(()) => Ok(true),
            Err(TransportError::Closed) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
