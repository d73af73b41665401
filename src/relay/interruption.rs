//! Barge-in truncation protocol.
//!
//! When the caller starts talking over the assistant, the in-flight assistant
//! item is truncated at the point the caller actually heard, and telephony is
//! told to drop whatever audio it still has queued.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::realtime::messages::{ClientEvent, ServerEvent};
use crate::core::telephony::messages::TelephonyCommand;

use super::events::{Ack, AiEventQueue};
use super::session::SpeechTurn;
use super::transport::{AiSink, TelephonySink};

/// Compute the truncation offset of the in-flight turn.
///
/// Returns `None` when Idle. Negative elapsed time (clock skew between the two
/// transports) clamps to 0.
pub fn truncation_offset(turn: &SpeechTurn, latest_media_time: u64) -> Option<u32> {
    if !turn.is_speaking() {
        return None;
    }
    let started = turn.response_start_time?;
    let elapsed = latest_media_time.saturating_sub(started);
    Some(u32::try_from(elapsed).unwrap_or(u32::MAX))
}

/// Truncates the assistant turn on barge-in.
pub struct InterruptionController<'a> {
    ai_sink: &'a AiSink,
    telephony: &'a TelephonySink,
    debounce: Duration,
}

impl<'a> InterruptionController<'a> {
    pub fn new(ai_sink: &'a AiSink, telephony: &'a TelephonySink, debounce: Duration) -> Self {
        Self {
            ai_sink,
            telephony,
            debounce,
        }
    }

    /// Handle a barge-in signal.
    ///
    /// Idle is a no-op. From Speaking the turn always ends Idle, whether or
    /// not the truncation was confirmed or the clear could be sent.
    pub async fn on_speech_started(
        &self,
        turn: &mut SpeechTurn,
        latest_media_time: u64,
        ai_events: &mut AiEventQueue,
        stream_sid: &str,
    ) {
        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
        }

        let Some(audio_end_ms) = truncation_offset(turn, latest_media_time) else {
            debug!("No active AI response to truncate");
            return;
        };
        let Some(item_id) = turn.last_spoken_item_id.clone() else {
            return;
        };

        info!(item_id = %item_id, audio_end_ms, "Truncating AI response on caller barge-in");

        if self.truncate(&item_id, audio_end_ms, ai_events).await {
            self.clear_playback(stream_sid).await;
        }

        turn.clear();
    }

    /// Send the truncate command and wait for `conversation.item.truncated`.
    ///
    /// Events arriving first stay queued for the egress pump.
    async fn truncate(
        &self,
        item_id: &str,
        audio_end_ms: u32,
        ai_events: &mut AiEventQueue,
    ) -> bool {
        if !self.ai_sink.is_open() {
            warn!("AI channel is closed. Cannot truncate response.");
            return false;
        }

        if let Err(e) = self
            .ai_sink
            .send(&ClientEvent::truncate(item_id, audio_end_ms))
            .await
        {
            warn!("Failed to send truncation event: {}", e);
            return false;
        }

        let ack = ai_events
            .await_ack(|event| matches!(event, ServerEvent::ConversationItemTruncated { .. }))
            .await;
        match ack {
            Ok(Ack::Confirmed(event)) => {
                debug!(event = event.name(), "Truncation acknowledged");
                true
            }
            Ok(Ack::Rejected(message)) => {
                warn!("Truncation rejected: {}", message);
                false
            }
            Ok(Ack::Ended) => {
                warn!("AI channel ended before truncation acknowledgement");
                false
            }
            Err(e) => {
                warn!("Failed to read truncation acknowledgement: {}", e);
                false
            }
        }
    }

    /// Drop audio queued on the telephony side.
    async fn clear_playback(&self, stream_sid: &str) {
        if !self.telephony.is_open() {
            warn!("Telephony channel is closed. Cannot clear audio buffer.");
            return;
        }
        match self
            .telephony
            .send(&TelephonyCommand::clear(stream_sid))
            .await
        {
            Ok(()) => debug!(stream_sid, "Cleared telephony audio buffer"),
            Err(e) => warn!("Failed to clear telephony audio buffer: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::messages::ApiError;
    use crate::relay::memory;

    fn speaking(item: &str, started: u64) -> SpeechTurn {
        SpeechTurn {
            last_spoken_item_id: Some(item.to_string()),
            response_start_time: Some(started),
        }
    }

    fn truncated_ack(item: &str) -> ServerEvent {
        ServerEvent::ConversationItemTruncated {
            item_id: item.to_string(),
            content_index: 0,
            audio_end_ms: 300,
        }
    }

    #[test]
    fn test_offset_is_elapsed_since_turn_start() {
        assert_eq!(truncation_offset(&speaking("A", 200), 500), Some(300));
    }

    #[test]
    fn test_offset_clamps_negative_to_zero() {
        for (latest, started) in [(0u64, 1u64), (100, 200), (499, 500), (0, u64::MAX)] {
            assert_eq!(truncation_offset(&speaking("A", started), latest), Some(0));
        }
    }

    #[test]
    fn test_offset_idle_is_none() {
        assert_eq!(truncation_offset(&SpeechTurn::default(), 500), None);
        let half = SpeechTurn {
            last_spoken_item_id: Some("A".to_string()),
            response_start_time: None,
        };
        assert_eq!(truncation_offset(&half, 500), None);
    }

    #[tokio::test]
    async fn test_idle_is_noop() {
        let (ai_sink, ai_probe) = memory::sink::<ClientEvent>();
        let (tel_sink, tel_probe) = memory::sink::<TelephonyCommand>();
        let (_feeder, mut ai_events) = memory::ai_events();
        let controller = InterruptionController::new(&ai_sink, &tel_sink, Duration::ZERO);

        let mut turn = SpeechTurn::default();
        controller
            .on_speech_started(&mut turn, 500, &mut ai_events, "MZ1")
            .await;

        assert_eq!(turn, SpeechTurn::default());
        assert!(ai_probe.sent().is_empty());
        assert!(tel_probe.sent().is_empty());
    }

    #[tokio::test]
    async fn test_confirmed_truncation_clears_playback() {
        let (ai_sink, ai_probe) = memory::sink::<ClientEvent>();
        let (tel_sink, tel_probe) = memory::sink::<TelephonyCommand>();
        let (feeder, mut ai_events) = memory::ai_events();
        feeder.push(truncated_ack("A"));
        let controller = InterruptionController::new(&ai_sink, &tel_sink, Duration::ZERO);

        let mut turn = speaking("A", 200);
        controller
            .on_speech_started(&mut turn, 500, &mut ai_events, "MZ1")
            .await;

        assert_eq!(ai_probe.sent(), vec![ClientEvent::truncate("A", 300)]);
        assert_eq!(tel_probe.sent(), vec![TelephonyCommand::clear("MZ1")]);
        assert!(!turn.is_speaking());

        // Idle now, a second barge-in does nothing.
        controller
            .on_speech_started(&mut turn, 900, &mut ai_events, "MZ1")
            .await;
        assert_eq!(ai_probe.sent().len(), 1);
        assert_eq!(tel_probe.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_truncation_skips_clear() {
        let (ai_sink, ai_probe) = memory::sink::<ClientEvent>();
        let (tel_sink, tel_probe) = memory::sink::<TelephonyCommand>();
        let (feeder, mut ai_events) = memory::ai_events();
        feeder.push(ServerEvent::Error {
            error: ApiError {
                message: "audio_end_ms is past the item".to_string(),
                ..Default::default()
            },
        });
        let controller = InterruptionController::new(&ai_sink, &tel_sink, Duration::ZERO);

        let mut turn = speaking("A", 200);
        controller
            .on_speech_started(&mut turn, 500, &mut ai_events, "MZ1")
            .await;

        assert_eq!(ai_probe.sent().len(), 1);
        assert!(tel_probe.sent().is_empty());
        assert!(!turn.is_speaking());
        // The error is left for the egress pump to report.
        assert!(matches!(ai_events.recv().await, Some(Ok(ServerEvent::Error { .. }))));
    }

    #[tokio::test]
    async fn test_events_before_truncation_ack_are_kept() {
        let (ai_sink, _ai_probe) = memory::sink::<ClientEvent>();
        let (tel_sink, tel_probe) = memory::sink::<TelephonyCommand>();
        let (feeder, mut ai_events) = memory::ai_events();
        let late_delta = ServerEvent::AudioDelta {
            item_id: "A".to_string(),
            response_id: None,
            delta: "AAAA".to_string(),
        };
        let tool_response = ServerEvent::ResponseDone {
            response: Default::default(),
        };
        feeder.push(late_delta.clone());
        feeder.push(tool_response.clone());
        feeder.push(truncated_ack("A"));
        let controller = InterruptionController::new(&ai_sink, &tel_sink, Duration::ZERO);

        let mut turn = speaking("A", 200);
        controller
            .on_speech_started(&mut turn, 500, &mut ai_events, "MZ1")
            .await;

        assert_eq!(tel_probe.sent(), vec![TelephonyCommand::clear("MZ1")]);
        assert_eq!(ai_events.recv().await, Some(Ok(late_delta)));
        assert_eq!(ai_events.recv().await, Some(Ok(tool_response)));
    }

    #[tokio::test]
    async fn test_closed_telephony_skips_clear() {
        let (ai_sink, ai_probe) = memory::sink::<ClientEvent>();
        let (tel_sink, tel_probe) = memory::sink::<TelephonyCommand>();
        tel_probe.close();
        let (feeder, mut ai_events) = memory::ai_events();
        feeder.push(truncated_ack("A"));
        let controller = InterruptionController::new(&ai_sink, &tel_sink, Duration::ZERO);

        let mut turn = speaking("A", 200);
        controller
            .on_speech_started(&mut turn, 500, &mut ai_events, "MZ1")
            .await;

        assert_eq!(ai_probe.sent().len(), 1);
        assert!(tel_probe.sent().is_empty());
        assert!(!turn.is_speaking());
    }

    #[tokio::test]
    async fn test_send_failure_still_returns_to_idle() {
        let (ai_sink, ai_probe) = memory::sink::<ClientEvent>();
        ai_probe.fail_sends();
        let (tel_sink, tel_probe) = memory::sink::<TelephonyCommand>();
        let (_feeder, mut ai_events) = memory::ai_events();
        let controller = InterruptionController::new(&ai_sink, &tel_sink, Duration::ZERO);

        let mut turn = speaking("A", 200);
        controller
            .on_speech_started(&mut turn, 500, &mut ai_events, "MZ1")
            .await;

        assert!(tel_probe.sent().is_empty());
        assert_eq!(turn, SpeechTurn::default());
    }
}
