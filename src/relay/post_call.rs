//! Tool requests issued to the AI once the caller has hung up.
//!
//! The telephony stream is gone at this point, so the dispatcher runs without
//! a telephony channel and the AI answers in text only.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, warn};

use crate::calls::CompletionDetails;
use crate::core::realtime::messages::{ClientEvent, ServerEvent};
use crate::records::CallRecordStore;

use super::error::RelayResult;
use super::events::AiEventQueue;
use super::session::SessionState;
use super::timing::RelayTiming;
use super::tools::{ToolDispatcher, deliver_outputs};
use super::transport::{AiSink, TransportError};

const SCHEDULE_PROMPT: &str = "The call has ended. Please use the tool *scheduled_appointment*. \
     The arguments should be the date and time of the appointment if scheduled.";
const SCHEDULE_INSTRUCTIONS: &str =
    "Please respond to the message about using tool *scheduled_appointment*.";
const SUMMARY_INSTRUCTIONS: &str =
    "Please respond to the message about using tool *write_call_summary*.";

/// Runs the post-call scheduling and summary requests.
pub struct PostCallSequencer<'a> {
    session: &'a SessionState,
    ai_sink: &'a AiSink,
    records: Arc<dyn CallRecordStore>,
    timing: &'a RelayTiming,
}

impl<'a> PostCallSequencer<'a> {
    pub fn new(
        session: &'a SessionState,
        ai_sink: &'a AiSink,
        records: Arc<dyn CallRecordStore>,
        timing: &'a RelayTiming,
    ) -> Self {
        Self {
            session,
            ai_sink,
            records,
            timing,
        }
    }

    /// Returns `true` if the sequence ran.
    pub async fn run(&self, events: &mut AiEventQueue) -> RelayResult<bool> {
        let call_id = self.session.call().call_id().to_string();

        if !self.ai_sink.is_open() {
            warn!(call_id = %call_id, "AI channel is closed. Cannot perform post-call actions.");
            return Ok(false);
        }

        let completed = timeout(
            self.timing.post_call_status_wait,
            self.session.call().completed(),
        )
        .await
        .unwrap_or(false);
        if !completed {
            info!(
                call_id = %call_id,
                status = %self.session.call().status(),
                "Call did not complete, skipping post-call actions"
            );
            return Ok(false);
        }

        info!(call_id = %call_id, "Processing post-call actions");

        self.request(SCHEDULE_PROMPT.to_string(), SCHEDULE_INSTRUCTIONS)
            .await?;
        self.drain(events).await?;

        self.request(self.summary_prompt(), SUMMARY_INSTRUCTIONS)
            .await?;
        self.drain(events).await?;

        info!(call_id = %call_id, "Post-call actions completed");
        Ok(true)
    }

    fn summary_prompt(&self) -> String {
        let call = self.session.call();
        let metadata = serde_json::to_string(call.metadata()).unwrap_or_default();
        let details = call
            .completion()
            .unwrap_or_else(|| CompletionDetails::from_form(&HashMap::new()));

        format!(
            "Please call the function *write_call_summary* with the summary of call {} = {}.\n\
             Also include the following information:\n\
             - Called City: {}\n\
             - Called State: {}\n\
             - Call Status: {}\n\
             - Call Duration: {} seconds\n\
             - Twilio Call SID: {}",
            call.call_id(),
            metadata,
            details.called_city,
            details.called_state,
            details.call_status,
            details.call_duration,
            details.twilio_call_sid,
        )
    }

    async fn request(&self, prompt: String, instructions: &str) -> RelayResult<()> {
        self.ai_sink.send(&ClientEvent::user_text(prompt)).await?;
        self.ai_sink
            .send(&ClientEvent::text_response(instructions))
            .await?;
        debug!(instructions, "Post-call tool request sent");
        Ok(())
    }

    /// Handle AI events for the configured pause, executing any tool calls.
    async fn drain(&self, events: &mut AiEventQueue) -> RelayResult<()> {
        let dispatcher = ToolDispatcher::new(
            self.session,
            self.records.clone(),
            None,
            self.timing.tool_pacing,
            self.timing.hangup_grace,
        );
        let deadline = Instant::now() + self.timing.post_call_pause;

        loop {
            let next = match timeout_at(deadline, events.recv()).await {
                Ok(next) => next,
                Err(_) => return Ok(()),
            };
            match next {
                None => return Err(TransportError::Closed.into()),
                Some(Err(e)) if e.is_malformed() => warn!("Skipping malformed AI frame: {}", e),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(ServerEvent::ResponseDone { response })) => {
                    let outputs = dispatcher.dispatch(&response).await;
                    deliver_outputs(self.ai_sink, events, outputs).await?;
                }
                Some(Ok(ServerEvent::Error { error })) => {
                    warn!("AI reported an error during post-call: {}", error.message);
                }
                Some(Ok(other)) => debug!(event = other.name(), "Post-call AI event"),
            }
        }
    }
}
