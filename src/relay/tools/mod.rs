//! Execution of tool calls requested by the AI.
//!
//! A `response.done` event carries zero or more `function_call` output items.
//! Each one is resolved against the tool table, checked against the call
//! phase, executed, and answered with exactly one `function_call_output`
//! item. The one exception is `end_call` when no telephony channel exists at
//! all, which is skipped without a result.

mod inventory;
mod outcome;

pub use inventory::{ToolKind, tool_definitions};
pub use outcome::{ToolOutcome, ToolStatus};

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::core::realtime::messages::{ClientEvent, Response, ServerEvent};
use crate::core::telephony::messages::TelephonyCommand;
use crate::records::{AppointmentRequest, CallRecordStore};

use super::error::RelayResult;
use super::events::{Ack, AiEventQueue};
use super::session::SessionState;
use super::transport::{AiSink, TelephonySink, TransportError};

const PHASE_GATE_MESSAGE: &str = "This should only be called in the post-call processing.";

/// One tool invocation requested by the AI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    /// JSON-encoded argument object
    pub arguments: String,
}

/// Function calls listed in a completed response, in order.
pub fn extract_tool_calls(response: &Response) -> Vec<ToolCall> {
    response
        .output
        .iter()
        .filter(|item| item.is_function_call())
        .map(|item| ToolCall {
            call_id: item.call_id.clone().unwrap_or_default(),
            name: item.name.clone().unwrap_or_default(),
            arguments: item.arguments.clone().unwrap_or_default(),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ScheduleArgs {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryArgs {
    summary: String,
}

fn parse_args<'de, T: Deserialize<'de>>(kind: &ToolKind, raw: &'de str) -> Result<T, ToolOutcome> {
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    serde_json::from_str(raw).map_err(|e| {
        ToolOutcome::error(format!("Invalid arguments for {}: {}", kind.name(), e))
    })
}

/// Runs tool calls for one relayed call.
pub struct ToolDispatcher<'a> {
    session: &'a SessionState,
    records: Arc<dyn CallRecordStore>,
    /// `None` once the live relay is over
    telephony: Option<&'a TelephonySink>,
    pacing: Duration,
    hangup_grace: Duration,
}

impl<'a> ToolDispatcher<'a> {
    pub fn new(
        session: &'a SessionState,
        records: Arc<dyn CallRecordStore>,
        telephony: Option<&'a TelephonySink>,
        pacing: Duration,
        hangup_grace: Duration,
    ) -> Self {
        Self {
            session,
            records,
            telephony,
            pacing,
            hangup_grace,
        }
    }

    /// Execute every tool call in `response` and return the result items to send back.
    pub async fn dispatch(&self, response: &Response) -> Vec<ClientEvent> {
        let calls = extract_tool_calls(response);
        if !calls.is_empty() {
            debug!(count = calls.len(), "Function calls detected");
        }

        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let kind = ToolKind::lookup(&call.name);

            if kind == ToolKind::EndCall && self.telephony.is_none() {
                warn!(
                    call_id_ref = %call.call_id,
                    "end_call requested without a telephony channel, skipping"
                );
                continue;
            }

            let outcome = self.execute(&kind, &call).await;
            info!(
                tool = kind.name(),
                call_id_ref = %call.call_id,
                status = ?outcome.status,
                "Tool executed"
            );
            results.push(ClientEvent::function_call_output(
                call.call_id,
                outcome.to_output(),
            ));
        }
        results
    }

    async fn execute(&self, kind: &ToolKind, call: &ToolCall) -> ToolOutcome {
        match kind {
            ToolKind::Unsupported(name) => {
                warn!(tool = %name, "Unknown tool call");
                ToolOutcome::error(format!("Unknown tool: {name}"))
            }
            ToolKind::ScheduleAppointment | ToolKind::WriteCallSummary => {
                let outcome = if self.session.call().is_post_call() {
                    self.run_post_call_tool(kind, &call.arguments).await
                } else {
                    ToolOutcome::failure(PHASE_GATE_MESSAGE)
                };
                if !self.pacing.is_zero() {
                    tokio::time::sleep(self.pacing).await;
                }
                outcome
            }
            ToolKind::EndCall => self.end_call().await,
        }
    }

    async fn run_post_call_tool(&self, kind: &ToolKind, raw_args: &str) -> ToolOutcome {
        let metadata = self.session.call().metadata();
        match kind {
            ToolKind::ScheduleAppointment => {
                let args: ScheduleArgs = match parse_args(kind, raw_args) {
                    Ok(args) => args,
                    Err(outcome) => return outcome,
                };
                let date = args.date.unwrap_or_default();
                let time = args.time.unwrap_or_default();
                let booked = !date.trim().is_empty() && !time.trim().is_empty();

                let outcome = self
                    .records
                    .schedule_appointment(AppointmentRequest {
                        issue_id: metadata.issue_id.clone(),
                        date,
                        time,
                        customer_name: metadata.first_name.clone(),
                        phone_number: metadata.phone_number.clone(),
                        company: metadata.company.clone(),
                        issue: metadata.issue.clone(),
                        call_id: metadata.call_id.clone(),
                    })
                    .await;

                if booked && outcome.is_success() {
                    self.session.mark_appointment_scheduled();
                }
                outcome
            }
            ToolKind::WriteCallSummary => {
                let args: SummaryArgs = match parse_args(kind, raw_args) {
                    Ok(args) => args,
                    Err(outcome) => return outcome,
                };
                self.records
                    .write_summary(&metadata.call_id, &args.summary)
                    .await
            }
            ToolKind::EndCall | ToolKind::Unsupported(_) => {
                ToolOutcome::error(format!("{} is not a post-call tool", kind.name()))
            }
        }
    }

    async fn end_call(&self) -> ToolOutcome {
        let Some(telephony) = self.telephony else {
            return ToolOutcome::failure("Telephony channel is unavailable.");
        };
        if !telephony.is_open() {
            return ToolOutcome::failure("Telephony channel is already closed.");
        }

        info!(call_id = %self.session.call().call_id(), "AI is ending the call");
        self.session.deactivate_call();

        if let Err(e) = telephony.send(&TelephonyCommand::Stop).await {
            warn!("Failed to send stop to telephony: {}", e);
        }
        if !self.hangup_grace.is_zero() {
            tokio::time::sleep(self.hangup_grace).await;
        }
        if let Err(e) = telephony.close().await {
            warn!("Failed to close telephony channel: {}", e);
        }

        ToolOutcome::success("AI ended call successfully.")
    }
}

/// Send tool results one at a time, waiting for each `conversation.item.created`.
///
/// Events that arrive before an acknowledgement stay queued for the caller.
/// Stops early (without error) if the AI channel has been closed.
pub async fn deliver_outputs(
    ai_sink: &AiSink,
    ai_events: &mut AiEventQueue,
    outputs: Vec<ClientEvent>,
) -> RelayResult<()> {
    for output in outputs {
        if !ai_sink.is_open() {
            warn!("AI channel is closed. Dropping remaining tool results.");
            return Ok(());
        }
        ai_sink.send(&output).await?;

        let ack = ai_events
            .await_ack(|event| matches!(event, ServerEvent::ConversationItemCreated { .. }))
            .await?;
        match ack {
            Ack::Confirmed(_) => debug!("Tool result acknowledged"),
            Ack::Rejected(message) => warn!("Tool result rejected: {}", message),
            Ack::Ended => return Err(TransportError::Closed.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calls::{CallHandle, CallMetadata, CallStatus};
    use crate::core::realtime::messages::{ApiError, ConversationItem};
    use crate::relay::memory;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;

    #[derive(Default)]
    struct RecordingStore {
        appointments: Mutex<Vec<AppointmentRequest>>,
        summaries: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl CallRecordStore for RecordingStore {
        async fn schedule_appointment(&self, appointment: AppointmentRequest) -> ToolOutcome {
            if appointment.date.is_empty() || appointment.time.is_empty() {
                return ToolOutcome::success("No appointment was scheduled.");
            }
            self.appointments.lock().push(appointment);
            ToolOutcome::success("Appointment scheduled successfully.")
        }

        async fn write_summary(&self, call_id: &str, summary: &str) -> ToolOutcome {
            self.summaries
                .lock()
                .push((call_id.to_string(), summary.to_string()));
            ToolOutcome::success("saved")
        }
    }

    fn session(status: CallStatus) -> SessionState {
        SessionState::new(CallHandle::detached(CallMetadata::for_tests("call-1"), status))
    }

    fn function_call(call_id: &str, name: &str, arguments: &str) -> ConversationItem {
        ConversationItem {
            item_type: "function_call".to_string(),
            call_id: Some(call_id.to_string()),
            name: Some(name.to_string()),
            arguments: Some(arguments.to_string()),
            ..Default::default()
        }
    }

    fn response(items: Vec<ConversationItem>) -> Response {
        Response {
            output: items,
            ..Default::default()
        }
    }

    fn output_of(event: &ClientEvent) -> (String, Value) {
        match event {
            ClientEvent::ConversationItemCreate { item } => (
                item.call_id.clone().unwrap(),
                serde_json::from_str(item.output.as_deref().unwrap()).unwrap(),
            ),
            other => panic!("unexpected event {other:?}"),
        }
    }

    fn dispatcher<'a>(
        session: &'a SessionState,
        store: Arc<RecordingStore>,
        telephony: Option<&'a TelephonySink>,
    ) -> ToolDispatcher<'a> {
        ToolDispatcher::new(session, store, telephony, Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_extract_ignores_non_function_items() {
        let resp = response(vec![
            ConversationItem {
                item_type: "message".to_string(),
                ..Default::default()
            },
            function_call("fc-1", "end_call", "{}"),
        ]);
        let calls = extract_tool_calls(&resp);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call_id, "fc-1");
    }

    #[tokio::test]
    async fn test_unknown_tool_yields_error_result() {
        let session = session(CallStatus::InProgress);
        let store = Arc::new(RecordingStore::default());
        let (tel_sink, _probe) = memory::sink::<TelephonyCommand>();

        let results = dispatcher(&session, store, Some(&tel_sink))
            .dispatch(&response(vec![function_call("fc-9", "transfer_call", "{}")]))
            .await;

        assert_eq!(results.len(), 1);
        let (call_id, output) = output_of(&results[0]);
        assert_eq!(call_id, "fc-9");
        assert_eq!(output["status"], "error");
        assert_eq!(output["message"], "Unknown tool: transfer_call");
    }

    #[tokio::test]
    async fn test_post_call_tools_are_gated_mid_call() {
        let session = session(CallStatus::InProgress);
        let store = Arc::new(RecordingStore::default());
        let (tel_sink, _probe) = memory::sink::<TelephonyCommand>();

        let results = dispatcher(&session, store.clone(), Some(&tel_sink))
            .dispatch(&response(vec![
                function_call(
                    "fc-1",
                    "scheduled_appointment",
                    r#"{"date":"2025-02-24","time":"11:00 AM"}"#,
                ),
                function_call("fc-2", "write_call_summary", r#"{"summary":"hi"}"#),
            ]))
            .await;

        assert_eq!(results.len(), 2);
        for result in &results {
            let (_, output) = output_of(result);
            assert_eq!(output["status"], "failure");
            assert_eq!(output["message"], PHASE_GATE_MESSAGE);
        }
        assert!(store.appointments.lock().is_empty());
        assert!(store.summaries.lock().is_empty());
        assert!(!session.appointment_scheduled());
    }

    #[tokio::test]
    async fn test_scheduling_post_call_sets_flag() {
        let session = session(CallStatus::Completed);
        let store = Arc::new(RecordingStore::default());

        let results = dispatcher(&session, store.clone(), None)
            .dispatch(&response(vec![function_call(
                "fc-1",
                "scheduled_appointment",
                r#"{"date":"2025-02-24","time":"11:00 AM"}"#,
            )]))
            .await;

        let (_, output) = output_of(&results[0]);
        assert_eq!(output["status"], "success");
        assert!(session.appointment_scheduled());
        let saved = store.appointments.lock();
        assert_eq!(saved[0].customer_name, "Dana");
        assert_eq!(saved[0].issue_id, "ISSUE-7");
    }

    #[tokio::test]
    async fn test_scheduling_without_slot_leaves_flag_unset() {
        let session = session(CallStatus::Completed);
        let store = Arc::new(RecordingStore::default());

        let results = dispatcher(&session, store, None)
            .dispatch(&response(vec![function_call(
                "fc-1",
                "scheduled_appointment",
                r#"{"date":null,"time":null}"#,
            )]))
            .await;

        let (_, output) = output_of(&results[0]);
        assert_eq!(output["message"], "No appointment was scheduled.");
        assert!(!session.appointment_scheduled());
    }

    #[tokio::test]
    async fn test_invalid_arguments_yield_error() {
        let session = session(CallStatus::Completed);
        let store = Arc::new(RecordingStore::default());

        let results = dispatcher(&session, store.clone(), None)
            .dispatch(&response(vec![
                function_call("fc-1", "write_call_summary", "{}"),
                function_call("fc-2", "scheduled_appointment", "not json"),
            ]))
            .await;

        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(output_of(result).1["status"], "error");
        }
        assert!(store.summaries.lock().is_empty());
    }

    #[tokio::test]
    async fn test_end_call_hangs_up_open_telephony() {
        let session = session(CallStatus::InProgress);
        let store = Arc::new(RecordingStore::default());
        let (tel_sink, probe) = memory::sink::<TelephonyCommand>();

        let results = dispatcher(&session, store, Some(&tel_sink))
            .dispatch(&response(vec![function_call("fc-1", "end_call", "")]))
            .await;

        assert_eq!(output_of(&results[0]).1["status"], "success");
        assert_eq!(probe.sent(), vec![TelephonyCommand::Stop]);
        assert!(!probe.is_open());
        assert!(!session.call_active());
    }

    #[tokio::test]
    async fn test_end_call_with_closed_telephony_fails() {
        let session = session(CallStatus::InProgress);
        let store = Arc::new(RecordingStore::default());
        let (tel_sink, probe) = memory::sink::<TelephonyCommand>();
        probe.close();

        let results = dispatcher(&session, store, Some(&tel_sink))
            .dispatch(&response(vec![function_call("fc-1", "end_call", "{}")]))
            .await;

        let (call_id, output) = output_of(&results[0]);
        assert_eq!(call_id, "fc-1");
        assert_eq!(output["status"], "failure");
        assert!(probe.sent().is_empty());
    }

    #[tokio::test]
    async fn test_end_call_without_telephony_is_skipped() {
        let session = session(CallStatus::Completed);
        let store = Arc::new(RecordingStore::default());

        let results = dispatcher(&session, store, None)
            .dispatch(&response(vec![
                function_call("fc-1", "end_call", "{}"),
                function_call("fc-2", "write_call_summary", r#"{"summary":"done"}"#),
            ]))
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(output_of(&results[0]).0, "fc-2");
    }

    #[tokio::test]
    async fn test_deliver_outputs_waits_for_each_ack() {
        let (ai_sink, probe) = memory::sink::<ClientEvent>();
        let (feeder, mut events) = memory::ai_events();
        feeder.push(ServerEvent::ConversationItemCreated { item: None });
        feeder.push(ServerEvent::ConversationItemCreated { item: None });
        feeder.push(ServerEvent::SpeechTooQuiet);

        let outputs = vec![
            ClientEvent::function_call_output("fc-1", "{}"),
            ClientEvent::function_call_output("fc-2", "{}"),
        ];
        deliver_outputs(&ai_sink, &mut events, outputs).await.unwrap();

        assert_eq!(probe.sent().len(), 2);
        // Exactly two acknowledgements consumed.
        assert_eq!(events.recv().await, Some(Ok(ServerEvent::SpeechTooQuiet)));
    }

    #[tokio::test]
    async fn test_deliver_outputs_keeps_events_seen_before_ack() {
        let (ai_sink, _probe) = memory::sink::<ClientEvent>();
        let (feeder, mut events) = memory::ai_events();
        let next_response = ServerEvent::ResponseDone {
            response: response(vec![function_call("fc-2", "end_call", "{}")]),
        };
        let speech = ServerEvent::SpeechStarted {
            audio_start_ms: None,
            item_id: None,
        };
        feeder.push(next_response.clone());
        feeder.push(speech.clone());
        feeder.push(ServerEvent::ConversationItemCreated { item: None });

        deliver_outputs(
            &ai_sink,
            &mut events,
            vec![ClientEvent::function_call_output("fc-1", "{}")],
        )
        .await
        .unwrap();

        assert_eq!(events.recv().await, Some(Ok(next_response)));
        assert_eq!(events.recv().await, Some(Ok(speech)));
    }

    #[tokio::test]
    async fn test_deliver_outputs_continues_after_rejection() {
        let (ai_sink, probe) = memory::sink::<ClientEvent>();
        let (feeder, mut events) = memory::ai_events();
        feeder.push(ServerEvent::Error {
            error: ApiError {
                message: "unknown call_id".to_string(),
                ..Default::default()
            },
        });
        feeder.push(ServerEvent::ConversationItemCreated { item: None });

        let outputs = vec![
            ClientEvent::function_call_output("fc-1", "{}"),
            ClientEvent::function_call_output("fc-2", "{}"),
        ];
        deliver_outputs(&ai_sink, &mut events, outputs).await.unwrap();

        assert_eq!(probe.sent().len(), 2);
        assert!(matches!(events.recv().await, Some(Ok(ServerEvent::Error { .. }))));
    }

    #[tokio::test]
    async fn test_deliver_outputs_fails_when_stream_ends() {
        let (ai_sink, _probe) = memory::sink::<ClientEvent>();
        let (feeder, mut events) = memory::ai_events();
        drop(feeder);

        let result = deliver_outputs(
            &ai_sink,
            &mut events,
            vec![ClientEvent::function_call_output("fc-1", "{}")],
        )
        .await;
        assert!(result.is_err());
    }
}
