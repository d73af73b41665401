//! Runs both pumps of one call and tears them down together.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::calls::CallHandle;
use crate::records::CallRecordStore;

use super::egress::AiEgressPump;
use super::error::RelayError;
use super::events::AiEventQueue;
use super::ingest::{IngestSummary, TelephonyIngestPump};
use super::post_call::PostCallSequencer;
use super::session::SessionState;
use super::timing::RelayTiming;
use super::transport::{AiSink, AiSource, TelephonySink, TelephonySource};

/// The two established transports of one call, each split in halves.
pub struct RelayChannels {
    pub telephony_events: Box<TelephonySource>,
    pub telephony_sink: Box<TelephonySink>,
    pub ai_events: Box<AiSource>,
    pub ai_sink: Box<AiSink>,
}

/// Which pump finished first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpSide {
    /// Telephony ingest (caller hung up, stream stopped or failed)
    Telephony,
    /// AI egress (AI stream closed or failed)
    Ai,
}

/// What happened during one relay.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayReport {
    pub ended_by: PumpSide,
    /// Error of the pump that ended first, if it failed
    pub error: Option<RelayError>,
    /// Ingest counters, when the ingest pump ran to completion
    pub ingest: Option<IngestSummary>,
    pub appointment_scheduled: bool,
    /// The AI hung up through the end-call tool
    pub ended_by_tool: bool,
    pub post_call_ran: bool,
}

enum PumpExit {
    Ingest(Result<IngestSummary, RelayError>),
    Egress(Result<(), RelayError>),
}

/// Relays one call between telephony and the AI.
pub struct StreamOrchestrator {
    records: Arc<dyn CallRecordStore>,
    timing: RelayTiming,
}

impl StreamOrchestrator {
    pub fn new(records: Arc<dyn CallRecordStore>, timing: RelayTiming) -> Self {
        Self { records, timing }
    }

    /// Run the relay to completion. Both channels are closed when this returns.
    pub async fn run(&self, call: CallHandle, channels: RelayChannels) -> RelayReport {
        let RelayChannels {
            mut telephony_events,
            telephony_sink,
            ai_events,
            ai_sink,
        } = channels;
        let mut ai_events = AiEventQueue::new(ai_events);
        let session = SessionState::new(call);
        let call_id = session.call().call_id().to_string();
        info!(call_id = %call_id, "Relay started");

        let exit = {
            let ingest =
                TelephonyIngestPump::new(&session, telephony_sink.as_ref(), ai_sink.as_ref());
            let egress = AiEgressPump::new(
                &session,
                telephony_sink.as_ref(),
                ai_sink.as_ref(),
                self.records.clone(),
                &self.timing,
            );

            // The losing pump is dropped, which cancels its pending receive or send.
            tokio::select! {
                result = ingest.run(telephony_events.as_mut()) => PumpExit::Ingest(result),
                result = egress.run(&mut ai_events) => PumpExit::Egress(result),
            }
        };

        let mut report = RelayReport {
            ended_by: PumpSide::Telephony,
            error: None,
            ingest: None,
            appointment_scheduled: false,
            ended_by_tool: false,
            post_call_ran: false,
        };

        match exit {
            PumpExit::Ingest(Ok(summary)) => {
                info!(
                    call_id = %call_id,
                    forwarded = summary.frames_forwarded,
                    dropped = summary.frames_dropped,
                    "Telephony ingest finished"
                );
                report.ingest = Some(summary);

                if self.timing.post_call_enabled {
                    let sequencer = PostCallSequencer::new(
                        &session,
                        ai_sink.as_ref(),
                        self.records.clone(),
                        &self.timing,
                    );
                    match sequencer.run(&mut ai_events).await {
                        Ok(ran) => report.post_call_ran = ran,
                        Err(e) => warn!(call_id = %call_id, "Post-call actions failed: {}", e),
                    }
                }
            }
            PumpExit::Ingest(Err(e)) => {
                error!(call_id = %call_id, "Telephony ingest failed: {}", e);
                report.error = Some(e);
            }
            PumpExit::Egress(Ok(())) => {
                info!(call_id = %call_id, "AI egress finished");
                report.ended_by = PumpSide::Ai;
            }
            PumpExit::Egress(Err(e)) => {
                error!(call_id = %call_id, "AI egress failed: {}", e);
                report.ended_by = PumpSide::Ai;
                report.error = Some(e);
            }
        }

        if let Err(e) = telephony_sink.close().await {
            debug!("Telephony channel close: {}", e);
        }
        if let Err(e) = ai_sink.close().await {
            debug!("AI channel close: {}", e);
        }

        report.appointment_scheduled = session.appointment_scheduled();
        report.ended_by_tool = !session.call_active();
        info!(
            call_id = %call_id,
            ended_by = ?report.ended_by,
            appointment_scheduled = report.appointment_scheduled,
            post_call = report.post_call_ran,
            "Relay finished"
        );
        report
    }
}
