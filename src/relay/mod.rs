//! Real-time relay between the telephony media stream and the AI realtime session.
//!
//! One relay runs per call. [`StreamOrchestrator`] builds the shared
//! [`SessionState`] and runs [`TelephonyIngestPump`] and [`AiEgressPump`]
//! concurrently on the current task; when either ends, the other is
//! cancelled and both channels are closed.

mod egress;
mod error;
pub mod events;
mod ingest;
mod interruption;
pub mod memory;
mod orchestrator;
mod post_call;
mod session;
mod timing;
pub mod tools;
pub mod transport;

pub use egress::AiEgressPump;
pub use error::{RelayError, RelayResult};
pub use events::{Ack, AiEventQueue};
pub use ingest::{IngestSummary, TelephonyIngestPump};
pub use interruption::{InterruptionController, truncation_offset};
pub use orchestrator::{PumpSide, RelayChannels, RelayReport, StreamOrchestrator};
pub use post_call::PostCallSequencer;
pub use session::{SessionState, SpeechTurn, StreamIdentity};
pub use timing::RelayTiming;
pub use tools::{ToolDispatcher, ToolKind, ToolOutcome, ToolStatus};
pub use transport::{
    AiSink, AiSource, CommandSink, EventSource, TelephonySink, TelephonySource, TransportError,
    TransportResult,
};
