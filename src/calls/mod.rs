//! Call metadata, lifecycle status and the registry of active calls.

mod metadata;
mod registry;

pub use metadata::{
    ActiveCall, AvailabilityDay, CallMetadata, CallProgress, CallRequest, CallStatus,
    CompletionDetails,
};
pub use registry::{CallHandle, CallRegistry};
