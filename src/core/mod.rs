pub mod realtime;
pub mod telephony;

pub use realtime::{RealtimeError, RealtimeResult, RealtimeSettings};
pub use telephony::{TwilioClient, TwilioError, TwilioSettings};
