//! Twilio telephony: media stream wire format and transport, REST client.

pub mod media_stream;
pub mod messages;
pub mod twilio;

pub use media_stream::{MediaStreamEvents, MediaStreamSink};
pub use messages::{TelephonyCommand, TelephonyEvent};
pub use twilio::{CreatedCall, TwilioClient, TwilioError, TwilioSettings, stream_twiml};
