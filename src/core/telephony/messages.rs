//! Twilio Media Streams WebSocket message types.
//!
//! # Protocol Overview
//!
//! Events received from Twilio:
//! - connected - WebSocket handshake completed
//! - start - Stream metadata, carries the `streamSid` used to address outbound frames
//! - media - Base64 mu-law audio with a millisecond timestamp relative to stream start
//! - mark - Playback reached a previously sent mark
//! - stop - Stream ended
//!
//! Commands sent to Twilio:
//! - media - Audio to play to the caller
//! - clear - Flush audio that is buffered but not yet played
//! - stop - Hang up the stream

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Metadata carried by a `start` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamStart {
    /// Stream identifier that outbound frames are addressed to
    #[serde(rename = "streamSid", alias = "streamId")]
    pub stream_sid: String,
    /// Call the stream belongs to
    #[serde(rename = "callSid", default)]
    pub call_sid: Option<String>,
}

/// Audio carried by an inbound `media` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundMedia {
    /// Base64-encoded mu-law audio
    pub payload: String,
    /// Milliseconds since the stream started
    #[serde(default, deserialize_with = "timestamp_ms")]
    pub timestamp: u64,
}

/// Events received on the Twilio media stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonyEvent {
    /// Handshake acknowledgement, informational
    Connected,
    /// Stream started
    Start(StreamStart),
    /// Inbound caller audio
    Media(InboundMedia),
    /// Playback reached a named mark
    Mark(Option<String>),
    /// Stream stopped
    Stop,
    /// Any event type this relay does not handle
    Unrecognized(String),
}

impl TelephonyEvent {
    /// Parse one text frame from the media stream.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let mut frame: Value = serde_json::from_str(text)?;
        let event_type = frame
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN")
            .to_string();

        let event = match event_type.as_str() {
            "connected" => TelephonyEvent::Connected,
            "start" => {
                TelephonyEvent::Start(serde_json::from_value(frame["start"].take())?)
            }
            "media" => {
                TelephonyEvent::Media(serde_json::from_value(frame["media"].take())?)
            }
            "mark" => TelephonyEvent::Mark(
                frame
                    .pointer("/mark/name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            ),
            "stop" => TelephonyEvent::Stop,
            _ => TelephonyEvent::Unrecognized(event_type),
        };

        Ok(event)
    }

    /// Wire name of the event, used for logging.
    pub fn name(&self) -> &str {
        match self {
            TelephonyEvent::Connected => "connected",
            TelephonyEvent::Start(_) => "start",
            TelephonyEvent::Media(_) => "media",
            TelephonyEvent::Mark(_) => "mark",
            TelephonyEvent::Stop => "stop",
            TelephonyEvent::Unrecognized(name) => name,
        }
    }
}

/// Twilio sends the media timestamp as a string, synthetic streams use a number.
fn timestamp_ms<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
            .ok_or_else(|| serde::de::Error::custom("invalid media timestamp")),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid media timestamp: {e}"))),
        Value::Null => Ok(0),
        other => Err(serde::de::Error::custom(format!(
            "invalid media timestamp: {other}"
        ))),
    }
}

/// Outbound audio payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMedia {
    /// Base64-encoded mu-law audio
    pub payload: String,
}

/// Commands sent to the Twilio media stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyCommand {
    /// Play audio to the caller
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
    /// Drop queued audio immediately
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
    /// Hang up the stream
    Stop,
}

impl TelephonyCommand {
    /// Build a media command for an already-encoded payload.
    pub fn media(stream_sid: impl Into<String>, payload: impl Into<String>) -> Self {
        TelephonyCommand::Media {
            stream_sid: stream_sid.into(),
            media: OutboundMedia {
                payload: payload.into(),
            },
        }
    }

    /// Build a buffer-clear command.
    pub fn clear(stream_sid: impl Into<String>) -> Self {
        TelephonyCommand::Clear {
            stream_sid: stream_sid.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_event() {
        let json = r#"{"event":"start","sequenceNumber":"1","start":{"streamSid":"MZ123","callSid":"CA9","tracks":["inbound"]},"streamSid":"MZ123"}"#;
        let event = TelephonyEvent::parse(json).unwrap();
        assert_eq!(
            event,
            TelephonyEvent::Start(StreamStart {
                stream_sid: "MZ123".to_string(),
                call_sid: Some("CA9".to_string()),
            })
        );
    }

    #[test]
    fn test_parse_start_event_with_stream_id_alias() {
        let json = r#"{"event":"start","start":{"streamId":"S-1"}}"#;
        match TelephonyEvent::parse(json).unwrap() {
            TelephonyEvent::Start(start) => assert_eq!(start.stream_sid, "S-1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_media_string_timestamp() {
        let json = r#"{"event":"media","media":{"track":"inbound","chunk":"2","timestamp":"5120","payload":"AAEC"}}"#;
        match TelephonyEvent::parse(json).unwrap() {
            TelephonyEvent::Media(media) => {
                assert_eq!(media.payload, "AAEC");
                assert_eq!(media.timestamp, 5120);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_media_numeric_timestamp() {
        let json = r#"{"event":"media","media":{"timestamp":500,"payload":"AA=="}}"#;
        match TelephonyEvent::parse(json).unwrap() {
            TelephonyEvent::Media(media) => assert_eq!(media.timestamp, 500),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_unrecognized_event() {
        let event = TelephonyEvent::parse(r#"{"event":"dtmf","dtmf":{"digit":"1"}}"#).unwrap();
        assert_eq!(event, TelephonyEvent::Unrecognized("dtmf".to_string()));
        assert_eq!(event.name(), "dtmf");
    }

    #[test]
    fn test_parse_missing_event_field_is_unrecognized() {
        let event = TelephonyEvent::parse(r#"{"foo":"bar"}"#).unwrap();
        assert_eq!(event, TelephonyEvent::Unrecognized("UNKNOWN".to_string()));
    }

    #[test]
    fn test_parse_invalid_json_fails() {
        assert!(TelephonyEvent::parse("not json").is_err());
        assert!(TelephonyEvent::parse(r#"{"event":"media","media":{}}"#).is_err());
    }

    #[test]
    fn test_media_command_serialization() {
        let json = serde_json::to_value(TelephonyCommand::media("MZ1", "AAEC")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "media", "streamSid": "MZ1", "media": {"payload": "AAEC"}})
        );
    }

    #[test]
    fn test_clear_and_stop_serialization() {
        let clear = serde_json::to_value(TelephonyCommand::clear("MZ1")).unwrap();
        assert_eq!(clear, serde_json::json!({"event": "clear", "streamSid": "MZ1"}));

        let stop = serde_json::to_value(TelephonyCommand::Stop).unwrap();
        assert_eq!(stop, serde_json::json!({"event": "stop"}));
    }
}
