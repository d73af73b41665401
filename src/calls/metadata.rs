//! Call request and metadata types.

use serde::{Deserialize, Serialize};

/// Open appointment slots for one day, as supplied by the caller of `POST /call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityDay {
    /// ISO date (YYYY-MM-DD)
    pub date: String,
    /// 24-hour times (HH:MM)
    #[serde(default)]
    pub slots: Vec<String>,
}

/// Request body of `POST /call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    pub issue_id: String,
    pub phone_number: String,
    pub first_name: String,
    pub company: String,
    pub company_description: String,
    #[serde(default)]
    pub availability: Vec<AvailabilityDay>,
    pub issue: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

/// Static record describing one outbound call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallMetadata {
    pub call_id: String,
    pub issue_id: String,
    pub phone_number: String,
    pub first_name: String,
    pub company: String,
    pub company_description: String,
    #[serde(default)]
    pub availability: Vec<AvailabilityDay>,
    pub issue: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub twilio_call_sid: String,
}

impl CallMetadata {
    pub fn from_request(
        call_id: impl Into<String>,
        twilio_call_sid: impl Into<String>,
        request: CallRequest,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            issue_id: request.issue_id,
            phone_number: request.phone_number,
            first_name: request.first_name,
            company: request.company,
            company_description: request.company_description,
            availability: request.availability,
            issue: request.issue,
            language: request.language,
            twilio_call_sid: twilio_call_sid.into(),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(call_id: &str) -> Self {
        Self {
            call_id: call_id.to_string(),
            issue_id: "ISSUE-7".to_string(),
            phone_number: "+15550100".to_string(),
            first_name: "Dana".to_string(),
            company: "Acme Plumbing".to_string(),
            company_description: "Residential plumbing repairs".to_string(),
            availability: vec![AvailabilityDay {
                date: "2025-02-24".to_string(),
                slots: vec!["11:00".to_string(), "14:30".to_string()],
            }],
            issue: "Leaking water heater".to_string(),
            language: "en".to_string(),
            twilio_call_sid: "CA-test".to_string(),
        }
    }
}

/// Response body of `POST /call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCall {
    #[serde(flatten)]
    pub metadata: CallMetadata,
    pub call_status: CallStatus,
}

/// Twilio call status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Queued,
    Initiated,
    Ringing,
    InProgress,
    Completed,
    Busy,
    Failed,
    NoAnswer,
    Canceled,
    #[serde(untagged)]
    Unknown(String),
}

impl CallStatus {
    /// Parse a status as reported by Twilio (`CallStatus` form field or REST `status`).
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "queued" => CallStatus::Queued,
            "initiated" => CallStatus::Initiated,
            "ringing" => CallStatus::Ringing,
            "in-progress" => CallStatus::InProgress,
            "completed" => CallStatus::Completed,
            "busy" => CallStatus::Busy,
            "failed" => CallStatus::Failed,
            "no-answer" => CallStatus::NoAnswer,
            "canceled" => CallStatus::Canceled,
            _ => CallStatus::Unknown(value.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CallStatus::Queued => "queued",
            CallStatus::Initiated => "initiated",
            CallStatus::Ringing => "ringing",
            CallStatus::InProgress => "in-progress",
            CallStatus::Completed => "completed",
            CallStatus::Busy => "busy",
            CallStatus::Failed => "failed",
            CallStatus::NoAnswer => "no-answer",
            CallStatus::Canceled => "canceled",
            CallStatus::Unknown(value) => value,
        }
    }

    /// Post-call tools are only valid once the call has completed.
    pub fn is_post_call(&self) -> bool {
        matches!(self, CallStatus::Completed)
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields of the Twilio completion webhook kept for the post-call summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompletionDetails {
    pub called_city: String,
    pub called_state: String,
    pub call_status: String,
    pub call_duration: String,
    pub twilio_call_sid: String,
}

impl CompletionDetails {
    /// Extract the details from the webhook form, defaulting missing fields to "Unknown".
    pub fn from_form(form: &std::collections::HashMap<String, String>) -> Self {
        let field = |name: &str| {
            form.get(name)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string())
        };
        Self {
            called_city: field("CalledCity"),
            called_state: field("CalledState"),
            call_status: field("CallStatus"),
            call_duration: field("CallDuration"),
            twilio_call_sid: field("CallSid"),
        }
    }
}

/// Live call progress published by the call registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallProgress {
    pub status: CallStatus,
    pub completion: Option<CompletionDetails>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_call_status_parse() {
        assert_eq!(CallStatus::parse("completed"), CallStatus::Completed);
        assert_eq!(CallStatus::parse("in-progress"), CallStatus::InProgress);
        assert_eq!(CallStatus::parse("No-Answer"), CallStatus::NoAnswer);
        assert_eq!(
            CallStatus::parse("weird"),
            CallStatus::Unknown("weird".to_string())
        );
    }

    #[test]
    fn test_only_completed_is_post_call() {
        assert!(CallStatus::Completed.is_post_call());
        assert!(!CallStatus::InProgress.is_post_call());
        assert!(!CallStatus::Queued.is_post_call());
    }

    #[test]
    fn test_call_status_serialization() {
        assert_eq!(
            serde_json::to_string(&CallStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        let status: CallStatus = serde_json::from_str("\"queued\"").unwrap();
        assert_eq!(status, CallStatus::Queued);
    }

    #[test]
    fn test_call_request_defaults_language() {
        let json = r#"{
            "issue_id": "I-1",
            "phone_number": "+15550100",
            "first_name": "Dana",
            "company": "Acme",
            "company_description": "Plumbing",
            "issue": "Leak"
        }"#;
        let request: CallRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.language, "en");
        assert!(request.availability.is_empty());
    }

    #[test]
    fn test_active_call_is_flat() {
        let active = ActiveCall {
            metadata: CallMetadata::for_tests("call-1"),
            call_status: CallStatus::Queued,
        };
        let value = serde_json::to_value(&active).unwrap();
        assert_eq!(value["call_id"], "call-1");
        assert_eq!(value["twilio_call_sid"], "CA-test");
        assert_eq!(value["call_status"], "queued");
    }

    #[test]
    fn test_completion_details_from_form() {
        let mut form = HashMap::new();
        form.insert("CalledCity".to_string(), "Denver".to_string());
        form.insert("CallDuration".to_string(), "42".to_string());

        let details = CompletionDetails::from_form(&form);
        assert_eq!(details.called_city, "Denver");
        assert_eq!(details.call_duration, "42");
        assert_eq!(details.called_state, "Unknown");
    }
}
