//! Tools offered to the AI and the name lookup table.

use phf::phf_map;
use serde_json::json;

use crate::core::realtime::messages::ToolDef;

/// Supported tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolKind {
    /// Record the appointment agreed during the call (post-call only)
    ScheduleAppointment,
    /// Persist a summary of the call (post-call only)
    WriteCallSummary,
    /// Hang up (live call only)
    EndCall,
    /// Any name not in the table
    Unsupported(String),
}

static TOOLS: phf::Map<&'static str, ToolKind> = phf_map! {
    "scheduled_appointment" => ToolKind::ScheduleAppointment,
    "write_call_summary" => ToolKind::WriteCallSummary,
    "end_call" => ToolKind::EndCall,
};

impl ToolKind {
    pub fn lookup(name: &str) -> Self {
        TOOLS
            .get(name)
            .cloned()
            .unwrap_or_else(|| ToolKind::Unsupported(name.to_string()))
    }

    pub fn name(&self) -> &str {
        match self {
            ToolKind::ScheduleAppointment => "scheduled_appointment",
            ToolKind::WriteCallSummary => "write_call_summary",
            ToolKind::EndCall => "end_call",
            ToolKind::Unsupported(name) => name,
        }
    }

    /// Whether the tool may only run once the call has completed.
    pub fn is_post_call_only(&self) -> bool {
        matches!(
            self,
            ToolKind::ScheduleAppointment | ToolKind::WriteCallSummary
        )
    }
}

/// Tool definitions sent with the session configuration.
pub fn tool_definitions() -> Vec<ToolDef> {
    vec![
        ToolDef::function(
            "scheduled_appointment",
            "This function should only be used when you are prompted to in the post-call process. \
             It records the appointment scheduled for the customer if one was agreed upon. \
             If 'date' and 'time' are null, no appointment was scheduled.",
            json!({
                "type": "object",
                "properties": {
                    "date": {
                        "type": ["string", "null"],
                        "description": "The appointment date (YYYY-MM-DD) or null if no appointment was scheduled."
                    },
                    "time": {
                        "type": ["string", "null"],
                        "description": "The appointment time (e.g. '3:00 PM') or null if no appointment was scheduled."
                    }
                },
                "required": []
            }),
        ),
        ToolDef::function(
            "write_call_summary",
            "Part of the post-call process. Saves a summary of the call based on the customer's responses.",
            json!({
                "type": "object",
                "properties": {
                    "summary": {
                        "type": "string",
                        "description": "A textual summary of the call capturing key details discussed with the customer, \
                                        including important notes or follow-up actions. Written to a markdown file."
                    }
                },
                "required": ["summary"]
            }),
        ),
        ToolDef::function(
            "end_call",
            "Ends the phone call when the conversation is complete.",
            json!({ "type": "object", "properties": {} }),
        ),
    ]
}
