use serde::Serialize;
use serde_json::{Map, Value};

/// Outcome class of one tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    /// The tool exists but may not run in the current call phase
    Failure,
    /// Unknown tool, invalid arguments or a persistence failure
    Error,
}

/// Structured result returned to the AI as a function call output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutcome {
    pub status: ToolStatus,
    pub message: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl ToolOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ToolStatus::Success, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(ToolStatus::Failure, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ToolStatus::Error, message)
    }

    fn new(status: ToolStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: Map::new(),
        }
    }

    /// Attach an extra field to the result body.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    /// JSON text placed in the `output` field of the function call output item.
    pub fn to_output(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"status":"error","message":"Failed to encode tool result."}"#.to_string()
        })
    }
}
