//! Persistence of appointments and call summaries.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::relay::tools::ToolOutcome;

const APPOINTMENTS_FILE: &str = "appointments.json";

/// Errors raised while accessing the records directory.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One appointment agreed during a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentRequest {
    pub issue_id: String,
    pub date: String,
    pub time: String,
    pub customer_name: String,
    pub phone_number: String,
    pub company: String,
    pub issue: String,
    pub call_id: String,
}

/// Storage collaborator used by the tool dispatcher.
#[async_trait]
pub trait CallRecordStore: Send + Sync {
    /// Record an appointment. Empty date or time means none was agreed.
    async fn schedule_appointment(&self, appointment: AppointmentRequest) -> ToolOutcome;

    /// Persist the summary of a call.
    async fn write_summary(&self, call_id: &str, summary: &str) -> ToolOutcome;
}

/// Stores records as files in one directory.
///
/// Appointments accumulate in a single JSON array; each summary is written to
/// `<call_id>.md`.
pub struct FileRecordStore {
    dir: PathBuf,
    appointments_lock: Mutex<()>,
}

impl FileRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            appointments_lock: Mutex::new(()),
        }
    }

    async fn append_appointment(
        &self,
        appointment: &AppointmentRequest,
    ) -> Result<(), RecordError> {
        let _guard = self.appointments_lock.lock().await;
        let path = self.dir.join(APPOINTMENTS_FILE);

        let mut existing = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Array(items)) => items,
                _ => {
                    debug!(
                        path = %path.display(),
                        "Appointments file unreadable, starting a new list"
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        existing.push(serde_json::to_value(appointment)?);
        let body = serde_json::to_vec_pretty(&existing)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, body).await?;
        Ok(())
    }
}

#[async_trait]
impl CallRecordStore for FileRecordStore {
    async fn schedule_appointment(&self, appointment: AppointmentRequest) -> ToolOutcome {
        if appointment.date.trim().is_empty() || appointment.time.trim().is_empty() {
            debug!(call_id = %appointment.call_id, "No appointment was scheduled");
            return ToolOutcome::success("No appointment was scheduled.");
        }

        match self.append_appointment(&appointment).await {
            Ok(()) => {
                info!(
                    call_id = %appointment.call_id,
                    date = %appointment.date,
                    time = %appointment.time,
                    "Appointment scheduled"
                );
                let details = serde_json::to_value(&appointment).unwrap_or(Value::Null);
                ToolOutcome::success("Appointment scheduled successfully.")
                    .with_detail("appointment", details)
            }
            Err(e) => {
                error!("Failed to save appointment: {}", e);
                ToolOutcome::error(format!("Failed to save appointment: {e}"))
            }
        }
    }

    async fn write_summary(&self, call_id: &str, summary: &str) -> ToolOutcome {
        if call_id.is_empty() {
            return ToolOutcome::error("Invalid call ID.");
        }
        let summary = if summary.trim().is_empty() {
            "No summary provided."
        } else {
            summary
        };

        let file_name = format!("{call_id}.md");
        let path = self.dir.join(&file_name);
        let result = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&path, summary).await?;
            Ok::<_, RecordError>(())
        }
        .await;

        match result {
            Ok(()) => {
                info!(call_id, path = %path.display(), "Call summary written");
                ToolOutcome::success(format!("Call summary saved to {file_name}"))
                    .with_detail("file", file_name)
            }
            Err(e) => {
                error!("Failed to write call summary: {}", e);
                ToolOutcome::error(format!("Failed to save call summary: {e}"))
            }
        }
    }
}
