//! In-memory registry of active calls.
//!
//! Keyed by the agent's call id, with a secondary index from the Twilio call
//! SID used by the status webhook. Each entry owns a `watch` sender so relays
//! observe status transitions (in-call to post-call) while they run.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, info};

use super::metadata::{CallMetadata, CallProgress, CallStatus, CompletionDetails};

/// Read-only view of one registered call handed to the relay.
#[derive(Debug, Clone)]
pub struct CallHandle {
    metadata: Arc<CallMetadata>,
    progress: watch::Receiver<CallProgress>,
}

impl CallHandle {
    pub fn new(metadata: Arc<CallMetadata>, progress: watch::Receiver<CallProgress>) -> Self {
        Self { metadata, progress }
    }

    /// A handle that is not tracked by any registry; its status never changes.
    pub fn detached(metadata: CallMetadata, status: CallStatus) -> Self {
        let (_tx, rx) = watch::channel(CallProgress {
            status,
            completion: None,
        });
        Self::new(Arc::new(metadata), rx)
    }

    pub fn metadata(&self) -> &CallMetadata {
        &self.metadata
    }

    pub fn call_id(&self) -> &str {
        &self.metadata.call_id
    }

    pub fn status(&self) -> CallStatus {
        self.progress.borrow().status.clone()
    }

    pub fn completion(&self) -> Option<CompletionDetails> {
        self.progress.borrow().completion.clone()
    }

    pub fn is_post_call(&self) -> bool {
        self.progress.borrow().status.is_post_call()
    }

    /// Wait until the call reaches the post-call phase.
    ///
    /// Returns `false` if the registry entry was dropped first.
    pub async fn completed(&self) -> bool {
        let mut rx = self.progress.clone();
        rx.wait_for(|progress| progress.status.is_post_call())
            .await
            .is_ok()
    }
}

struct CallEntry {
    metadata: Arc<CallMetadata>,
    progress: watch::Sender<CallProgress>,
}

/// Registry of calls placed by this process.
#[derive(Default)]
pub struct CallRegistry {
    calls: DashMap<String, CallEntry>,
    sid_index: DashMap<String, String>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly placed call.
    pub fn register(&self, metadata: CallMetadata, status: CallStatus) -> CallHandle {
        let call_id = metadata.call_id.clone();
        let sid = metadata.twilio_call_sid.clone();
        let metadata = Arc::new(metadata);
        let (tx, rx) = watch::channel(CallProgress {
            status,
            completion: None,
        });

        self.calls.insert(
            call_id.clone(),
            CallEntry {
                metadata: metadata.clone(),
                progress: tx,
            },
        );
        if !sid.is_empty() {
            self.sid_index.insert(sid, call_id.clone());
        }
        info!(call_id = %call_id, "Call registered");

        CallHandle::new(metadata, rx)
    }

    pub fn get(&self, call_id: &str) -> Option<CallHandle> {
        self.calls.get(call_id).map(|entry| {
            CallHandle::new(entry.metadata.clone(), entry.progress.subscribe())
        })
    }

    pub fn call_id_for_sid(&self, twilio_call_sid: &str) -> Option<String> {
        self.sid_index
            .get(twilio_call_sid)
            .map(|entry| entry.value().clone())
    }

    /// Publish a status reported by Twilio. Returns the call id, or `None` if
    /// the SID is unknown.
    pub fn update_status(
        &self,
        twilio_call_sid: &str,
        status: CallStatus,
        completion: Option<CompletionDetails>,
    ) -> Option<String> {
        let call_id = self.call_id_for_sid(twilio_call_sid)?;
        let entry = self.calls.get(&call_id)?;
        debug!(call_id = %call_id, status = %status, "Call status updated");
        entry.progress.send_replace(CallProgress { status, completion });
        Some(call_id)
    }

    /// Forget a call once its relay and post-call processing have finished.
    pub fn remove(&self, call_id: &str) -> bool {
        match self.calls.remove(call_id) {
            Some((_, entry)) => {
                self.sid_index.remove(&entry.metadata.twilio_call_sid);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_register_and_lookup() {
        let registry = CallRegistry::new();
        registry.register(CallMetadata::for_tests("call-1"), CallStatus::Queued);

        let handle = registry.get("call-1").unwrap();
        assert_eq!(handle.call_id(), "call-1");
        assert_eq!(handle.status(), CallStatus::Queued);
        assert_eq!(
            registry.call_id_for_sid("CA-test").as_deref(),
            Some("call-1")
        );
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_status_update_is_visible_to_handles() {
        let registry = CallRegistry::new();
        let handle = registry.register(CallMetadata::for_tests("call-1"), CallStatus::InProgress);
        assert!(!handle.is_post_call());

        let call_id = registry.update_status(
            "CA-test",
            CallStatus::Completed,
            Some(CompletionDetails {
                call_duration: "31".to_string(),
                ..Default::default()
            }),
        );
        assert_eq!(call_id.as_deref(), Some("call-1"));
        assert!(handle.is_post_call());
        assert_eq!(handle.completion().unwrap().call_duration, "31");
    }

    #[test]
    fn test_status_update_unknown_sid() {
        let registry = CallRegistry::new();
        assert!(
            registry
                .update_status("CA-nope", CallStatus::Completed, None)
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_completed_wakes_on_transition() {
        let registry = Arc::new(CallRegistry::new());
        let handle = registry.register(CallMetadata::for_tests("call-1"), CallStatus::InProgress);

        let waiter = tokio::spawn(async move { handle.completed().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        registry.update_status("CA-test", CallStatus::Completed, None);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_completed_returns_false_when_removed() {
        let registry = CallRegistry::new();
        let handle = registry.register(CallMetadata::for_tests("call-1"), CallStatus::InProgress);
        assert!(registry.remove("call-1"));
        assert!(!handle.completed().await);
        assert!(registry.is_empty());
    }
}
