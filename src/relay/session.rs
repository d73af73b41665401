//! Per-call relay state shared by the two pumps.
//!
//! Fields are partitioned by writer:
//! - stream identity: written once by the ingest pump
//! - `latest_media_time`: best-effort clock hint, last observer wins
//! - `appointment_scheduled` / `call_active`: written by the tool dispatcher
//! - [`SpeechTurn`]: owned by the egress pump and lent to the interruption controller
//!
//! The atomics use relaxed ordering; none of these fields guard other memory.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::watch;

use crate::calls::CallHandle;

/// Write-once stream identity with a readiness latch.
///
/// Any number of tasks may wait for readiness; the identity is assigned at
/// most once and never reset.
#[derive(Debug)]
pub struct StreamIdentity {
    tx: watch::Sender<Option<String>>,
}

impl Default for StreamIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamIdentity {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Assign the stream identity. Returns `false` if it was already assigned.
    pub fn publish(&self, stream_sid: &str) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(stream_sid.to_string());
            true
        })
    }

    /// The stream identity, if already assigned.
    pub fn get(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Suspend until the identity has been assigned.
    pub async fn ready(&self) -> String {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        loop {
            if let Some(sid) = rx.borrow_and_update().clone() {
                return sid;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Shared state for one relayed call.
#[derive(Debug)]
pub struct SessionState {
    stream: StreamIdentity,
    call: CallHandle,
    latest_media_time: AtomicU64,
    appointment_scheduled: AtomicBool,
    call_active: AtomicBool,
}

impl SessionState {
    pub fn new(call: CallHandle) -> Self {
        Self {
            stream: StreamIdentity::new(),
            call,
            latest_media_time: AtomicU64::new(0),
            appointment_scheduled: AtomicBool::new(false),
            call_active: AtomicBool::new(true),
        }
    }

    pub fn stream(&self) -> &StreamIdentity {
        &self.stream
    }

    /// Read-only call metadata and live status.
    pub fn call(&self) -> &CallHandle {
        &self.call
    }

    /// Record the timestamp of the most recently observed audio frame.
    pub fn observe_media_time(&self, timestamp_ms: u64) {
        self.latest_media_time.store(timestamp_ms, Ordering::Relaxed);
    }

    pub fn latest_media_time(&self) -> u64 {
        self.latest_media_time.load(Ordering::Relaxed)
    }

    pub fn mark_appointment_scheduled(&self) {
        self.appointment_scheduled.store(true, Ordering::Relaxed);
    }

    pub fn appointment_scheduled(&self) -> bool {
        self.appointment_scheduled.load(Ordering::Relaxed)
    }

    /// Mark the call as ended; audio is no longer forwarded to telephony.
    pub fn deactivate_call(&self) {
        self.call_active.store(false, Ordering::Relaxed);
    }

    pub fn call_active(&self) -> bool {
        self.call_active.load(Ordering::Relaxed)
    }
}

/// The AI speech turn currently in flight.
///
/// Idle when either field is unset, Speaking otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeechTurn {
    pub last_spoken_item_id: Option<String>,
    pub response_start_time: Option<u64>,
}

impl SpeechTurn {
    pub fn is_speaking(&self) -> bool {
        self.last_spoken_item_id.is_some() && self.response_start_time.is_some()
    }

    /// Track an audio fragment for `item_id`, stamping the start time when
    /// the fragment opens a new turn. Returns `true` for the first fragment.
    pub fn track_fragment(&mut self, item_id: &str, now_ms: u64) -> bool {
        let new_turn = !self.is_speaking() || self.last_spoken_item_id.as_deref() != Some(item_id);
        if new_turn {
            self.response_start_time = Some(now_ms);
        }
        self.last_spoken_item_id = Some(item_id.to_string());
        new_turn
    }

    /// Return to Idle.
    pub fn clear(&mut self) {
        self.last_spoken_item_id = None;
        self.response_start_time = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calls::{CallMetadata, CallStatus};
    use std::sync::Arc;
    use std::time::Duration;

    fn session() -> SessionState {
        SessionState::new(CallHandle::detached(
            CallMetadata::for_tests("call-1"),
            CallStatus::InProgress,
        ))
    }

    #[test]
    fn test_stream_identity_is_write_once() {
        let identity = StreamIdentity::new();
        assert!(!identity.is_ready());
        assert!(identity.publish("MZ1"));
        assert!(!identity.publish("MZ2"));
        assert_eq!(identity.get().as_deref(), Some("MZ1"));
    }

    #[tokio::test]
    async fn test_ready_wakes_all_waiters() {
        let state = Arc::new(session());

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move { state.stream().ready().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        state.stream().publish("MZ-ready");

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), "MZ-ready");
        }
    }

    #[tokio::test]
    async fn test_ready_returns_immediately_when_published() {
        let state = session();
        state.stream().publish("MZ1");
        let sid = tokio::time::timeout(Duration::from_millis(50), state.stream().ready())
            .await
            .unwrap();
        assert_eq!(sid, "MZ1");
    }

    #[test]
    fn test_session_flags() {
        let state = session();
        assert!(state.call_active());
        assert!(!state.appointment_scheduled());

        state.deactivate_call();
        state.mark_appointment_scheduled();
        assert!(!state.call_active());
        assert!(state.appointment_scheduled());

        state.observe_media_time(480);
        assert_eq!(state.latest_media_time(), 480);
    }

    #[test]
    fn test_speech_turn_tracking() {
        let mut turn = SpeechTurn::default();
        assert!(!turn.is_speaking());

        assert!(turn.track_fragment("A", 200));
        assert!(!turn.track_fragment("A", 260));
        assert_eq!(turn.response_start_time, Some(200));

        assert!(turn.track_fragment("B", 900));
        assert_eq!(turn.last_spoken_item_id.as_deref(), Some("B"));
        assert_eq!(turn.response_start_time, Some(900));

        turn.clear();
        assert_eq!(turn, SpeechTurn::default());
    }
}
