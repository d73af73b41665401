use std::time::Duration;

/// Delays used by the relay. None of them guard correctness; they pace the
/// conversation and give the peers time to settle.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayTiming {
    /// Wait before acting on a barge-in signal
    pub interruption_debounce: Duration,
    /// Pause after each scheduling or summary tool execution
    pub tool_pacing: Duration,
    /// Pause between the hang-up command and closing the telephony channel
    pub hangup_grace: Duration,
    /// Run the post-call tool sequence after a normal stop
    pub post_call_enabled: bool,
    /// How long to wait for the call status to become `completed`
    pub post_call_status_wait: Duration,
    /// How long to drain AI events after each post-call request
    pub post_call_pause: Duration,
}

impl Default for RelayTiming {
    fn default() -> Self {
        Self {
            interruption_debounce: Duration::from_millis(10),
            tool_pacing: Duration::from_secs(1),
            hangup_grace: Duration::from_millis(100),
            post_call_enabled: true,
            post_call_status_wait: Duration::from_secs(30),
            post_call_pause: Duration::from_secs(5),
        }
    }
}

impl RelayTiming {
    /// No delays and no post-call stage.
    pub fn immediate() -> Self {
        Self {
            interruption_debounce: Duration::ZERO,
            tool_pacing: Duration::ZERO,
            hangup_grace: Duration::ZERO,
            post_call_enabled: false,
            post_call_status_wait: Duration::ZERO,
            post_call_pause: Duration::ZERO,
        }
    }
}
