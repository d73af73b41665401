//! AI event stream with acknowledgement matching.
//!
//! Acknowledgement reads (tool result delivery, truncation) wait for a specific
//! event type. Anything else that arrives first is queued and handed back to
//! the next [`AiEventQueue::recv`], so no event is lost to an ack read.

use std::collections::VecDeque;

use tracing::debug;

use crate::core::realtime::messages::ServerEvent;

use super::transport::{AiSource, TransportResult};

/// Result of waiting for an acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub enum Ack {
    /// The expected event arrived.
    Confirmed(ServerEvent),
    /// The AI answered with an `error` event. The error stays queued.
    Rejected(String),
    /// The stream ended first.
    Ended,
}

/// The AI event source plus events deferred during acknowledgement reads.
pub struct AiEventQueue {
    source: Box<AiSource>,
    pending: VecDeque<ServerEvent>,
}

impl AiEventQueue {
    pub fn new(source: Box<AiSource>) -> Self {
        Self {
            source,
            pending: VecDeque::new(),
        }
    }

    /// Next event, deferred ones first.
    ///
    /// Cancel safe: a dropped call loses nothing.
    pub async fn recv(&mut self) -> Option<TransportResult<ServerEvent>> {
        if let Some(event) = self.pending.pop_front() {
            return Some(Ok(event));
        }
        self.source.recv().await
    }

    /// Read from the stream until `is_ack` matches, queueing everything else.
    ///
    /// Deferred events are not candidates: they arrived before the command
    /// being acknowledged was sent.
    pub async fn await_ack<F>(&mut self, is_ack: F) -> TransportResult<Ack>
    where
        F: Fn(&ServerEvent) -> bool,
    {
        loop {
            match self.source.recv().await {
                Some(Ok(event)) if is_ack(&event) => return Ok(Ack::Confirmed(event)),
                Some(Ok(ServerEvent::Error { error })) => {
                    let message = error.message.clone();
                    self.pending.push_back(ServerEvent::Error { error });
                    return Ok(Ack::Rejected(message));
                }
                Some(Ok(event)) => {
                    debug!(event = event.name(), "Deferring AI event until acknowledgement");
                    self.pending.push_back(event);
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(Ack::Ended),
            }
        }
    }

    /// Number of deferred events.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
