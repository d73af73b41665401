//! In-memory transports backed by tokio channels.
//!
//! Used to drive the relay without sockets: one side of each pair is handed to
//! the relay, the other is kept by the caller to inject events and inspect the
//! commands the relay sent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::core::realtime::messages::ServerEvent;

use super::events::AiEventQueue;
use super::transport::{CommandSink, EventSource, TransportError, TransportResult};

/// Receiving end handed to the relay.
pub struct MemorySource<E> {
    rx: mpsc::UnboundedReceiver<TransportResult<E>>,
}

/// Injects events into a [`MemorySource`].
#[derive(Clone)]
pub struct MemoryFeeder<E> {
    tx: mpsc::UnboundedSender<TransportResult<E>>,
}

impl<E> MemoryFeeder<E> {
    /// Push an event. Returns `false` if the source was dropped.
    pub fn push(&self, event: E) -> bool {
        self.tx.send(Ok(event)).is_ok()
    }

    /// Push a transport error.
    pub fn fail(&self, error: TransportError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }
}

/// Create a connected feeder/source pair. Dropping every feeder ends the source.
pub fn source<E>() -> (MemoryFeeder<E>, MemorySource<E>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MemoryFeeder { tx }, MemorySource { rx })
}

/// A feeder and the AI event queue it drives.
pub fn ai_events() -> (MemoryFeeder<ServerEvent>, AiEventQueue) {
    let (feeder, source) = source::<ServerEvent>();
    (feeder, AiEventQueue::new(Box::new(source)))
}

#[async_trait]
impl<E: Send> EventSource<E> for MemorySource<E> {
    async fn recv(&mut self) -> Option<TransportResult<E>> {
        self.rx.recv().await
    }
}

struct SinkInner<C> {
    open: AtomicBool,
    sent: Mutex<Vec<C>>,
    close_calls: Mutex<u32>,
    fail_sends: AtomicBool,
}

/// Sink that records every command it accepts.
pub struct MemorySink<C> {
    inner: Arc<SinkInner<C>>,
}

/// Inspection handle for a [`MemorySink`].
pub struct SinkProbe<C> {
    inner: Arc<SinkInner<C>>,
}

impl<C> Clone for SinkProbe<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Create an open sink and its probe.
pub fn sink<C>() -> (MemorySink<C>, SinkProbe<C>) {
    let inner = Arc::new(SinkInner {
        open: AtomicBool::new(true),
        sent: Mutex::new(Vec::new()),
        close_calls: Mutex::new(0),
        fail_sends: AtomicBool::new(false),
    });
    (
        MemorySink {
            inner: inner.clone(),
        },
        SinkProbe { inner },
    )
}

impl<C: Clone> SinkProbe<C> {
    /// Commands accepted so far, in send order.
    pub fn sent(&self) -> Vec<C> {
        self.inner.sent.lock().clone()
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Simulate the peer closing the channel.
    pub fn close(&self) {
        self.inner.open.store(false, Ordering::SeqCst);
    }

    /// Make every subsequent send fail with a WebSocket error.
    pub fn fail_sends(&self) {
        self.inner.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Number of `close()` calls made by the relay.
    pub fn close_calls(&self) -> u32 {
        *self.inner.close_calls.lock()
    }
}

#[async_trait]
impl<C: Clone + Send + Sync> CommandSink<C> for MemorySink<C> {
    fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    async fn send(&self, command: &C) -> TransportResult<()> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        if self.inner.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::WebSocket("simulated send failure".to_string()));
        }
        self.inner.sent.lock().push(command.clone());
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        *self.inner.close_calls.lock() += 1;
        self.inner.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_source_delivers_in_order_then_ends() {
        let (feeder, mut source) = source::<u32>();
        feeder.push(1);
        feeder.push(2);
        drop(feeder);

        assert_eq!(source.recv().await, Some(Ok(1)));
        assert_eq!(source.recv().await, Some(Ok(2)));
        assert_eq!(source.recv().await, None);
    }

    #[tokio::test]
    async fn test_sink_rejects_after_close() {
        let (sink, probe) = sink::<String>();
        sink.send(&"a".to_string()).await.unwrap();
        sink.close().await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(
            sink.send(&"b".to_string()).await,
            Err(TransportError::Closed)
        );
        assert_eq!(probe.sent(), vec!["a".to_string()]);
        assert_eq!(probe.close_calls(), 2);
        assert!(!probe.is_open());
    }
}
