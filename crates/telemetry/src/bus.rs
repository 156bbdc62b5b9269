//! Broadcast of progress events with per-operation subscriptions.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures::Stream;
use futures::stream::{self, BoxStream, StreamExt};
use gantry_core::OperationId;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::event::ProgressEvent;

/// Process-wide fan-out of [`ProgressEvent`]s.
///
/// With no subscribers, events are dropped. A subscriber that falls more than
/// `capacity` events behind skips the oldest ones and keeps going.
///
/// # Examples
///
/// ```
/// use gantry_core::OperationId;
/// use gantry_plan::State;
/// use gantry_telemetry::{ProgressBus, ProgressEvent};
///
/// let bus = ProgressBus::new(64);
/// let id = OperationId::v4();
/// let _events = bus.subscribe(id);
/// bus.emit(ProgressEvent::plan(id, State::Unstarted, State::InProgress, ""));
/// assert_eq!(bus.total_emitted(), 1);
/// ```
#[derive(Debug)]
pub struct ProgressBus {
    sender: broadcast::Sender<ProgressEvent>,
    emitted: AtomicU64,
}

impl ProgressBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            emitted: AtomicU64::new(0),
        }
    }

    /// Publish an event.
    pub fn emit(&self, event: ProgressEvent) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        let _ = self.sender.send(event);
    }

    /// Events for `operation_id` produced from now on.
    ///
    /// The stream ends after an event for which
    /// [`ProgressEvent::ends_operation`] holds, or when the bus is dropped.
    #[must_use]
    pub fn subscribe(&self, operation_id: OperationId) -> ProgressStream {
        let receiver = self.sender.subscribe();
        let inner = stream::unfold(Some(receiver), move |state| async move {
            let mut receiver = state?;
            loop {
                match receiver.recv().await {
                    Ok(event) if event.operation_id != operation_id => {}
                    Ok(event) => {
                        let next = (!event.ends_operation()).then_some(receiver);
                        return Some((event, next));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(operation_id = %operation_id, skipped, "progress subscriber lagged");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });
        ProgressStream {
            inner: inner.boxed(),
        }
    }

    /// Total number of events emitted since creation.
    #[must_use]
    pub fn total_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Lazy sequence of one operation's progress events.
pub struct ProgressStream {
    inner: BoxStream<'static, ProgressEvent>,
}

impl ProgressStream {
    /// A stream that yields nothing, for operations that already finished.
    #[must_use]
    pub fn finished() -> Self {
        Self {
            inner: stream::empty().boxed(),
        }
    }
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for ProgressStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStream").finish_non_exhaustive()
    }
}
