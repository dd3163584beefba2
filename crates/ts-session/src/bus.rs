//! Lifecycle event bus
//!
//! A single typed channel from the registry to the UI domain. The
//! registry publishes from one task, so events for a given session reach
//! the subscriber in the order they were produced.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use ts_core::LifecycleEvent;

/// Create a bus holding at most `capacity` undelivered events
pub fn channel(capacity: usize) -> (EventPublisher, EventStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventPublisher { tx }, EventStream { rx })
}

/// Sending half, owned by the registry
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<LifecycleEvent>,
}

impl EventPublisher {
    /// Publish an event, waiting for room when the bus is full.
    ///
    /// Returns `false` if the subscriber has gone away.
    pub async fn publish(&self, event: LifecycleEvent) -> bool {
        tracing::trace!(
            "publish {} for {}",
            event.payload.kind(),
            event.session_id
        );
        self.tx.send(event).await.is_ok()
    }

    /// Whether the subscriber has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half, owned by the UI domain
pub struct EventStream {
    rx: mpsc::Receiver<LifecycleEvent>,
}

impl EventStream {
    /// Wait for the next event; `None` once every publisher is gone
    pub async fn next(&mut self) -> Option<LifecycleEvent> {
        self.rx.recv().await
    }

    /// Take an event if one is ready
    pub fn try_next(&mut self) -> Option<LifecycleEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Take every event that is ready without waiting
    pub fn drain(&mut self) -> Vec<LifecycleEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts_core::{EventPayload, ProfileId, SessionId};

    fn event(id: u64, payload: EventPayload) -> LifecycleEvent {
        LifecycleEvent::new(SessionId::new(id), ProfileId::new("conn_a"), payload)
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (publisher, mut stream) = channel(8);
        assert!(publisher.publish(event(1, EventPayload::Connected)).await);
        assert!(publisher.publish(event(1, EventPayload::Closed)).await);

        assert_eq!(stream.next().await.unwrap().payload, EventPayload::Connected);
        assert_eq!(stream.next().await.unwrap().payload, EventPayload::Closed);
        assert!(stream.try_next().is_none());
    }

    #[tokio::test]
    async fn test_publish_after_subscriber_dropped() {
        let (publisher, stream) = channel(8);
        drop(stream);
        assert!(publisher.is_closed());
        assert!(!publisher.publish(event(1, EventPayload::Closed)).await);
    }

    #[tokio::test]
    async fn test_drain_takes_ready_events() {
        let (publisher, mut stream) = channel(8);
        for id in 1..=3 {
            publisher.publish(event(id, EventPayload::Connected)).await;
        }
        let ids: Vec<u64> = stream.drain().iter().map(|e| e.session_id.as_u64()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
