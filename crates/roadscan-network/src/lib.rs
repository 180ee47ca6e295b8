//! In-process publication of sampler results.

use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use roadscan_types::{events::SystemEvent, Result};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};

#[async_trait]
pub trait ResultPublisher: Send + Sync {
    /// Delivers `event` to current subscribers and returns how many there were.
    async fn publish(&self, event: SystemEvent) -> Result<usize>;
    fn subscribe(&self) -> BoxStream<'static, SystemEvent>;
}

/// Broadcast-backed bus. A subscriber that falls more than `capacity`
/// events behind loses the oldest ones and keeps receiving from there.
#[derive(Clone)]
pub struct LocalPublisher {
    tx: broadcast::Sender<SystemEvent>,
}

impl LocalPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }
}

#[async_trait]
impl ResultPublisher for LocalPublisher {
    async fn publish(&self, event: SystemEvent) -> Result<usize> {
        match self.tx.send(event) {
            Ok(receivers) => Ok(receivers),
            Err(broadcast::error::SendError(event)) => {
                debug!("No subscribers for {:?} event", event.kind);
                Ok(0)
            }
        }
    }

    fn subscribe(&self) -> BoxStream<'static, SystemEvent> {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(|item| async move {
                match item {
                    Ok(event) => Some(event),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!("Event subscriber lagged; {skipped} events dropped");
                        None
                    }
                }
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadscan_types::events::{EventKind, EventPayload, LifecyclePhase, PredictionEvent};

    #[tokio::test]
    async fn subscribers_receive_published_events_in_order() {
        let publisher = LocalPublisher::new(8);
        let mut stream = publisher.subscribe();

        let reached = publisher
            .publish(SystemEvent::lifecycle(LifecyclePhase::Boot, None))
            .await
            .expect("publish");
        assert_eq!(reached, 1);
        publisher
            .publish(SystemEvent::prediction(PredictionEvent::Reset))
            .await
            .expect("publish");

        let first = stream.next().await.expect("first");
        let second = stream.next().await.expect("second");
        assert_eq!(first.kind, EventKind::Lifecycle);
        assert_eq!(second.kind, EventKind::Prediction);
    }

    #[tokio::test]
    async fn publishing_without_subscribers_reaches_nobody() {
        let publisher = LocalPublisher::new(2);
        let reached = publisher
            .publish(SystemEvent::ops("nobody listening", &[]))
            .await
            .expect("publish");
        assert_eq!(reached, 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_resumes_at_oldest_retained_event() {
        let publisher = LocalPublisher::new(2);
        let mut stream = publisher.subscribe();
        for n in 0..5 {
            publisher
                .publish(SystemEvent::ops(format!("event {n}"), &[]))
                .await
                .expect("publish");
        }

        let next = stream.next().await.expect("retained event");
        match next.payload {
            EventPayload::Ops(ops) => assert_eq!(ops.message, "event 3"),
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
