//! In-memory [`EventBus`] for tests.

use staysync_core::event::SerializedEvent;
use staysync_core::event_bus::{EventBus, EventBusError, EventStream};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

struct Subscriber {
    topics: Vec<String>,
    sender: mpsc::UnboundedSender<SerializedEvent>,
}

#[derive(Default)]
struct Inner {
    subscribers: Vec<Subscriber>,
    published: Vec<(String, SerializedEvent)>,
    failures_remaining: usize,
}

/// Fan-out event bus held entirely in memory.
///
/// Every subscriber of a topic receives every event published to it after it
/// subscribed. All successful publishes are recorded so tests can assert on
/// them, and [`InMemoryEventBus::redeliver`] replays them to simulate
/// at-least-once duplicates.
#[derive(Default)]
pub struct InMemoryEventBus {
    inner: Mutex<Inner>,
}

impl InMemoryEventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` publishes fail with a transport error.
    pub async fn fail_next_publishes(&self, count: usize) {
        self.inner.lock().await.failures_remaining = count;
    }

    /// Every successful publish, in order, with its topic.
    pub async fn published(&self) -> Vec<(String, SerializedEvent)> {
        self.inner.lock().await.published.clone()
    }

    /// Successful publishes on one topic, in order.
    pub async fn published_on(&self, topic: &str) -> Vec<SerializedEvent> {
        self.inner
            .lock()
            .await
            .published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Deliver every recorded event on `topic` to current subscribers again.
    ///
    /// Returns the number of events replayed.
    pub async fn redeliver(&self, topic: &str) -> usize {
        let mut inner = self.inner.lock().await;
        let events: Vec<SerializedEvent> = inner
            .published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, e)| e.clone())
            .collect();
        for event in &events {
            fan_out(&mut inner.subscribers, topic, event);
        }
        events.len()
    }

    /// Number of live subscribers on `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .lock()
            .await
            .subscribers
            .iter()
            .filter(|s| !s.sender.is_closed() && s.topics.iter().any(|t| t == topic))
            .count()
    }

    /// Wait until `topic` has at least `count` live subscribers.
    pub async fn wait_for_subscribers(&self, topic: &str, count: usize) {
        while self.subscriber_count(topic).await < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

fn fan_out(subscribers: &mut Vec<Subscriber>, topic: &str, event: &SerializedEvent) {
    subscribers.retain(|s| !s.sender.is_closed());
    for subscriber in subscribers.iter() {
        if subscriber.topics.iter().any(|t| t == topic) {
            let _ = subscriber.sender.send(event.clone());
        }
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let event = event.clone();

        Box::pin(async move {
            let mut inner = self.inner.lock().await;
            if inner.failures_remaining > 0 {
                inner.failures_remaining -= 1;
                return Err(EventBusError::PublishFailed {
                    topic,
                    reason: "injected failure".to_string(),
                });
            }

            tracing::debug!(topic = %topic, event_type = %event.event_type, "In-memory publish");
            fan_out(&mut inner.subscribers, &topic, &event);
            inner.published.push((topic, event));
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();

        Box::pin(async move {
            let (sender, mut receiver) = mpsc::unbounded_channel();
            self.inner
                .lock()
                .await
                .subscribers
                .push(Subscriber { topics, sender });

            let stream = async_stream::stream! {
                while let Some(event) = receiver.recv().await {
                    yield Ok(event);
                }
            };
            Ok(Box::pin(stream) as EventStream)
        })
    }
}
