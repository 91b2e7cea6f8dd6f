//! Redpanda event bus for StaySync.
//!
//! Implements [`EventBus`] on top of rdkafka, so it works against Redpanda or
//! any other Kafka-compatible broker.
//!
//! # Wire format
//!
//! The message value is the event's JSON payload exactly as produced by
//! [`SerializedEvent::from_event`], including its `eventType` field. The
//! message key is the event's partition key (the booking id for booking
//! events), so every event of one booking lands on the same partition and is
//! consumed in publish order. Non-Rust consumers can read the topics without
//! any envelope.
//!
//! # Delivery Semantics
//!
//! **At-least-once** with manual offset commits:
//! - an offset is committed only after the event reached the subscriber's
//!   channel
//! - a crash before commit redelivers the event
//! - subscribers must be idempotent
//!
//! # Example
//!
//! ```no_run
//! use staysync_redpanda::RedpandaEventBus;
//! use staysync_core::event_bus::EventBus;
//! use staysync_core::events::BOOKING_REQUESTS_TOPIC;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let event_bus = RedpandaEventBus::builder()
//!     .brokers("localhost:9092")
//!     .consumer_group("staysync-gateway")
//!     .build()?;
//!
//! let mut stream = event_bus.subscribe(&[BOOKING_REQUESTS_TOPIC]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(event) => println!("received {event}"),
//!         Err(e) => eprintln!("error: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use staysync_core::event::SerializedEvent;
use staysync_core::event_bus::{EventBus, EventBusError, EventStream};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Default publish timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default size of the per-subscription channel.
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Prefix of generated consumer group ids.
pub const GROUP_PREFIX: &str = "staysync-";

/// Kafka-compatible [`EventBus`].
///
/// Cheap to share behind an `Arc`; the producer is thread-safe and each
/// subscription creates its own consumer.
pub struct RedpandaEventBus {
    producer: FutureProducer,
    brokers: String,
    timeout: Duration,
    consumer_group: Option<String>,
    buffer_size: usize,
    auto_offset_reset: String,
}

impl RedpandaEventBus {
    /// Connect with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the producer cannot be
    /// created.
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Start a [`RedpandaEventBusBuilder`].
    #[must_use]
    pub fn builder() -> RedpandaEventBusBuilder {
        RedpandaEventBusBuilder::default()
    }

    /// Bootstrap servers this bus talks to.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }
}

/// Builder for [`RedpandaEventBus`].
#[derive(Debug, Default, Clone)]
pub struct RedpandaEventBusBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
}

impl RedpandaEventBusBuilder {
    /// Comma-separated bootstrap servers.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Producer `acks` (`"0"`, `"1"` or `"all"`; default `"all"`).
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Producer compression codec (default `"none"`).
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Publish timeout (default 5s).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Explicit consumer group.
    ///
    /// Instances sharing a group split the partitions between them. Without
    /// one, the group id is derived from the subscribed topics.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Channel capacity between the consumer task and the stream. Clamped to
    /// at least 1.
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size.max(1));
        self
    }

    /// Where a new consumer group starts: `"earliest"` or `"latest"`
    /// (default `"earliest"`, so a fresh consumer does not skip requests
    /// published before it joined).
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the bus.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] when no brokers are set or
    /// the producer configuration is rejected.
    pub fn build(self) -> Result<RedpandaEventBus, EventBusError> {
        let brokers = self
            .brokers
            .ok_or_else(|| EventBusError::ConnectionFailed("Brokers not configured".to_string()))?;
        let acks = self.producer_acks.as_deref().unwrap_or("all");
        let compression = self.compression.as_deref().unwrap_or("none");
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", acks)
            .set("enable.idempotence", if acks == "all" { "true" } else { "false" })
            .set("compression.type", compression)
            .create()
            .map_err(|e| EventBusError::ConnectionFailed(format!("Failed to create producer: {e}")))?;

        let buffer_size = self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let auto_offset_reset = self
            .auto_offset_reset
            .unwrap_or_else(|| "earliest".to_string());

        tracing::info!(
            brokers = %brokers,
            acks,
            compression,
            buffer_size,
            auto_offset_reset = %auto_offset_reset,
            "RedpandaEventBus created"
        );

        Ok(RedpandaEventBus {
            producer,
            brokers,
            timeout,
            consumer_group: self.consumer_group,
            buffer_size,
            auto_offset_reset,
        })
    }
}

/// Consumer group id used when none was configured.
///
/// Sorted topics keep the id stable regardless of subscription order.
#[must_use]
pub fn default_group_id(topics: &[String]) -> String {
    let mut sorted = topics.to_vec();
    sorted.sort();
    format!("{GROUP_PREFIX}{}", sorted.join("-"))
}

/// Rebuild a [`SerializedEvent`] from a raw message.
///
/// The type comes from the payload's `eventType`; the key from the message
/// key when it is valid UTF-8.
///
/// # Errors
///
/// Returns [`EventBusError::SerializationFailed`] for an empty message or a
/// payload without a readable `eventType`.
pub fn decode_message(
    payload: Option<&[u8]>,
    key: Option<&[u8]>,
) -> Result<SerializedEvent, EventBusError> {
    let Some(payload) = payload else {
        return Err(EventBusError::SerializationFailed(
            "Message has no payload".to_string(),
        ));
    };
    let event_type = SerializedEvent::event_type_of(payload)?;
    let key = key
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .map(ToString::to_string);
    Ok(SerializedEvent::new(event_type, key, payload.to_vec()))
}

impl EventBus for RedpandaEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let event = event.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let key = event.key.as_deref().unwrap_or(&event.event_type);
            let record = FutureRecord::to(&topic).payload(&event.data).key(key);

            match self.producer.send(record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition,
                        offset,
                        event_type = %event.event_type,
                        key,
                        "Event published"
                    );
                    Ok(())
                },
                Err((kafka_error, _)) => {
                    tracing::error!(
                        topic = %topic,
                        event_type = %event.event_type,
                        error = %kafka_error,
                        "Failed to publish event"
                    );
                    Err(EventBusError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                },
            }
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();
        let brokers = self.brokers.clone();
        let group_id = self
            .consumer_group
            .clone()
            .unwrap_or_else(|| default_group_id(&topics));
        let buffer_size = self.buffer_size;
        let auto_offset_reset = self.auto_offset_reset.clone();

        Box::pin(async move {
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &group_id)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to create consumer: {e}"),
                })?;

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer
                .subscribe(&topic_refs)
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to subscribe to topics: {e}"),
                })?;

            tracing::info!(
                topics = ?topics,
                consumer_group = %group_id,
                buffer_size,
                auto_offset_reset = %auto_offset_reset,
                "Subscribed to topics"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

            tokio::spawn(async move {
                use futures::StreamExt;
                use rdkafka::consumer::CommitMode;

                let mut stream = consumer.stream();

                while let Some(received) = stream.next().await {
                    let message = match received {
                        Ok(message) => message,
                        Err(e) => {
                            let err =
                                EventBusError::TransportError(format!("Failed to receive message: {e}"));
                            if tx.send(Err(err)).await.is_err() {
                                break;
                            }
                            continue;
                        },
                    };

                    let decoded = decode_message(message.payload(), message.key());
                    if let Ok(event) = &decoded {
                        tracing::trace!(
                            topic = message.topic(),
                            partition = message.partition(),
                            offset = message.offset(),
                            event_type = %event.event_type,
                            "Received event"
                        );
                    }

                    // Commit only after the subscriber has the event.
                    if tx.send(decoded).await.is_err() {
                        tracing::debug!("Subscriber dropped, consumer task exiting");
                        break;
                    }

                    if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                        tracing::warn!(
                            topic = message.topic(),
                            partition = message.partition(),
                            offset = message.offset(),
                            error = %e,
                            "Offset commit failed, message may be redelivered"
                        );
                    }
                }

                tracing::debug!("Consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;

    #[test]
    fn redpanda_event_bus_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaEventBus>();
        assert_sync::<RedpandaEventBus>();
    }

    #[test]
    fn build_requires_brokers() {
        let result = RedpandaEventBus::builder().build();
        assert!(matches!(result, Err(EventBusError::ConnectionFailed(_))));
    }

    #[test]
    fn buffer_size_is_clamped() {
        let builder = RedpandaEventBus::builder().buffer_size(0);
        assert_eq!(builder.buffer_size, Some(1));
    }

    #[test]
    fn group_id_ignores_topic_order() {
        let a = default_group_id(&["b".to_string(), "a".to_string()]);
        let b = default_group_id(&["a".to_string(), "b".to_string()]);
        assert_eq!(a, b);
        assert_eq!(a, "staysync-a-b");
    }

    #[test]
    fn message_decodes_type_and_key() {
        let payload = br#"{"eventType":"BOOKING_CREATED","bookingId":"x"}"#;
        let event = decode_message(Some(payload), Some(b"booking-1")).unwrap();
        assert_eq!(event.event_type, "BOOKING_CREATED");
        assert_eq!(event.key.as_deref(), Some("booking-1"));
        assert_eq!(event.data, payload.to_vec());
    }

    #[test]
    fn unreadable_messages_are_errors() {
        assert!(matches!(
            decode_message(None, None),
            Err(EventBusError::SerializationFailed(_))
        ));
        assert!(decode_message(Some(b"not json"), None).is_err());
        assert!(decode_message(Some(br#"{"bookingId":"x"}"#), None).is_err());
    }
}
