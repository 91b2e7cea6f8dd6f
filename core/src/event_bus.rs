//! Event bus abstraction linking the Booking Authority, the Inventory Authority
//! and the Acceptance Gateway.
//!
//! # Flow
//!
//! ```text
//! traveler ──► Booking Authority ──(booking-requests)──► Acceptance Gateway
//!                                                            │
//! owner ─────────────────────────────────────────────► accept / cancel
//!                                                            │
//!                     ┌──────(booking-status-updates)────────┘
//!                     ▼                         ▼
//!            Inventory Authority         Booking Authority
//!            (block / unblock)           (status resync, cache)
//! ```
//!
//! # Key Principles
//!
//! - **Persist first**: a mutation is stored before its event is published
//! - **At-least-once delivery**: events may be delivered multiple times
//! - **Idempotency**: subscribers must handle duplicates
//! - **Ordered within partition**: events sharing a key keep their order;
//!   booking events are keyed by booking id
//!
//! # Implementations
//!
//! - `InMemoryEventBus` in `staysync-testing`
//! - `RedpandaEventBus` in `staysync-redpanda` (Kafka-compatible)

use crate::event::{Event, EventError, SerializedEvent};
use futures::Stream;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the event bus
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish an event to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// Failed to serialize or deserialize an event
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Network or transport error
    #[error("Transport error: {0}")]
    TransportError(String),
}

impl From<EventError> for EventBusError {
    fn from(error: EventError) -> Self {
        Self::SerializationFailed(error.to_string())
    }
}

/// Stream of events from subscriptions.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<SerializedEvent, EventBusError>> + Send>>;

/// Trait for event bus implementations.
///
/// Publish/subscribe with at-least-once semantics. Subscribers must be
/// idempotent.
///
/// # Dyn Compatibility
///
/// Methods return `Pin<Box<dyn Future>>` instead of `async fn` so services can
/// hold an `Arc<dyn EventBus>`.
pub trait EventBus: Send + Sync {
    /// Publish an event to a topic.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the publish operation fails.
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a stream of events.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}

/// Serialize `event` and publish it to `topic`.
///
/// # Errors
///
/// Returns [`EventBusError::SerializationFailed`] if the event cannot be
/// encoded, or whatever the bus returns from [`EventBus::publish`].
pub async fn publish_event<E>(
    bus: &dyn EventBus,
    topic: &str,
    event: &E,
) -> Result<(), EventBusError>
where
    E: Event + Serialize,
{
    let serialized = SerializedEvent::from_event(event)?;
    bus.publish(topic, &serialized).await
}
