//! Generic event bus consumer with automatic reconnection.
//!
//! # Pattern: Subscribe-Process-Reconnect Loop
//!
//! ```text
//! loop {
//!     subscribe (retry on failure)
//!     for each event:
//!         handle, retrying Retriable errors with backoff
//!         dead-letter Permanent errors and exhausted retries
//!     stream ended -> wait, resubscribe
//! } until shutdown
//! ```
//!
//! One bad event never stalls the stream: after its retry budget it is
//! dead-lettered and the consumer moves on.

use crate::dead_letter::{DeadLetter, DeadLetterSink, LoggingDeadLetterSink};
use crate::handler::{EventHandler, HandlerError};
use crate::metrics::EventBusMetrics;
use crate::retry::{RetryPolicy, retry_with_predicate};
use futures::StreamExt;
use staysync_core::event::SerializedEvent;
use staysync_core::event_bus::{EventBus, EventStream};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Errors building an [`EventConsumer`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsumerError {
    /// A required builder field was not set.
    #[error("event consumer is missing required field `{0}`")]
    MissingField(&'static str),
}

/// Generic event bus consumer.
pub struct EventConsumer {
    name: String,
    topics: Vec<String>,
    event_bus: Arc<dyn EventBus>,
    handler: Arc<dyn EventHandler>,
    dead_letters: Arc<dyn DeadLetterSink>,
    retry_policy: RetryPolicy,
    shutdown: broadcast::Receiver<()>,
    reconnect_delay: Duration,
}

impl EventConsumer {
    /// Create a builder for configuring a consumer.
    #[must_use]
    pub fn builder() -> EventConsumerBuilder {
        EventConsumerBuilder::default()
    }

    /// Consumer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn the consumer as a background task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run until a shutdown signal is received.
    pub async fn run(&mut self) {
        info!(consumer = %self.name, "Event consumer started");

        loop {
            let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();

            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Event consumer received shutdown signal");
                    break;
                }
                subscribe_result = self.event_bus.subscribe(&topics) => {
                    match subscribe_result {
                        Ok(stream) => {
                            info!(consumer = %self.name, topics = ?self.topics, "Subscribed to event bus");
                            if self.process_stream(stream).await {
                                break;
                            }
                            warn!(
                                consumer = %self.name,
                                delay_ms = self.reconnect_delay.as_millis(),
                                "Event stream ended, reconnecting"
                            );
                        }
                        Err(e) => {
                            error!(
                                consumer = %self.name,
                                error = %e,
                                delay_ms = self.reconnect_delay.as_millis(),
                                "Failed to subscribe to event bus, retrying"
                            );
                        }
                    }
                    tokio::select! {
                        _ = self.shutdown.recv() => break,
                        () = tokio::time::sleep(self.reconnect_delay) => {}
                    }
                }
            }
        }

        info!(consumer = %self.name, "Event consumer stopped");
    }

    /// Process events until the stream ends (returns `false`) or shutdown is
    /// signalled (returns `true`).
    async fn process_stream(&mut self, mut stream: EventStream) -> bool {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Event consumer received shutdown signal during processing");
                    return true;
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(event)) => self.dispatch(&event).await,
                        Some(Err(e)) => {
                            error!(consumer = %self.name, error = %e, "Error receiving event from stream");
                        }
                        None => return false,
                    }
                }
            }
        }
    }

    /// Handle one event: retry retriable failures, dead-letter the rest.
    pub async fn dispatch(&self, event: &SerializedEvent) {
        debug!(consumer = %self.name, event_type = %event.event_type, key = ?event.key, "Handling event");

        let handler = Arc::clone(&self.handler);
        let result = retry_with_predicate(
            &self.retry_policy,
            || handler.handle(event),
            HandlerError::is_retriable,
        )
        .await;

        let Err(failure) = result else {
            return;
        };

        let permanent = !failure.error.is_retriable();
        error!(
            consumer = %self.name,
            event_type = %event.event_type,
            key = ?event.key,
            attempts = failure.attempts,
            permanent,
            error = %failure.error,
            "Event could not be processed, dead-lettering"
        );
        EventBusMetrics::record_dead_letter(&self.name);

        let letter = DeadLetter::new(
            self.name.clone(),
            event,
            failure.error.to_string(),
            failure.attempts,
            permanent,
        );
        if let Err(e) = self.dead_letters.record(letter).await {
            error!(consumer = %self.name, error = %e, "Failed to record dead letter");
        }
    }
}

/// Builder for configuring an [`EventConsumer`].
#[derive(Default)]
pub struct EventConsumerBuilder {
    name: Option<String>,
    topics: Option<Vec<String>>,
    event_bus: Option<Arc<dyn EventBus>>,
    handler: Option<Arc<dyn EventHandler>>,
    dead_letters: Option<Arc<dyn DeadLetterSink>>,
    retry_policy: Option<RetryPolicy>,
    shutdown: Option<broadcast::Receiver<()>>,
    reconnect_delay: Option<Duration>,
}

impl EventConsumerBuilder {
    /// Set consumer name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set topics to subscribe to.
    #[must_use]
    pub fn topics(mut self, topics: Vec<String>) -> Self {
        self.topics = Some(topics);
        self
    }

    /// Set event bus instance.
    #[must_use]
    pub fn event_bus(mut self, event_bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Set event handler.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Set dead-letter sink (default: log only).
    #[must_use]
    pub fn dead_letters(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letters = Some(sink);
        self
    }

    /// Set retry policy for retriable handler errors.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Set shutdown signal receiver.
    #[must_use]
    pub fn shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Set delay before resubscribing (default: 5 seconds).
    #[must_use]
    pub const fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }

    /// Build the `EventConsumer`.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::MissingField`] if name, topics, event bus,
    /// handler or shutdown is not set.
    pub fn build(self) -> Result<EventConsumer, ConsumerError> {
        Ok(EventConsumer {
            name: self.name.ok_or(ConsumerError::MissingField("name"))?,
            topics: self.topics.ok_or(ConsumerError::MissingField("topics"))?,
            event_bus: self
                .event_bus
                .ok_or(ConsumerError::MissingField("event_bus"))?,
            handler: self.handler.ok_or(ConsumerError::MissingField("handler"))?,
            dead_letters: self
                .dead_letters
                .unwrap_or_else(|| Arc::new(LoggingDeadLetterSink)),
            retry_policy: self.retry_policy.unwrap_or_default(),
            shutdown: self
                .shutdown
                .ok_or(ConsumerError::MissingField("shutdown"))?,
            reconnect_delay: self.reconnect_delay.unwrap_or(Duration::from_secs(5)),
        })
    }
}
