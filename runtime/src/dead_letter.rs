//! Dead letters: events a consumer gave up on.
//!
//! The consumer never blocks a partition on one bad event. After the retry
//! budget is spent (or immediately, for permanent failures) the event is
//! handed to a [`DeadLetterSink`] and processing moves on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use staysync_core::event::SerializedEvent;
use thiserror::Error;

/// An event that could not be processed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeadLetter {
    /// Consumer that gave up
    pub consumer: String,
    /// Event type of the failed event
    pub event_type: String,
    /// Partition key, if any
    pub key: Option<String>,
    /// Raw payload
    pub payload: Vec<u8>,
    /// Last error message
    pub error: String,
    /// Delivery attempts made
    pub attempts: u32,
    /// Whether the failure was classified permanent
    pub permanent: bool,
    /// When the consumer gave up
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    /// Build a dead letter for `event`.
    #[must_use]
    pub fn new(
        consumer: impl Into<String>,
        event: &SerializedEvent,
        error: impl Into<String>,
        attempts: u32,
        permanent: bool,
    ) -> Self {
        Self {
            consumer: consumer.into(),
            event_type: event.event_type.clone(),
            key: event.key.clone(),
            payload: event.data.clone(),
            error: error.into(),
            attempts,
            permanent,
            failed_at: Utc::now(),
        }
    }
}

/// Errors writing a dead letter.
#[derive(Error, Debug)]
pub enum DeadLetterError {
    /// Backing store failure
    #[error("dead letter storage failed: {0}")]
    Storage(String),
}

/// Destination for dead letters.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Record a dead letter.
    ///
    /// # Errors
    ///
    /// Returns [`DeadLetterError::Storage`] if the letter could not be stored.
    async fn record(&self, letter: DeadLetter) -> Result<(), DeadLetterError>;
}

/// Sink that only logs. Used when no durable store is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingDeadLetterSink;

#[async_trait]
impl DeadLetterSink for LoggingDeadLetterSink {
    async fn record(&self, letter: DeadLetter) -> Result<(), DeadLetterError> {
        tracing::error!(
            consumer = %letter.consumer,
            event_type = %letter.event_type,
            key = ?letter.key,
            attempts = letter.attempts,
            permanent = letter.permanent,
            error = %letter.error,
            payload = %String::from_utf8_lossy(&letter.payload),
            "Dead letter (not persisted)"
        );
        Ok(())
    }
}
