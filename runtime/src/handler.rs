//! Event handler trait.
//!
//! A handler decodes the events it cares about and ignores the rest. It
//! classifies every failure so the consumer knows what to do with it:
//!
//! - [`HandlerError::Retriable`]: infrastructure hiccup, retry with backoff
//! - [`HandlerError::Permanent`]: redelivery cannot help (unknown property,
//!   calendar conflict, malformed payload); dead-letter and alert

use async_trait::async_trait;
use staysync_core::event::{EventError, SerializedEvent};
use thiserror::Error;

/// Failure classification returned by [`EventHandler::handle`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// May succeed if retried.
    #[error("retriable: {0}")]
    Retriable(String),

    /// Will fail again on every redelivery.
    #[error("permanent: {0}")]
    Permanent(String),
}

impl HandlerError {
    /// Returns true for [`HandlerError::Retriable`].
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Retriable(_))
    }
}

impl From<EventError> for HandlerError {
    fn from(error: EventError) -> Self {
        Self::Permanent(error.to_string())
    }
}

/// Processes one event delivered by an [`EventConsumer`](crate::EventConsumer).
///
/// Delivery is at least once: handlers must be idempotent.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Handle a single event.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] classifying the failure.
    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError>;
}
