//! Typed result of a mutation followed by a best-effort publish.
//!
//! A booking mutation is committed before its event is published. If the
//! publish then fails the mutation stands, and the caller learns about the
//! undelivered event through [`Delivery`] instead of an error.

use crate::event_bus::EventBusError;
use serde::Serialize;

/// Whether the event announcing a mutation reached the bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Delivery {
    /// The event was accepted by the bus.
    Published,
    /// The mutation is durable but the event was not delivered.
    Undelivered {
        /// Why the publish failed
        reason: String,
    },
}

impl Delivery {
    /// Returns true if the event was published.
    #[must_use]
    pub const fn is_published(&self) -> bool {
        matches!(self, Self::Published)
    }
}

impl From<Result<(), EventBusError>> for Delivery {
    fn from(result: Result<(), EventBusError>) -> Self {
        match result {
            Ok(()) => Self::Published,
            Err(e) => Self::Undelivered {
                reason: e.to_string(),
            },
        }
    }
}

/// A committed value together with the fate of its event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome<T> {
    /// The persisted value
    pub value: T,
    /// Publish result
    pub delivery: Delivery,
}

impl<T> Outcome<T> {
    /// Pair a value with a delivery result.
    #[must_use]
    pub const fn new(value: T, delivery: Delivery) -> Self {
        Self { value, delivery }
    }

    /// Returns true if the event was published.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        self.delivery.is_published()
    }

    /// Drop the delivery information.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }
}
