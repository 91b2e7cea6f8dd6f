//! Event trait and the serialized wire envelope.
//!
//! Events cross service boundaries, so they are serialized as JSON rather than a
//! Rust-only binary format. Each payload carries its own `eventType` field, which
//! lets a consumer recover the type from the bytes alone.
//!
//! # Example
//!
//! ```
//! use staysync_core::event::{Event, SerializedEvent};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! #[serde(tag = "eventType")]
//! enum PingEvent {
//!     #[serde(rename = "PING")]
//!     Ping { id: String },
//! }
//!
//! impl Event for PingEvent {
//!     fn event_type(&self) -> &'static str {
//!         "PING"
//!     }
//!
//!     fn partition_key(&self) -> Option<String> {
//!         match self {
//!             PingEvent::Ping { id } => Some(id.clone()),
//!         }
//!     }
//! }
//!
//! let event = PingEvent::Ping { id: "p-1".to_string() };
//! let serialized = SerializedEvent::from_event(&event).unwrap();
//! assert_eq!(serialized.event_type, "PING");
//! assert_eq!(serialized.key.as_deref(), Some("p-1"));
//! ```

use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Error types for event operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize event to bytes.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from bytes.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),

    /// Unknown event type encountered during deserialization.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
}

/// An event exchanged between services over the event bus.
///
/// `event_type()` must match the `eventType` field written into the JSON
/// payload. `partition_key()` selects the bus partition; events sharing a key
/// are delivered in publish order.
pub trait Event: Send + Sync + 'static {
    /// Returns the event type identifier for this event.
    fn event_type(&self) -> &'static str;

    /// Partition key for ordered delivery. `None` lets the bus choose.
    fn partition_key(&self) -> Option<String> {
        None
    }

    /// Serialize this event to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        serde_json::to_vec(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Deserialize an event from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::DeserializationError` if the bytes are not valid
    /// JSON for this event type, or name a type this enum does not know.
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        serde_json::from_slice(bytes).map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}

/// A serialized event ready for the bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializedEvent {
    /// The event type identifier (e.g., `BOOKING_CREATED`).
    pub event_type: String,

    /// Partition key (the booking id for booking events).
    pub key: Option<String>,

    /// The JSON payload.
    pub data: Vec<u8>,
}

impl SerializedEvent {
    /// Create a new serialized event.
    #[must_use]
    pub const fn new(event_type: String, key: Option<String>, data: Vec<u8>) -> Self {
        Self {
            event_type,
            key,
            data,
        }
    }

    /// Create a serialized event from an `Event`.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    pub fn from_event<E: Event + Serialize>(event: &E) -> Result<Self, EventError> {
        Ok(Self {
            event_type: event.event_type().to_string(),
            key: event.partition_key(),
            data: event.to_bytes()?,
        })
    }

    /// Decode the payload back into a concrete event.
    ///
    /// # Errors
    ///
    /// Returns `EventError::DeserializationError` if the payload does not parse.
    pub fn decode<E: Event + DeserializeOwned>(&self) -> Result<E, EventError> {
        E::from_bytes(&self.data)
    }

    /// Read the `eventType` field out of a raw JSON payload.
    ///
    /// Used by bus adapters that receive bare bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::DeserializationError` if the payload is not a JSON
    /// object, or `EventError::UnknownEventType` if it has no `eventType` string.
    pub fn event_type_of(data: &[u8]) -> Result<String, EventError> {
        let value: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| EventError::DeserializationError(e.to_string()))?;
        value
            .get("eventType")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| EventError::UnknownEventType("<missing eventType>".to_string()))
    }
}

impl fmt::Display for SerializedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedEvent {{ type: {}, key: {}, size: {} bytes }}",
            self.event_type,
            self.key.as_deref().unwrap_or("-"),
            self.data.len()
        )
    }
}
