//! # StaySync Runtime
//!
//! Infrastructure shared by every StaySync consumer:
//!
//! - [`consumer::EventConsumer`]: subscribe-process-reconnect loop with
//!   graceful shutdown
//! - [`handler::EventHandler`]: the per-event hook a service implements
//! - [`retry`]: exponential backoff for retriable handler failures
//! - [`dead_letter`]: where events go once they can no longer be retried
//! - [`metrics`]: Prometheus recorder and the service counters
//! - [`publisher`]: best-effort publish after a committed mutation
//!
//! ## Example
//!
//! ```ignore
//! use staysync_runtime::consumer::EventConsumer;
//!
//! let consumer = EventConsumer::builder()
//!     .name("calendar-sync")
//!     .topics(vec!["booking-status-updates".to_string()])
//!     .event_bus(event_bus)
//!     .handler(handler)
//!     .dead_letters(dead_letters)
//!     .shutdown(shutdown_rx)
//!     .build()?;
//!
//! let handle = consumer.spawn();
//! ```

/// Event bus consumer loop
pub mod consumer;

/// Dead-letter sink for events that cannot be processed
pub mod dead_letter;

/// Event handler trait and error classification
pub mod handler;

/// Prometheus metrics for observability
pub mod metrics;

/// Best-effort event publication
pub mod publisher;

/// Retry logic with exponential backoff
pub mod retry;

pub use consumer::{ConsumerError, EventConsumer};
pub use dead_letter::{DeadLetter, DeadLetterError, DeadLetterSink, LoggingDeadLetterSink};
pub use handler::{EventHandler, HandlerError};
pub use publisher::announce;
pub use retry::RetryPolicy;
