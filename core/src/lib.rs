//! # StaySync Core
//!
//! Shared vocabulary for the StaySync booking services.
//!
//! Two authorities own two halves of the same fact: the Booking Authority owns
//! booking records, the Inventory Authority owns each property's calendar of
//! blocked ranges. They never share a transaction. The only coupling is the
//! event bus, so everything they exchange is defined here:
//!
//! - [`types`]: identifiers, [`DateRange`](types::DateRange), the booking
//!   state machine and the property calendar value types
//! - [`events`]: the wire events and their topics
//! - [`error`]: the error taxonomy both authorities speak
//! - [`ports`]: traits each authority exposes to the others
//! - [`event_bus`]: the publish/subscribe abstraction
//! - [`outcome`]: the typed result of "mutation persisted, event maybe not"
//!
//! ## Delivery model
//!
//! - Status is persisted before the event announcing it is published
//! - Events are delivered at least once and may arrive out of order across topics
//! - Every consumer is idempotent
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use staysync_core::types::DateRange;
//!
//! let june = |d| NaiveDate::from_ymd_opt(2025, 6, d).unwrap_or_default();
//! let first = DateRange::new(june(1), june(5)).unwrap();
//! let second = DateRange::new(june(5), june(10)).unwrap();
//!
//! // Check-out day is free for the next check-in.
//! assert!(!first.overlaps(&second));
//! ```

pub mod error;
pub mod event;
pub mod event_bus;
pub mod events;
pub mod outcome;
pub mod ports;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};
pub use serde::{Deserialize, Serialize};

/// Environment module - injected dependencies
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Authorities stamp `createdAt`/`updatedAt` and event timestamps through
    /// this trait so tests can pin the time.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
