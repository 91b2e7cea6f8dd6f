//! # StaySync Testing
//!
//! Test doubles and fixtures shared by the service crates:
//!
//! - [`FixedClock`] / [`test_clock`]: deterministic time
//! - [`InMemoryEventBus`]: fan-out bus that records every publish, can fail
//!   publishes on demand and redeliver what it recorded
//! - [`InMemoryDeadLetterSink`]: collects dead letters for assertions
//! - [`fixtures`]: dates, ranges and property records

use chrono::{DateTime, Utc};
use staysync_core::environment::Clock;

mod event_bus;

pub use event_bus::InMemoryEventBus;

/// Mock implementations of Environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use async_trait::async_trait;
    use staysync_runtime::dead_letter::{DeadLetter, DeadLetterError, DeadLetterSink};
    use tokio::sync::Mutex;

    /// Fixed clock for deterministic tests
    ///
    /// # Example
    ///
    /// ```
    /// use staysync_testing::mocks::FixedClock;
    /// use staysync_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default())
    }

    /// Dead-letter sink that keeps letters in memory.
    #[derive(Debug, Default)]
    pub struct InMemoryDeadLetterSink {
        letters: Mutex<Vec<DeadLetter>>,
    }

    impl InMemoryDeadLetterSink {
        /// Create an empty sink.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Letters recorded so far.
        pub async fn letters(&self) -> Vec<DeadLetter> {
            self.letters.lock().await.clone()
        }
    }

    #[async_trait]
    impl DeadLetterSink for InMemoryDeadLetterSink {
        async fn record(&self, letter: DeadLetter) -> Result<(), DeadLetterError> {
            self.letters.lock().await.push(letter);
            Ok(())
        }
    }
}

/// Dates, ranges and property records for tests.
pub mod fixtures {
    use chrono::NaiveDate;
    use staysync_core::types::{DateRange, Money, OwnerId, PropertyId, PropertyRecord};

    /// A calendar date.
    ///
    /// # Panics
    ///
    /// Panics on an invalid date.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("fixture date must be valid")
    }

    /// A day in June 2025.
    #[must_use]
    pub fn june(day: u32) -> NaiveDate {
        date(2025, 6, day)
    }

    /// `[june(start), june(end))`.
    ///
    /// # Panics
    ///
    /// Panics unless `start < end`.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn june_range(start: u32, end: u32) -> DateRange {
        DateRange::new(june(start), june(end)).expect("fixture range must be valid")
    }

    /// A property owned by a fresh owner, four guests, 100.00 per night.
    #[must_use]
    pub fn property() -> PropertyRecord {
        property_owned_by(OwnerId::new())
    }

    /// A property owned by `owner_id`, four guests, 100.00 per night.
    #[must_use]
    pub fn property_owned_by(owner_id: OwnerId) -> PropertyRecord {
        PropertyRecord {
            property_id: PropertyId::new(),
            owner_id,
            max_guests: 4,
            base_price: Money::from_cents(10_000),
        }
    }
}

/// Initialise a test tracing subscriber once; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, InMemoryDeadLetterSink, test_clock};
