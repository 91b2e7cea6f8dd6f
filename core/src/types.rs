//! Domain types shared across the booking services.
//!
//! Identifiers are UUID newtypes. Dates are calendar days ([`NaiveDate`]) and
//! every stay is a half-open [`DateRange`]: the end date is the check-out day
//! and is not occupied.

use crate::error::BookingError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a booking
    BookingId
);
uuid_id!(
    /// Unique identifier for a property
    PropertyId
);
uuid_id!(
    /// Identifier of the traveler who requested a stay
    TravelerId
);
uuid_id!(
    /// Identifier of a property owner
    OwnerId
);

// ============================================================================
// Date ranges
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDateRange {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

/// A half-open range of days `[start, end)`.
///
/// `end` is always strictly after `start`; the constructor is the only way in,
/// including through deserialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    #[serde(rename = "startDate")]
    start: NaiveDate,
    #[serde(rename = "endDate")]
    end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `end <= start`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidDateRange`] if `end` is not after `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, BookingError> {
        if end <= start {
            return Err(BookingError::InvalidDateRange);
        }
        Ok(Self { start, end })
    }

    /// First occupied day.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Check-out day (not occupied).
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of nights in the stay.
    #[must_use]
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Half-open overlap: `[s1,e1)` and `[s2,e2)` overlap iff `s1 < e2 && e1 > s2`.
    ///
    /// Ranges that only share a boundary day do not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// True if `self` lies entirely inside `outer`.
    #[must_use]
    pub fn within(&self, outer: &Self) -> bool {
        self.start >= outer.start && self.end <= outer.end
    }
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = BookingError;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        Self::new(raw.start_date, raw.end_date)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ============================================================================
// Money
// ============================================================================

/// An amount in minor currency units (cents).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Multiplies by a whole number with overflow checking
    #[must_use]
    pub const fn checked_mul(self, factor: u64) -> Option<Self> {
        match self.0.checked_mul(factor) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Booking
// ============================================================================

/// Failed to parse a booking status string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown booking status: {0}")]
pub struct ParseStatusError(pub String);

/// Lifecycle status of a booking.
///
/// ```text
/// pending ──► accepted ──► cancelled
///    └─────────────────────────▲
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Requested by the traveler, awaiting the owner
    Pending,
    /// Accepted by the owner; the calendar is blocked
    Accepted,
    /// Terminal
    Cancelled,
}

impl BookingStatus {
    /// Whether `self -> next` is an edge of the state machine.
    ///
    /// Staying in the same status is not a transition; callers treat it as an
    /// idempotent no-op before asking.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Accepted | Self::Cancelled) | (Self::Accepted, Self::Cancelled)
        )
    }

    /// Returns true if no transition leaves this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Wire and storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// A traveler's request to stay at a property.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Booking id
    pub id: BookingId,
    /// Property being booked
    pub property_id: PropertyId,
    /// Traveler who requested the stay
    pub traveler_id: TravelerId,
    /// Owner of the property at request time
    pub owner_id: OwnerId,
    /// Requested stay
    #[serde(flatten)]
    pub range: DateRange,
    /// Number of guests, at least one
    pub guest_count: u32,
    /// Price quoted to the traveler
    pub total_price: Money,
    /// Lifecycle status
    pub status: BookingStatus,
    /// When the booking was requested
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Copy of this booking moved to `status`.
    #[must_use]
    pub fn with_status(&self, status: BookingStatus, at: DateTime<Utc>) -> Self {
        Self {
            status,
            updated_at: at,
            ..self.clone()
        }
    }
}

// ============================================================================
// Property calendar
// ============================================================================

/// Property facts the booking flow needs from the (external) property service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    /// Property id
    pub property_id: PropertyId,
    /// Owner allowed to accept or cancel stays
    pub owner_id: OwnerId,
    /// Maximum number of guests
    pub max_guests: u32,
    /// Price per night
    pub base_price: Money,
}

/// A date range blocked on a property calendar for a confirmed stay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedRange {
    /// The blocked days
    #[serde(flatten)]
    pub range: DateRange,
    /// Booking that caused the block, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
}

impl BlockedRange {
    /// Create a blocked range.
    #[must_use]
    pub const fn new(range: DateRange, booking_id: Option<BookingId>) -> Self {
        Self { range, booking_id }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use proptest::prelude::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).expect("valid date")
    }

    fn arb_range() -> impl Strategy<Value = DateRange> {
        (1u32..25, 1u32..6).prop_map(|(start, nights)| {
            DateRange::new(day(start), day(start + nights)).expect("non-empty range")
        })
    }

    proptest! {
        #[test]
        fn overlap_means_a_shared_night(a in arb_range(), b in arb_range()) {
            let shared_night = a
                .start()
                .iter_days()
                .take_while(|d| *d < a.end())
                .any(|d| d >= b.start() && d < b.end());
            prop_assert_eq!(a.overlaps(&b), shared_night);
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }
    }

    #[test]
    fn date_range_rejects_empty_and_inverted() {
        assert_eq!(
            DateRange::new(day(5), day(5)),
            Err(BookingError::InvalidDateRange)
        );
        assert_eq!(
            DateRange::new(day(6), day(5)),
            Err(BookingError::InvalidDateRange)
        );
        assert_eq!(DateRange::new(day(5), day(6)).unwrap().nights(), 1);
    }

    #[test]
    fn shared_boundary_is_not_an_overlap() {
        let a = DateRange::new(day(1), day(5)).unwrap();
        let b = DateRange::new(day(5), day(10)).unwrap();
        let c = DateRange::new(day(4), day(6)).unwrap();

        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
        assert!(a.overlaps(&a));
    }

    #[test]
    fn within_is_inclusive_of_window_edges() {
        let window = DateRange::new(day(1), day(30)).unwrap();
        assert!(DateRange::new(day(1), day(30)).unwrap().within(&window));
        assert!(
            !DateRange::new(day(20), NaiveDate::from_ymd_opt(2025, 7, 2).unwrap())
                .unwrap()
                .within(&window)
        );
    }

    #[test]
    fn date_range_deserialization_validates() {
        let ok: DateRange =
            serde_json::from_str(r#"{"startDate":"2025-06-01","endDate":"2025-06-05"}"#).unwrap();
        assert_eq!(ok.start(), day(1));

        let bad = serde_json::from_str::<DateRange>(
            r#"{"startDate":"2025-06-05","endDate":"2025-06-01"}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn status_transitions() {
        use BookingStatus::{Accepted, Cancelled, Pending};

        assert!(Pending.can_transition_to(Accepted));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Accepted.can_transition_to(Cancelled));

        assert!(!Accepted.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Accepted));
        assert!(!Pending.can_transition_to(Pending));
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn status_parses_wire_names() {
        assert_eq!("accepted".parse::<BookingStatus>(), Ok(BookingStatus::Accepted));
        assert!("ACCEPTED".parse::<BookingStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&BookingStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }

    #[test]
    fn booking_serializes_flat_camel_case() {
        let now = Utc::now();
        let booking = Booking {
            id: BookingId::new(),
            property_id: PropertyId::new(),
            traveler_id: TravelerId::new(),
            owner_id: OwnerId::new(),
            range: DateRange::new(day(1), day(5)).unwrap(),
            guest_count: 2,
            total_price: Money::from_cents(40_000),
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&booking).unwrap();
        assert_eq!(json["startDate"], "2025-06-01");
        assert_eq!(json["endDate"], "2025-06-05");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["totalPrice"], 40_000);

        let back: Booking = serde_json::from_value(json).unwrap();
        assert_eq!(back, booking);
    }
}
