//! Booking events exchanged over the bus.
//!
//! The wire shape is a flat camelCase JSON object with an `eventType`
//! discriminator. Both events are keyed by booking id so every event for one
//! booking lands on the same partition.

use crate::error::BookingError;
use crate::event::Event;
use crate::types::{
    Booking, BookingId, BookingStatus, DateRange, Money, OwnerId, PropertyId, TravelerId,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Topic carrying `BOOKING_CREATED` (Booking Authority to Gateway).
pub const BOOKING_REQUESTS_TOPIC: &str = "booking-requests";

/// Topic carrying `BOOKING_STATUS_UPDATED` (Gateway to everyone else).
pub const BOOKING_STATUS_TOPIC: &str = "booking-status-updates";

/// A new pending booking was persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCreated {
    /// Booking id
    pub booking_id: BookingId,
    /// Booked property
    pub property_id: PropertyId,
    /// Owner who must accept or cancel
    pub owner_id: OwnerId,
    /// Requesting traveler
    pub traveler_id: TravelerId,
    /// First night
    pub start_date: NaiveDate,
    /// Check-out day
    pub end_date: NaiveDate,
    /// Number of guests
    pub guest_count: u32,
    /// Quoted price
    pub total_price: Money,
    /// Always `pending` at creation
    pub status: BookingStatus,
    /// When the booking was created
    pub timestamp: DateTime<Utc>,
}

impl BookingCreated {
    /// Build the event announcing `booking`.
    #[must_use]
    pub const fn from_booking(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id,
            property_id: booking.property_id,
            owner_id: booking.owner_id,
            traveler_id: booking.traveler_id,
            start_date: booking.range.start(),
            end_date: booking.range.end(),
            guest_count: booking.guest_count,
            total_price: booking.total_price,
            status: booking.status,
            timestamp: booking.created_at,
        }
    }
}

/// A booking moved between statuses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingStatusChanged {
    /// Booking id
    pub booking_id: BookingId,
    /// Booked property
    pub property_id: PropertyId,
    /// Requesting traveler
    pub traveler_id: TravelerId,
    /// First night
    pub start_date: NaiveDate,
    /// Check-out day
    pub end_date: NaiveDate,
    /// Status before the change
    pub old_status: BookingStatus,
    /// Status after the change
    pub new_status: BookingStatus,
    /// When the change was persisted
    pub timestamp: DateTime<Utc>,
}

impl BookingStatusChanged {
    /// Build the event for `booking` (already in its new status) leaving `old_status`.
    #[must_use]
    pub const fn from_booking(booking: &Booking, old_status: BookingStatus) -> Self {
        Self {
            booking_id: booking.id,
            property_id: booking.property_id,
            traveler_id: booking.traveler_id,
            start_date: booking.range.start(),
            end_date: booking.range.end(),
            old_status,
            new_status: booking.status,
            timestamp: booking.updated_at,
        }
    }

    /// The stay as a validated range.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidDateRange`] for a malformed payload.
    pub fn range(&self) -> Result<DateRange, BookingError> {
        DateRange::new(self.start_date, self.end_date)
    }

    /// The change claims the stay's dates on the property calendar.
    #[must_use]
    pub fn claims_calendar(&self) -> bool {
        self.new_status == BookingStatus::Accepted
    }

    /// The change gives previously claimed dates back.
    ///
    /// Only an accepted stay ever blocked the calendar, so cancelling a
    /// pending booking releases nothing.
    #[must_use]
    pub fn releases_calendar(&self) -> bool {
        self.new_status == BookingStatus::Cancelled && self.old_status == BookingStatus::Accepted
    }
}

/// Every event on the booking topics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum BookingEvent {
    /// See [`BookingCreated`]
    #[serde(rename = "BOOKING_CREATED")]
    Created(BookingCreated),
    /// See [`BookingStatusChanged`]
    #[serde(rename = "BOOKING_STATUS_UPDATED")]
    StatusChanged(BookingStatusChanged),
}

impl BookingEvent {
    /// Wire name of [`BookingEvent::Created`].
    pub const CREATED: &'static str = "BOOKING_CREATED";
    /// Wire name of [`BookingEvent::StatusChanged`].
    pub const STATUS_CHANGED: &'static str = "BOOKING_STATUS_UPDATED";

    /// The booking this event is about.
    #[must_use]
    pub const fn booking_id(&self) -> BookingId {
        match self {
            Self::Created(e) => e.booking_id,
            Self::StatusChanged(e) => e.booking_id,
        }
    }

    /// Topic this event is published on.
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::Created(_) => BOOKING_REQUESTS_TOPIC,
            Self::StatusChanged(_) => BOOKING_STATUS_TOPIC,
        }
    }
}

impl Event for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => Self::CREATED,
            Self::StatusChanged(_) => Self::STATUS_CHANGED,
        }
    }

    fn partition_key(&self) -> Option<String> {
        Some(self.booking_id().to_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use crate::event::SerializedEvent;

    fn changed(old: BookingStatus, new: BookingStatus) -> BookingStatusChanged {
        BookingStatusChanged {
            booking_id: BookingId::new(),
            property_id: PropertyId::new(),
            traveler_id: TravelerId::new(),
            start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 5).unwrap(),
            old_status: old,
            new_status: new,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn status_event_wire_shape() {
        let payload = changed(BookingStatus::Pending, BookingStatus::Accepted);
        let booking_id = payload.booking_id;
        let event = BookingEvent::StatusChanged(payload);

        let serialized = SerializedEvent::from_event(&event).unwrap();
        assert_eq!(serialized.event_type, "BOOKING_STATUS_UPDATED");
        assert_eq!(serialized.key, Some(booking_id.to_string()));

        let json: serde_json::Value = serde_json::from_slice(&serialized.data).unwrap();
        assert_eq!(json["eventType"], "BOOKING_STATUS_UPDATED");
        assert_eq!(json["oldStatus"], "pending");
        assert_eq!(json["newStatus"], "accepted");
        assert_eq!(json["startDate"], "2025-06-01");

        assert_eq!(serialized.decode::<BookingEvent>().unwrap(), event);
        assert_eq!(event.topic(), BOOKING_STATUS_TOPIC);
    }

    #[test]
    fn only_accepted_to_cancelled_releases_dates() {
        use BookingStatus::{Accepted, Cancelled, Pending};

        assert!(changed(Pending, Accepted).claims_calendar());
        assert!(changed(Accepted, Cancelled).releases_calendar());
        assert!(!changed(Pending, Cancelled).releases_calendar());
        assert!(!changed(Pending, Cancelled).claims_calendar());
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let err = serde_json::from_str::<BookingEvent>(r#"{"eventType":"PROPERTY_DELETED"}"#);
        assert!(err.is_err());
    }
}
