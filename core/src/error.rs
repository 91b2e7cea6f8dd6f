//! Error taxonomy for the booking flow.
//!
//! Validation and ownership failures are returned to the caller and never
//! retried. Infrastructure failures carry [`InventoryError::is_retriable`] so
//! event consumers can decide between backoff and dead-lettering.

use crate::types::{BookingId, BookingStatus, DateRange, PropertyId};
use thiserror::Error;

/// Errors surfaced by the Booking Authority and the Acceptance Gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// End date is not after start date.
    #[error("end date must be after start date")]
    InvalidDateRange,

    /// Requested range is outside the window or overlaps a blocked range.
    #[error("property is not available for the requested dates")]
    NotAvailable,

    /// The range became unavailable between request and acceptance.
    #[error("property is no longer available for the requested dates")]
    NowUnavailable,

    /// More guests than the property allows.
    #[error("guest count {requested} exceeds the property limit of {max}")]
    GuestLimitExceeded {
        /// Requested guests
        requested: u32,
        /// Property maximum
        max: u32,
    },

    /// The requested status is not reachable from the current one.
    #[error("booking is already {from}")]
    InvalidTransition {
        /// Current status
        from: BookingStatus,
        /// Requested status
        to: BookingStatus,
    },

    /// Caller is not the owner of the booked property.
    #[error("caller is not the owner of this booking")]
    Forbidden,

    /// Booking was already cancelled.
    #[error("booking is already cancelled")]
    AlreadyCancelled,

    /// Unknown property.
    #[error("property {0} not found")]
    PropertyNotFound(PropertyId),

    /// Unknown booking.
    #[error("booking {0} not found")]
    BookingNotFound(BookingId),

    /// The Inventory Authority could not be reached in time.
    #[error("inventory service unavailable: {0}")]
    InventoryUnavailable(String),

    /// Malformed request field other than dates.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Booking storage failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl BookingError {
    /// Stable machine-readable code for API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidDateRange => "INVALID_DATES",
            Self::NotAvailable => "NOT_AVAILABLE",
            Self::NowUnavailable => "NOW_UNAVAILABLE",
            Self::GuestLimitExceeded { .. } => "EXCEEDS_GUEST_LIMIT",
            Self::InvalidTransition { .. } => "INVALID_STATUS",
            Self::Forbidden => "FORBIDDEN",
            Self::AlreadyCancelled => "ALREADY_CANCELLED",
            Self::PropertyNotFound(_) => "PROPERTY_NOT_FOUND",
            Self::BookingNotFound(_) => "BOOKING_NOT_FOUND",
            Self::InventoryUnavailable(_) => "INVENTORY_UNAVAILABLE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Infrastructure failures a consumer may retry.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::InventoryUnavailable(_) | Self::Storage(_))
    }
}

/// Errors surfaced by the Inventory Authority.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Unknown property.
    #[error("property {0} not found")]
    PropertyNotFound(PropertyId),

    /// The range overlaps an existing blocked range.
    #[error("range {range} conflicts with a blocked range on property {property_id}")]
    Conflict {
        /// Property whose calendar rejected the block
        property_id: PropertyId,
        /// Rejected range
        range: DateRange,
    },

    /// Timeout or transport failure talking to a remote Inventory Authority.
    #[error("inventory unavailable: {0}")]
    Unavailable(String),

    /// Calendar storage failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl InventoryError {
    /// Stable machine-readable code for API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::PropertyNotFound(_) => "PROPERTY_NOT_FOUND",
            Self::Conflict { .. } => "NOW_UNAVAILABLE",
            Self::Unavailable(_) => "INVENTORY_UNAVAILABLE",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Failures that may succeed on redelivery.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Storage(_))
    }
}

impl From<InventoryError> for BookingError {
    fn from(error: InventoryError) -> Self {
        match error {
            InventoryError::PropertyNotFound(id) => Self::PropertyNotFound(id),
            InventoryError::Conflict { .. } => Self::NowUnavailable,
            InventoryError::Unavailable(reason) | InventoryError::Storage(reason) => {
                Self::InventoryUnavailable(reason)
            }
        }
    }
}
