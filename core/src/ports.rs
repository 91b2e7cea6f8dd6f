//! Service boundaries between the authorities.
//!
//! [`InventoryService`] is what the Booking Authority, the Acceptance Gateway
//! and the reconciliation job see of the Inventory Authority, whether it runs
//! in-process or behind HTTP. [`BookingLedger`] is what the Gateway and the
//! reconciliation job see of the Booking Authority.

use crate::error::{BookingError, InventoryError};
use crate::types::{
    BlockedRange, Booking, BookingId, BookingStatus, DateRange, OwnerId, PropertyId,
    PropertyRecord,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Answer to an availability query, with the property facts it was checked against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityAnswer {
    /// The property record used for the check
    pub property: PropertyRecord,
    /// Whether the range is free
    pub available: bool,
}

/// Result of a block request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockOutcome {
    /// A new blocked range was recorded.
    Blocked,
    /// The exact range was already blocked; nothing changed.
    AlreadyBlocked,
}

/// Result of an unblock request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnblockOutcome {
    /// The matching blocked range was removed.
    Released,
    /// No matching range; nothing changed.
    NotBlocked,
}

/// The Inventory Authority as seen by its callers.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Look up a property record.
    ///
    /// # Errors
    ///
    /// [`InventoryError::PropertyNotFound`] for unknown properties.
    async fn property(&self, property_id: PropertyId) -> Result<PropertyRecord, InventoryError>;

    /// Check a range and return the property it was checked against.
    ///
    /// # Errors
    ///
    /// [`InventoryError::PropertyNotFound`] for unknown properties,
    /// [`InventoryError::Unavailable`] when a remote authority cannot be reached.
    async fn availability(
        &self,
        property_id: PropertyId,
        range: DateRange,
    ) -> Result<AvailabilityAnswer, InventoryError>;

    /// True iff the range is inside the window and overlaps no blocked range.
    ///
    /// # Errors
    ///
    /// Same as [`InventoryService::availability`].
    async fn is_available(
        &self,
        property_id: PropertyId,
        range: DateRange,
    ) -> Result<bool, InventoryError> {
        Ok(self.availability(property_id, range).await?.available)
    }

    /// Record a blocked range. Idempotent per exact range.
    ///
    /// # Errors
    ///
    /// [`InventoryError::PropertyNotFound`] for unknown properties,
    /// [`InventoryError::Conflict`] if a different range overlaps.
    async fn block_range(
        &self,
        property_id: PropertyId,
        range: DateRange,
        booking_id: Option<BookingId>,
    ) -> Result<BlockOutcome, InventoryError>;

    /// Atomically re-check availability and block on success.
    ///
    /// Succeeds with [`BlockOutcome::AlreadyBlocked`] when the exact range is
    /// already held for the same booking.
    ///
    /// # Errors
    ///
    /// [`InventoryError::Conflict`] if any other blocked range overlaps.
    async fn try_block_range(
        &self,
        property_id: PropertyId,
        range: DateRange,
        booking_id: BookingId,
    ) -> Result<BlockOutcome, InventoryError>;

    /// Remove the exactly matching blocked range. No-op if absent.
    ///
    /// With a booking id, only an entry held by that booking (or an untagged
    /// entry) is removed.
    ///
    /// # Errors
    ///
    /// [`InventoryError::PropertyNotFound`] for unknown properties.
    async fn unblock_range(
        &self,
        property_id: PropertyId,
        range: DateRange,
        booking_id: Option<BookingId>,
    ) -> Result<UnblockOutcome, InventoryError>;

    /// Current blocked ranges of a property.
    ///
    /// # Errors
    ///
    /// [`InventoryError::PropertyNotFound`] for unknown properties.
    async fn blocked_ranges(
        &self,
        property_id: PropertyId,
    ) -> Result<Vec<BlockedRange>, InventoryError>;
}

/// Result of [`BookingLedger::apply_status_change`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusChange {
    /// The booking after the call
    pub booking: Booking,
    /// Status before the call
    pub previous: BookingStatus,
    /// False when the booking already had the requested status
    pub applied: bool,
}

/// The Booking Authority as seen by the Acceptance Gateway.
#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Load a booking.
    ///
    /// # Errors
    ///
    /// [`BookingError::BookingNotFound`] for unknown ids.
    async fn get(&self, id: BookingId) -> Result<Booking, BookingError>;

    /// Move a booking to `status`. Re-applying the current status is a no-op.
    ///
    /// # Errors
    ///
    /// [`BookingError::InvalidTransition`] if `status` is not reachable,
    /// [`BookingError::BookingNotFound`] for unknown ids.
    async fn apply_status_change(
        &self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<StatusChange, BookingError>;

    /// Bookings of an owner, newest first.
    ///
    /// # Errors
    ///
    /// [`BookingError::Storage`] on storage failure.
    async fn list_by_owner(
        &self,
        owner_id: OwnerId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, BookingError>;

    /// All bookings currently in `status`.
    ///
    /// # Errors
    ///
    /// [`BookingError::Storage`] on storage failure.
    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>, BookingError>;
}
