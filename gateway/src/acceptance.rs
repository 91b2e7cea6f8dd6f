//! Owner decisions on bookings.
//!
//! Accepting a stay claims its dates with an atomic compare-and-block on the
//! Inventory Authority before the status is written, so two overlapping
//! pending bookings can never both be accepted. If the status write then
//! fails the block is released again.
//!
//! ```text
//! accept ─► ownership ─► pending? ─► try-block ─► status=accepted ─► publish
//!                                       │ conflict        │ failure
//!                                       ▼                 ▼
//!                                NowUnavailable     unblock (compensate)
//! ```

use crate::dashboard::OwnerDashboard;
use staysync_core::error::{BookingError, InventoryError};
use staysync_core::event_bus::EventBus;
use staysync_core::events::{BookingEvent, BookingStatusChanged};
use staysync_core::outcome::Outcome;
use staysync_core::ports::{BookingLedger, InventoryService, StatusChange};
use staysync_core::types::{Booking, BookingId, BookingStatus, OwnerId};
use staysync_runtime::announce;
use staysync_runtime::metrics::BookingMetrics;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Default deadline for inventory calls made while accepting.
pub const DEFAULT_INVENTORY_TIMEOUT: Duration = Duration::from_secs(2);

/// Accepts and cancels bookings on behalf of property owners.
pub struct AcceptanceGateway {
    bookings: Arc<dyn BookingLedger>,
    inventory: Arc<dyn InventoryService>,
    event_bus: Arc<dyn EventBus>,
    inventory_timeout: Duration,
}

impl AcceptanceGateway {
    /// Create a gateway.
    #[must_use]
    pub fn new(
        bookings: Arc<dyn BookingLedger>,
        inventory: Arc<dyn InventoryService>,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            bookings,
            inventory,
            event_bus,
            inventory_timeout: DEFAULT_INVENTORY_TIMEOUT,
        }
    }

    /// Deadline for inventory calls.
    #[must_use]
    pub const fn with_inventory_timeout(mut self, timeout: Duration) -> Self {
        self.inventory_timeout = timeout;
        self
    }

    /// Accept a pending booking.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Forbidden`] if `caller` does not own the booking
    /// - [`BookingError::InvalidTransition`] unless the booking is pending
    /// - [`BookingError::NowUnavailable`] if the dates were taken meanwhile
    /// - [`BookingError::InventoryUnavailable`] if the calendar cannot be reached
    #[instrument(skip_all, fields(booking_id = %id, owner_id = %caller))]
    pub async fn accept(&self, id: BookingId, caller: OwnerId) -> Result<Outcome<Booking>, BookingError> {
        let booking = self.owned_booking(id, caller).await?;
        if booking.status != BookingStatus::Pending {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Accepted,
            });
        }

        let claim = self
            .bounded(self.inventory.try_block_range(booking.property_id, booking.range, id))
            .await;
        match claim {
            Ok(outcome) => info!(property_id = %booking.property_id, ?outcome, "Dates claimed"),
            Err(InventoryError::Conflict { .. }) => {
                BookingMetrics::record_accept_conflict();
                warn!(property_id = %booking.property_id, range = %booking.range, "Dates taken before acceptance");
                return Err(BookingError::NowUnavailable);
            }
            Err(e) => return Err(e.into()),
        }

        let change = match self
            .bookings
            .apply_status_change(id, BookingStatus::Accepted)
            .await
        {
            Ok(change) => change,
            Err(e) => {
                self.release(&booking).await;
                return Err(e);
            }
        };
        if !change.applied {
            // A concurrent accept of this booking won; the block is its own.
            warn!("Booking accepted concurrently; nothing to announce");
            return Err(BookingError::InvalidTransition {
                from: change.previous,
                to: BookingStatus::Accepted,
            });
        }

        Ok(self.publish(change).await)
    }

    /// Cancel a pending or accepted booking.
    ///
    /// The calendar is released by the Inventory Authority when it consumes
    /// the status event, and only for a booking that had been accepted.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Forbidden`] if `caller` does not own the booking
    /// - [`BookingError::AlreadyCancelled`] if it is already cancelled
    #[instrument(skip_all, fields(booking_id = %id, owner_id = %caller))]
    pub async fn cancel(&self, id: BookingId, caller: OwnerId) -> Result<Outcome<Booking>, BookingError> {
        let booking = self.owned_booking(id, caller).await?;
        if booking.status == BookingStatus::Cancelled {
            return Err(BookingError::AlreadyCancelled);
        }

        let change = self
            .bookings
            .apply_status_change(id, BookingStatus::Cancelled)
            .await?;
        if !change.applied {
            return Err(BookingError::AlreadyCancelled);
        }

        Ok(self.publish(change).await)
    }

    /// Bookings on the caller's properties, newest first.
    ///
    /// # Errors
    ///
    /// [`BookingError::Storage`] on storage failure.
    pub async fn owner_bookings(
        &self,
        caller: OwnerId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, BookingError> {
        self.bookings.list_by_owner(caller, status).await
    }

    /// Counts, accepted revenue, recent bookings and pending requests for
    /// the caller's properties.
    ///
    /// # Errors
    ///
    /// Propagates ledger failures.
    #[instrument(skip_all, fields(owner_id = %caller))]
    pub async fn owner_dashboard(&self, caller: OwnerId) -> Result<OwnerDashboard, BookingError> {
        let bookings = self.bookings.list_by_owner(caller, None).await?;
        Ok(OwnerDashboard::from_bookings(bookings))
    }

    /// One booking, if the caller owns it.
    ///
    /// # Errors
    ///
    /// [`BookingError::BookingNotFound`] or [`BookingError::Forbidden`].
    pub async fn owner_booking(&self, id: BookingId, caller: OwnerId) -> Result<Booking, BookingError> {
        self.owned_booking(id, caller).await
    }

    async fn owned_booking(&self, id: BookingId, caller: OwnerId) -> Result<Booking, BookingError> {
        let booking = self.bookings.get(id).await?;
        if booking.owner_id != caller {
            warn!(booking_id = %id, owner_id = %caller, "Caller does not own booking");
            return Err(BookingError::Forbidden);
        }
        Ok(booking)
    }

    async fn publish(&self, change: StatusChange) -> Outcome<Booking> {
        let event = BookingEvent::StatusChanged(BookingStatusChanged::from_booking(
            &change.booking,
            change.previous,
        ));
        let delivery = announce(self.event_bus.as_ref(), &event).await;
        Outcome::new(change.booking, delivery)
    }

    /// Give back dates claimed for a booking whose status write failed.
    async fn release(&self, booking: &Booking) {
        match self
            .bounded(self.inventory.unblock_range(
                booking.property_id,
                booking.range,
                Some(booking.id),
            ))
            .await
        {
            Ok(outcome) => {
                warn!(booking_id = %booking.id, ?outcome, "Released dates after failed status write");
            }
            Err(e) => {
                error!(
                    booking_id = %booking.id,
                    property_id = %booking.property_id,
                    error = %e,
                    "Could not release dates after failed status write; reconciliation will repair"
                );
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, InventoryError>>,
    ) -> Result<T, InventoryError> {
        tokio::time::timeout(self.inventory_timeout, call)
            .await
            .map_err(|_| {
                InventoryError::Unavailable(format!(
                    "inventory call exceeded {}ms",
                    self.inventory_timeout.as_millis()
                ))
            })?
    }
}
