//! Status resynchronisation from `booking-status-updates`.
//!
//! The Gateway writes status through the Booking Authority before it
//! publishes, so in the normal case the event finds the status already
//! applied. The handler still re-applies it (a no-op then) and drops the
//! cached copy, which keeps other instances' caches honest.

use crate::authority::BookingAuthority;
use async_trait::async_trait;
use staysync_core::error::BookingError;
use staysync_core::event::SerializedEvent;
use staysync_core::events::BookingEvent;
use staysync_runtime::handler::{EventHandler, HandlerError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Applies consumed status changes to booking records.
pub struct StatusResyncHandler {
    bookings: Arc<BookingAuthority>,
}

impl StatusResyncHandler {
    /// Create a handler writing through `bookings`.
    #[must_use]
    pub fn new(bookings: Arc<BookingAuthority>) -> Self {
        Self { bookings }
    }
}

#[async_trait]
impl EventHandler for StatusResyncHandler {
    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError> {
        let BookingEvent::StatusChanged(changed) = event.decode::<BookingEvent>()? else {
            return Ok(());
        };

        self.bookings.invalidate(changed.booking_id).await;
        match self
            .bookings
            .apply_status_change(changed.booking_id, changed.new_status)
            .await
        {
            Ok(change) if change.applied => {
                info!(
                    booking_id = %changed.booking_id,
                    from = %change.previous,
                    to = %changed.new_status,
                    "Booking status resynchronised from event"
                );
                Ok(())
            }
            Ok(_) => {
                debug!(booking_id = %changed.booking_id, status = %changed.new_status, "Status already current");
                Ok(())
            }
            Err(BookingError::InvalidTransition { from, to }) => {
                warn!(
                    booking_id = %changed.booking_id,
                    %from,
                    %to,
                    "Skipping stale or out-of-order status event"
                );
                Ok(())
            }
            Err(error) if error.is_retriable() => Err(HandlerError::Retriable(error.to_string())),
            Err(error) => Err(HandlerError::Permanent(error.to_string())),
        }
    }
}
