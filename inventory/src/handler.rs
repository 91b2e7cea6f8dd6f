//! Calendar synchronisation from booking status events.
//!
//! Subscribed to `booking-status-updates`. An accepted booking claims its
//! range, a cancelled booking that had been accepted gives it back; every
//! other transition leaves the calendar alone. Each command is idempotent, so
//! redelivery is harmless.

use async_trait::async_trait;
use staysync_core::error::InventoryError;
use staysync_core::event::SerializedEvent;
use staysync_core::events::{BookingEvent, BookingStatusChanged};
use staysync_core::ports::InventoryService;
use staysync_runtime::handler::{EventHandler, HandlerError};
use std::sync::Arc;
use tracing::{debug, info};

/// Applies status changes to property calendars.
pub struct CalendarSyncHandler {
    inventory: Arc<dyn InventoryService>,
}

impl CalendarSyncHandler {
    /// Create a handler writing through `inventory`.
    #[must_use]
    pub fn new(inventory: Arc<dyn InventoryService>) -> Self {
        Self { inventory }
    }

    async fn on_status_changed(&self, event: &BookingStatusChanged) -> Result<(), HandlerError> {
        let range = event
            .range()
            .map_err(|e| HandlerError::Permanent(format!("malformed stay dates: {e}")))?;

        if event.claims_calendar() {
            let outcome = self
                .inventory
                .block_range(event.property_id, range, Some(event.booking_id))
                .await
                .map_err(classify)?;
            info!(
                booking_id = %event.booking_id,
                property_id = %event.property_id,
                %range,
                ?outcome,
                "Stay blocked on calendar"
            );
        } else if event.releases_calendar() {
            let outcome = self
                .inventory
                .unblock_range(event.property_id, range, Some(event.booking_id))
                .await
                .map_err(classify)?;
            info!(
                booking_id = %event.booking_id,
                property_id = %event.property_id,
                %range,
                ?outcome,
                "Stay released from calendar"
            );
        } else {
            debug!(
                booking_id = %event.booking_id,
                old_status = %event.old_status,
                new_status = %event.new_status,
                "Status change does not touch the calendar"
            );
        }
        Ok(())
    }
}

fn classify(error: InventoryError) -> HandlerError {
    if error.is_retriable() {
        HandlerError::Retriable(error.to_string())
    } else {
        HandlerError::Permanent(error.to_string())
    }
}

#[async_trait]
impl EventHandler for CalendarSyncHandler {
    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError> {
        match event.decode::<BookingEvent>()? {
            BookingEvent::StatusChanged(changed) => self.on_status_changed(&changed).await,
            BookingEvent::Created(created) => {
                debug!(booking_id = %created.booking_id, "Ignoring booking request on status topic");
                Ok(())
            }
        }
    }
}
