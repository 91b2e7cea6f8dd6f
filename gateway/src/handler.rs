//! Consumer of `booking-requests`.
//!
//! Nothing is decided here: owners act through the HTTP routes. The handler
//! records the request so it shows up in logs and in
//! `staysync_booking_requests_received_total`.

use async_trait::async_trait;
use staysync_core::event::SerializedEvent;
use staysync_core::events::BookingEvent;
use staysync_runtime::handler::{EventHandler, HandlerError};
use staysync_runtime::metrics::BookingMetrics;
use tracing::{debug, info};

/// Surfaces new booking requests to owners.
#[derive(Debug, Default, Clone, Copy)]
pub struct BookingRequestHandler;

#[async_trait]
impl EventHandler for BookingRequestHandler {
    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError> {
        match event.decode::<BookingEvent>()? {
            BookingEvent::Created(request) => {
                BookingMetrics::record_request_received();
                info!(
                    booking_id = %request.booking_id,
                    property_id = %request.property_id,
                    owner_id = %request.owner_id,
                    start_date = %request.start_date,
                    end_date = %request.end_date,
                    guest_count = request.guest_count,
                    "Booking request awaiting owner decision"
                );
            }
            BookingEvent::StatusChanged(changed) => {
                debug!(booking_id = %changed.booking_id, "Ignoring status event on request topic");
            }
        }
        Ok(())
    }
}
