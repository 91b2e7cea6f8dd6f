//! Publishing after a committed mutation.
//!
//! The mutation is already durable when [`announce`] runs, so a failed publish
//! is not an error for the caller. It is logged, counted and handed back as
//! [`Delivery::Undelivered`]; the reconciliation job repairs what the missing
//! event would have done.

use crate::metrics::EventBusMetrics;
use staysync_core::event::Event;
use staysync_core::event_bus::{EventBus, publish_event};
use staysync_core::events::BookingEvent;
use staysync_core::outcome::Delivery;
use tracing::{debug, warn};

/// Publish `event` on its topic and report whether it got there.
pub async fn announce(event_bus: &dyn EventBus, event: &BookingEvent) -> Delivery {
    let topic = event.topic();
    match publish_event(event_bus, topic, event).await {
        Ok(()) => {
            debug!(
                booking_id = %event.booking_id(),
                event_type = event.event_type(),
                topic,
                "Event published"
            );
            Delivery::Published
        }
        Err(error) => {
            EventBusMetrics::record_publish_failure(topic);
            warn!(
                booking_id = %event.booking_id(),
                event_type = event.event_type(),
                topic,
                error = %error,
                "Mutation committed but event was not published"
            );
            Delivery::from(Err(error))
        }
    }
}
