//! # StaySync Gateway
//!
//! The Acceptance Gateway is where property owners decide on pending
//! bookings. It never owns state: status goes through the Booking Authority
//! ([`BookingLedger`](staysync_core::ports::BookingLedger)) and dates through
//! the Inventory Authority
//! ([`InventoryService`](staysync_core::ports::InventoryService)). After a
//! status is durable the gateway publishes `BOOKING_STATUS_UPDATED`, which
//! the calendar-sync consumer turns into a block or an unblock.

pub mod acceptance;
pub mod api;
pub mod dashboard;
pub mod handler;

pub use acceptance::AcceptanceGateway;
pub use dashboard::OwnerDashboard;
pub use handler::BookingRequestHandler;
