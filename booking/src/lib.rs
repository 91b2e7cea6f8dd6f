//! # StaySync Booking
//!
//! The Booking Authority owns booking records. It checks availability with
//! the Inventory Authority when a stay is requested, persists the booking as
//! pending and announces it on `booking-requests`. Status changes arrive from
//! the Acceptance Gateway directly, or from `booking-status-updates` through
//! [`StatusResyncHandler`].
//!
//! - [`authority`]: [`BookingAuthority`]
//! - [`repository`]: [`BookingRepository`] and its in-memory implementation
//! - [`cache`]: read-through cache for single-booking reads
//! - [`api`]: HTTP routes
//! - [`handler`]: the status-resync consumer

pub mod api;
pub mod authority;
pub mod cache;
pub mod handler;
pub mod repository;

pub use authority::{BookingAuthority, CreateBooking};
pub use cache::BookingCache;
pub use handler::StatusResyncHandler;
pub use repository::{BookingRepository, InMemoryBookingRepository};
