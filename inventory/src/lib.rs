//! # StaySync Inventory
//!
//! The Inventory Authority owns each property's calendar of blocked ranges
//! and is the only writer of it.
//!
//! - [`calendar`]: the per-property aggregate and its block/unblock rules
//! - [`store`]: calendar persistence ([`PropertyStore`])
//! - [`authority`]: [`InventoryAuthority`], the in-process
//!   [`InventoryService`](staysync_core::ports::InventoryService)
//! - [`api`]: HTTP routes
//! - [`client`]: [`HttpInventoryClient`] for callers in another process
//! - [`handler`]: [`CalendarSyncHandler`], keeping calendars in step with
//!   booking status events
//!
//! ```
//! use staysync_core::types::DateRange;
//! use staysync_core::NaiveDate;
//!
//! let day = |d| NaiveDate::from_ymd_opt(2025, 6, d).unwrap_or_default();
//! let stay = DateRange::new(day(1), day(5)).unwrap();
//! assert_eq!(stay.nights(), 4);
//! ```

pub mod api;
pub mod authority;
pub mod calendar;
pub mod client;
pub mod handler;
pub mod store;

pub use authority::InventoryAuthority;
pub use calendar::{CalendarChange, CalendarCommand, PropertyCalendar};
pub use client::HttpInventoryClient;
pub use handler::CalendarSyncHandler;
pub use store::{InMemoryPropertyStore, PropertyStore};
