//! # StaySync server
//!
//! Configuration, wiring and lifecycle of the `staysync` binary, plus the
//! periodic reconciliation job that repairs calendars after lost or
//! reordered status events.
//!
//! One process can host the Inventory Authority, the Booking Authority
//! with the Acceptance Gateway, or both (`STAYSYNC_ROLES`).

pub mod app;
pub mod config;
pub mod reconcile;

pub use app::{Application, ApplicationBuilder};
pub use config::{Config, ConfigError, Roles};
pub use reconcile::{ReconcileError, ReconcileReport, Reconciler};
