//! Periodic repair of drift between booking status and property calendars.
//!
//! Events are delivered at least once, but a status can be committed and its
//! event lost (publish failure), or a calendar command can be dead-lettered.
//! The reconciler compares the two authorities directly:
//!
//! - an accepted booking whose range is not held on its calendar is
//!   re-blocked (tagged with the booking); if the dates were taken in the
//!   meantime it is reported as a conflict for an operator
//! - a range held by a booking that is now cancelled is released

use staysync_booking::BookingRepository;
use staysync_core::error::{BookingError, InventoryError};
use staysync_core::ports::{BlockOutcome, InventoryService, UnblockOutcome};
use staysync_core::types::{BlockedRange, Booking, BookingId, BookingStatus, PropertyId};
use staysync_runtime::metrics::ReconcileMetrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

/// Failures that abort a reconciliation pass.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Booking storage failed
    #[error(transparent)]
    Booking(#[from] BookingError),
    /// The Inventory Authority failed
    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

/// What one pass found and fixed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Accepted bookings inspected
    pub accepted_checked: usize,
    /// Accepted bookings whose range was blocked again
    pub reblocked: usize,
    /// Ranges released because their booking is cancelled
    pub released: usize,
    /// Accepted bookings whose dates are held by another stay
    pub conflicts: Vec<BookingId>,
    /// Bookings whose property is unknown to the Inventory Authority
    pub missing_properties: Vec<BookingId>,
}

impl ReconcileReport {
    /// True when nothing needed attention.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.reblocked == 0
            && self.released == 0
            && self.conflicts.is_empty()
            && self.missing_properties.is_empty()
    }
}

/// Compares accepted/cancelled bookings with blocked ranges.
pub struct Reconciler {
    bookings: Arc<dyn BookingRepository>,
    inventory: Arc<dyn InventoryService>,
}

impl Reconciler {
    /// Create a reconciler over both authorities.
    #[must_use]
    pub fn new(bookings: Arc<dyn BookingRepository>, inventory: Arc<dyn InventoryService>) -> Self {
        Self { bookings, inventory }
    }

    /// Run one pass.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] on storage failure or when the Inventory
    /// Authority cannot be reached.
    #[instrument(skip_all)]
    pub async fn run_once(&self) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::default();
        let mut calendars = Calendars::default();

        // Releases first, so an accepted stay can take dates a cancelled one
        // still holds.
        for booking in self.bookings.list_by_status(BookingStatus::Cancelled).await? {
            self.check_cancelled(&booking, &mut calendars, &mut report)
                .await?;
        }

        for booking in self.bookings.list_by_status(BookingStatus::Accepted).await? {
            report.accepted_checked += 1;
            self.check_accepted(&booking, &mut calendars, &mut report)
                .await?;
        }

        ReconcileMetrics::record_repair("reblocked", report.reblocked);
        ReconcileMetrics::record_repair("released", report.released);
        ReconcileMetrics::record_repair("conflict", report.conflicts.len());

        if report.is_clean() {
            debug!(checked = report.accepted_checked, "Calendars consistent");
        } else {
            info!(
                checked = report.accepted_checked,
                reblocked = report.reblocked,
                released = report.released,
                conflicts = report.conflicts.len(),
                missing_properties = report.missing_properties.len(),
                "Reconciliation repaired drift"
            );
        }
        Ok(report)
    }

    async fn check_accepted(
        &self,
        booking: &Booking,
        calendars: &mut Calendars,
        report: &mut ReconcileReport,
    ) -> Result<(), ReconcileError> {
        let Some(blocked) = calendars.get(self.inventory.as_ref(), booking.property_id).await? else {
            report.missing_properties.push(booking.id);
            return Ok(());
        };
        let held = blocked.iter().any(|b| {
            b.range == booking.range && b.booking_id.is_none_or(|held| held == booking.id)
        });
        if held {
            return Ok(());
        }

        match self
            .inventory
            .try_block_range(booking.property_id, booking.range, booking.id)
            .await
        {
            Ok(BlockOutcome::Blocked) => {
                warn!(
                    booking_id = %booking.id,
                    property_id = %booking.property_id,
                    range = %booking.range,
                    "Accepted booking was not blocked; re-blocked"
                );
                report.reblocked += 1;
                calendars.forget(booking.property_id);
            }
            Ok(BlockOutcome::AlreadyBlocked) => {}
            Err(InventoryError::Conflict { .. }) => {
                error!(
                    booking_id = %booking.id,
                    property_id = %booking.property_id,
                    range = %booking.range,
                    "Accepted booking overlaps another stay; needs manual resolution"
                );
                report.conflicts.push(booking.id);
            }
            Err(InventoryError::PropertyNotFound(_)) => report.missing_properties.push(booking.id),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn check_cancelled(
        &self,
        booking: &Booking,
        calendars: &mut Calendars,
        report: &mut ReconcileReport,
    ) -> Result<(), ReconcileError> {
        let Some(blocked) = calendars.get(self.inventory.as_ref(), booking.property_id).await? else {
            return Ok(());
        };
        let stale: Vec<BlockedRange> = blocked
            .iter()
            .filter(|b| b.booking_id == Some(booking.id))
            .copied()
            .collect();

        for entry in stale {
            let outcome = self
                .inventory
                .unblock_range(booking.property_id, entry.range, Some(booking.id))
                .await?;
            if outcome == UnblockOutcome::Released {
                warn!(
                    booking_id = %booking.id,
                    property_id = %booking.property_id,
                    range = %entry.range,
                    "Cancelled booking still held dates; released"
                );
                report.released += 1;
                calendars.forget(booking.property_id);
            }
        }
        Ok(())
    }

    /// Run a pass every `interval` until `shutdown` fires.
    ///
    /// A failed pass is logged and retried on the next tick.
    pub async fn run_every(self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "Reconciliation job started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Reconciliation job stopping");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        warn!(error = %e, "Reconciliation pass failed");
                    }
                }
            }
        }
    }
}

/// Blocked ranges fetched during one pass.
#[derive(Default)]
struct Calendars(HashMap<PropertyId, Option<Vec<BlockedRange>>>);

impl Calendars {
    /// Blocked ranges of a property, `None` for unknown properties.
    async fn get(
        &mut self,
        inventory: &dyn InventoryService,
        property_id: PropertyId,
    ) -> Result<Option<Vec<BlockedRange>>, InventoryError> {
        if let Some(cached) = self.0.get(&property_id) {
            return Ok(cached.clone());
        }
        let fetched = match inventory.blocked_ranges(property_id).await {
            Ok(blocked) => Some(blocked),
            Err(InventoryError::PropertyNotFound(_)) => None,
            Err(e) => return Err(e),
        };
        self.0.insert(property_id, fetched.clone());
        Ok(fetched)
    }

    fn forget(&mut self, property_id: PropertyId) {
        self.0.remove(&property_id);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use staysync_booking::InMemoryBookingRepository;
    use staysync_core::environment::Clock;
    use staysync_core::types::{DateRange, Money, PropertyRecord, TravelerId};
    use staysync_inventory::{InMemoryPropertyStore, InventoryAuthority};
    use staysync_testing::fixtures::{june_range, property};
    use staysync_testing::test_clock;

    struct Fixture {
        repo: Arc<InMemoryBookingRepository>,
        inventory: Arc<InventoryAuthority>,
        record: PropertyRecord,
        reconciler: Reconciler,
    }

    async fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryBookingRepository::new());
        let inventory = Arc::new(InventoryAuthority::new(Arc::new(InMemoryPropertyStore::new())));
        let record = property();
        inventory.register_property(record.clone(), None).await.unwrap();
        let reconciler = Reconciler::new(repo.clone(), inventory.clone());
        Fixture {
            repo,
            inventory,
            record,
            reconciler,
        }
    }

    async fn stored(f: &Fixture, range: DateRange, status: BookingStatus) -> Booking {
        let now = test_clock().now();
        let booking = Booking {
            id: BookingId::new(),
            property_id: f.record.property_id,
            traveler_id: TravelerId::new(),
            owner_id: f.record.owner_id,
            range,
            guest_count: 1,
            total_price: Money::from_cents(10_000),
            status,
            created_at: now,
            updated_at: now,
        };
        f.repo.insert(&booking).await.unwrap();
        booking
    }

    #[tokio::test]
    async fn consistent_state_is_clean() {
        let f = fixture().await;
        let booking = stored(&f, june_range(1, 5), BookingStatus::Accepted).await;
        f.inventory
            .block_range(f.record.property_id, booking.range, Some(booking.id))
            .await
            .unwrap();

        let report = f.reconciler.run_once().await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.accepted_checked, 1);
    }

    #[tokio::test]
    async fn lost_accept_event_is_reblocked() {
        let f = fixture().await;
        let booking = stored(&f, june_range(1, 5), BookingStatus::Accepted).await;

        let report = f.reconciler.run_once().await.unwrap();
        assert_eq!(report.reblocked, 1);

        let blocked = f.inventory.blocked_ranges(f.record.property_id).await.unwrap();
        assert_eq!(blocked, vec![BlockedRange::new(booking.range, Some(booking.id))]);

        assert!(f.reconciler.run_once().await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn lost_cancel_event_is_released() {
        let f = fixture().await;
        let booking = stored(&f, june_range(1, 5), BookingStatus::Cancelled).await;
        f.inventory
            .block_range(f.record.property_id, booking.range, Some(booking.id))
            .await
            .unwrap();

        let report = f.reconciler.run_once().await.unwrap();
        assert_eq!(report.released, 1);
        assert!(
            f.inventory
                .is_available(f.record.property_id, booking.range)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn cancelled_booking_does_not_release_a_later_stay() {
        let f = fixture().await;
        let cancelled = stored(&f, june_range(1, 5), BookingStatus::Cancelled).await;
        let later = stored(&f, june_range(1, 5), BookingStatus::Accepted).await;
        f.inventory
            .block_range(f.record.property_id, later.range, Some(later.id))
            .await
            .unwrap();

        let report = f.reconciler.run_once().await.unwrap();
        assert!(report.is_clean(), "{report:?}");
        let blocked = f.inventory.blocked_ranges(f.record.property_id).await.unwrap();
        assert_eq!(blocked[0].booking_id, Some(later.id));
        assert_ne!(blocked[0].booking_id, Some(cancelled.id));
    }

    #[tokio::test]
    async fn overlapping_accepted_stays_are_reported() {
        let f = fixture().await;
        let held = stored(&f, june_range(1, 5), BookingStatus::Accepted).await;
        let orphan = stored(&f, june_range(3, 7), BookingStatus::Accepted).await;
        f.inventory
            .block_range(f.record.property_id, held.range, Some(held.id))
            .await
            .unwrap();

        let report = f.reconciler.run_once().await.unwrap();
        assert_eq!(report.conflicts, vec![orphan.id]);
        assert_eq!(report.reblocked, 0);
    }

    #[tokio::test]
    async fn dates_freed_by_a_cancellation_are_reblocked_in_one_pass() {
        let f = fixture().await;
        let cancelled = stored(&f, june_range(1, 5), BookingStatus::Cancelled).await;
        let accepted = stored(&f, june_range(3, 7), BookingStatus::Accepted).await;
        f.inventory
            .block_range(f.record.property_id, cancelled.range, Some(cancelled.id))
            .await
            .unwrap();

        let report = f.reconciler.run_once().await.unwrap();
        assert_eq!(report.released, 1);
        assert_eq!(report.reblocked, 1);
        assert!(report.conflicts.is_empty());

        let blocked = f.inventory.blocked_ranges(f.record.property_id).await.unwrap();
        assert_eq!(blocked, vec![BlockedRange::new(accepted.range, Some(accepted.id))]);
    }

    #[tokio::test]
    async fn unknown_property_is_reported() {
        let f = fixture().await;
        let mut booking = stored(&f, june_range(1, 5), BookingStatus::Pending).await;
        booking.id = BookingId::new();
        booking.property_id = PropertyId::new();
        booking.status = BookingStatus::Accepted;
        f.repo.insert(&booking).await.unwrap();

        let report = f.reconciler.run_once().await.unwrap();
        assert_eq!(report.missing_properties, vec![booking.id]);
    }
}
