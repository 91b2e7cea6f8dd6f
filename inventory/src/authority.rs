//! The Inventory Authority: sole writer of property calendars.

use crate::calendar::{CalendarChange, CalendarCommand, PropertyCalendar};
use crate::store::PropertyStore;
use async_trait::async_trait;
use staysync_core::error::InventoryError;
use staysync_core::ports::{AvailabilityAnswer, BlockOutcome, InventoryService, UnblockOutcome};
use staysync_core::types::{BlockedRange, BookingId, DateRange, PropertyId, PropertyRecord};
use staysync_runtime::metrics::CalendarMetrics;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// In-process Inventory Authority over a [`PropertyStore`].
#[derive(Clone)]
pub struct InventoryAuthority {
    store: Arc<dyn PropertyStore>,
}

impl InventoryAuthority {
    /// Create an authority over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn PropertyStore>) -> Self {
        Self { store }
    }

    /// Register or update a property record and its bookable window.
    ///
    /// Stands in for the external property service.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Storage`] on storage failure.
    #[instrument(skip(self, property), fields(property_id = %property.property_id))]
    pub async fn register_property(
        &self,
        property: PropertyRecord,
        window: Option<DateRange>,
    ) -> Result<PropertyCalendar, InventoryError> {
        let calendar = self.store.upsert_property(property, window).await?;
        info!(window = ?calendar.window, "Property registered");
        Ok(calendar)
    }

    /// Full calendar snapshot.
    ///
    /// # Errors
    ///
    /// [`InventoryError::PropertyNotFound`] for unknown properties.
    pub async fn calendar(&self, property_id: PropertyId) -> Result<PropertyCalendar, InventoryError> {
        self.store
            .load(property_id)
            .await?
            .ok_or(InventoryError::PropertyNotFound(property_id))
    }

    async fn run(
        &self,
        property_id: PropertyId,
        command: CalendarCommand,
    ) -> Result<CalendarChange, InventoryError> {
        let op = command.name();
        match self.store.apply(property_id, command).await {
            Ok(change) => {
                CalendarMetrics::record_mutation(op, change.name());
                if change.modified() {
                    info!(%property_id, op, outcome = change.name(), "Calendar updated");
                } else {
                    debug!(%property_id, op, outcome = change.name(), "Calendar unchanged");
                }
                Ok(change)
            }
            Err(e) => {
                let outcome = match &e {
                    InventoryError::Conflict { .. } => "conflict",
                    InventoryError::PropertyNotFound(_) => "not_found",
                    InventoryError::Unavailable(_) | InventoryError::Storage(_) => "error",
                };
                CalendarMetrics::record_mutation(op, outcome);
                warn!(%property_id, op, error = %e, "Calendar command rejected");
                Err(e)
            }
        }
    }
}

fn expect_block(change: CalendarChange) -> Result<BlockOutcome, InventoryError> {
    match change {
        CalendarChange::Block(outcome) => Ok(outcome),
        CalendarChange::Unblock(_) => Err(InventoryError::Storage(
            "block command produced an unblock result".to_string(),
        )),
    }
}

#[async_trait]
impl InventoryService for InventoryAuthority {
    async fn property(&self, property_id: PropertyId) -> Result<PropertyRecord, InventoryError> {
        Ok(self.calendar(property_id).await?.property)
    }

    async fn availability(
        &self,
        property_id: PropertyId,
        range: DateRange,
    ) -> Result<AvailabilityAnswer, InventoryError> {
        let calendar = self.calendar(property_id).await?;
        let available = calendar.is_available(&range);
        debug!(%property_id, %range, available, "Availability checked");
        Ok(AvailabilityAnswer {
            property: calendar.property,
            available,
        })
    }

    async fn block_range(
        &self,
        property_id: PropertyId,
        range: DateRange,
        booking_id: Option<BookingId>,
    ) -> Result<BlockOutcome, InventoryError> {
        expect_block(
            self.run(property_id, CalendarCommand::Block { range, booking_id })
                .await?,
        )
    }

    async fn try_block_range(
        &self,
        property_id: PropertyId,
        range: DateRange,
        booking_id: BookingId,
    ) -> Result<BlockOutcome, InventoryError> {
        expect_block(
            self.run(property_id, CalendarCommand::TryBlock { range, booking_id })
                .await?,
        )
    }

    async fn unblock_range(
        &self,
        property_id: PropertyId,
        range: DateRange,
        booking_id: Option<BookingId>,
    ) -> Result<UnblockOutcome, InventoryError> {
        match self
            .run(property_id, CalendarCommand::Unblock { range, booking_id })
            .await?
        {
            CalendarChange::Unblock(outcome) => Ok(outcome),
            CalendarChange::Block(_) => Err(InventoryError::Storage(
                "unblock command produced a block result".to_string(),
            )),
        }
    }

    async fn blocked_ranges(
        &self,
        property_id: PropertyId,
    ) -> Result<Vec<BlockedRange>, InventoryError> {
        Ok(self.calendar(property_id).await?.blocked().to_vec())
    }
}
