//! Calendar persistence.
//!
//! [`PropertyStore::apply`] must run the command against the latest calendar
//! and persist the result atomically per property; two concurrent
//! `TryBlock`s for overlapping ranges must not both succeed. The in-memory
//! store holds a write lock for the duration, the Postgres store (in
//! `staysync-postgres`) locks the property row.

use crate::calendar::{CalendarChange, CalendarCommand, PropertyCalendar};
use async_trait::async_trait;
use staysync_core::error::InventoryError;
use staysync_core::types::{DateRange, PropertyId, PropertyRecord};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Storage for property calendars.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Load a calendar.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Storage`] on storage failure.
    async fn load(&self, property_id: PropertyId) -> Result<Option<PropertyCalendar>, InventoryError>;

    /// Insert or update a property record and window, keeping blocked ranges.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Storage`] on storage failure.
    async fn upsert_property(
        &self,
        property: PropertyRecord,
        window: Option<DateRange>,
    ) -> Result<PropertyCalendar, InventoryError>;

    /// Atomically apply a command to one calendar.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::PropertyNotFound`] for unknown properties,
    /// [`InventoryError::Conflict`] from the calendar, or
    /// [`InventoryError::Storage`] on storage failure.
    async fn apply(
        &self,
        property_id: PropertyId,
        command: CalendarCommand,
    ) -> Result<CalendarChange, InventoryError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryPropertyStore {
    calendars: RwLock<HashMap<PropertyId, PropertyCalendar>>,
}

impl InMemoryPropertyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PropertyStore for InMemoryPropertyStore {
    async fn load(&self, property_id: PropertyId) -> Result<Option<PropertyCalendar>, InventoryError> {
        Ok(self.calendars.read().await.get(&property_id).cloned())
    }

    async fn upsert_property(
        &self,
        property: PropertyRecord,
        window: Option<DateRange>,
    ) -> Result<PropertyCalendar, InventoryError> {
        let mut calendars = self.calendars.write().await;
        let calendar = calendars
            .entry(property.property_id)
            .and_modify(|c| {
                c.property = property.clone();
                c.window = window;
            })
            .or_insert_with(|| PropertyCalendar::new(property, window));
        Ok(calendar.clone())
    }

    async fn apply(
        &self,
        property_id: PropertyId,
        command: CalendarCommand,
    ) -> Result<CalendarChange, InventoryError> {
        let mut calendars = self.calendars.write().await;
        let calendar = calendars
            .get_mut(&property_id)
            .ok_or(InventoryError::PropertyNotFound(property_id))?;
        calendar.apply(command)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use staysync_core::types::BookingId;
    use staysync_testing::fixtures::{june_range, property};
    use std::sync::Arc;

    #[tokio::test]
    async fn upsert_keeps_blocked_ranges() {
        let store = InMemoryPropertyStore::new();
        let mut record = property();
        store.upsert_property(record.clone(), None).await.unwrap();
        store
            .apply(
                record.property_id,
                CalendarCommand::Block {
                    range: june_range(1, 5),
                    booking_id: None,
                },
            )
            .await
            .unwrap();

        record.max_guests = 8;
        let updated = store
            .upsert_property(record.clone(), Some(june_range(1, 30)))
            .await
            .unwrap();
        assert_eq!(updated.property.max_guests, 8);
        assert_eq!(updated.blocked().len(), 1);
    }

    #[tokio::test]
    async fn apply_to_unknown_property_fails() {
        let store = InMemoryPropertyStore::new();
        let pid = PropertyId::new();
        let err = store
            .apply(
                pid,
                CalendarCommand::Unblock {
                    range: june_range(1, 2),
                    booking_id: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, InventoryError::PropertyNotFound(pid));
    }

    #[tokio::test]
    async fn concurrent_try_blocks_admit_exactly_one() {
        let store = Arc::new(InMemoryPropertyStore::new());
        let record = property();
        store.upsert_property(record.clone(), None).await.unwrap();

        let attempts = (0..16).map(|i| {
            let store = Arc::clone(&store);
            let pid = record.property_id;
            tokio::spawn(async move {
                let range = if i % 2 == 0 { june_range(1, 5) } else { june_range(3, 8) };
                store
                    .apply(
                        pid,
                        CalendarCommand::TryBlock {
                            range,
                            booking_id: BookingId::new(),
                        },
                    )
                    .await
            })
        });

        let mut successes = 0;
        for handle in attempts.collect::<Vec<_>>() {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
