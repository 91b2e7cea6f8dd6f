//! Property calendars in `PostgreSQL`.
//!
//! A calendar is one `properties` row plus its `blocked_ranges` rows.
//! [`PropertyStore::apply`] runs inside a transaction that holds
//! `SELECT ... FOR UPDATE` on the property row, so the read of the current
//! ranges, the overlap check and the write are one atomic step per property.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use staysync_core::error::InventoryError;
use staysync_core::types::{
    BlockedRange, BookingId, DateRange, Money, OwnerId, PropertyId, PropertyRecord,
};
use staysync_inventory::{CalendarChange, CalendarCommand, PropertyCalendar, PropertyStore};
use uuid::Uuid;

/// [`PropertyStore`] backed by `properties` and `blocked_ranges`.
#[derive(Clone, Debug)]
pub struct PostgresPropertyStore {
    pool: PgPool,
}

impl PostgresPropertyStore {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage(error: sqlx::Error) -> InventoryError {
    InventoryError::Storage(error.to_string())
}

fn corrupt(what: impl std::fmt::Display) -> InventoryError {
    InventoryError::Storage(format!("corrupt calendar row: {what}"))
}

fn record_from_row(row: &PgRow) -> Result<(PropertyRecord, Option<DateRange>), InventoryError> {
    let max_guests: i32 = row.try_get("max_guests").map_err(storage)?;
    let base_price: i64 = row.try_get("base_price").map_err(storage)?;
    let window_start: Option<NaiveDate> = row.try_get("window_start").map_err(storage)?;
    let window_end: Option<NaiveDate> = row.try_get("window_end").map_err(storage)?;

    let record = PropertyRecord {
        property_id: PropertyId::from_uuid(row.try_get("property_id").map_err(storage)?),
        owner_id: OwnerId::from_uuid(row.try_get("owner_id").map_err(storage)?),
        max_guests: u32::try_from(max_guests).map_err(corrupt)?,
        base_price: Money::from_cents(u64::try_from(base_price).map_err(corrupt)?),
    };
    let window = match (window_start, window_end) {
        (Some(start), Some(end)) => Some(DateRange::new(start, end).map_err(corrupt)?),
        _ => None,
    };
    Ok((record, window))
}

fn blocked_from_row(row: &PgRow) -> Result<BlockedRange, InventoryError> {
    let range = DateRange::new(
        row.try_get("start_date").map_err(storage)?,
        row.try_get("end_date").map_err(storage)?,
    )
    .map_err(corrupt)?;
    let booking_id: Option<Uuid> = row.try_get("booking_id").map_err(storage)?;
    Ok(BlockedRange::new(range, booking_id.map(BookingId::from_uuid)))
}

/// Read one calendar inside `tx`. With `lock`, the property row stays
/// locked until the transaction ends.
async fn read_calendar(
    tx: &mut Transaction<'_, Postgres>,
    property_id: PropertyId,
    lock: bool,
) -> Result<Option<PropertyCalendar>, InventoryError> {
    let sql = if lock {
        "SELECT property_id, owner_id, max_guests, base_price, window_start, window_end \
         FROM properties WHERE property_id = $1 FOR UPDATE"
    } else {
        "SELECT property_id, owner_id, max_guests, base_price, window_start, window_end \
         FROM properties WHERE property_id = $1"
    };
    let Some(row) = sqlx::query(sql)
        .bind(property_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(storage)?
    else {
        return Ok(None);
    };
    let (record, window) = record_from_row(&row)?;

    let blocked = sqlx::query(
        "SELECT start_date, end_date, booking_id FROM blocked_ranges \
         WHERE property_id = $1 ORDER BY start_date",
    )
    .bind(property_id.as_uuid())
    .fetch_all(&mut **tx)
    .await
    .map_err(storage)?
    .iter()
    .map(blocked_from_row)
    .collect::<Result<Vec<_>, _>>()?;

    PropertyCalendar::restore(record, window, blocked).map(Some)
}

/// Write the difference between two versions of one calendar.
async fn write_diff(
    tx: &mut Transaction<'_, Postgres>,
    property_id: PropertyId,
    before: &[BlockedRange],
    after: &[BlockedRange],
) -> Result<(), InventoryError> {
    for removed in before.iter().filter(|b| !after.contains(b)) {
        sqlx::query(
            "DELETE FROM blocked_ranges \
             WHERE property_id = $1 AND start_date = $2 AND end_date = $3",
        )
        .bind(property_id.as_uuid())
        .bind(removed.range.start())
        .bind(removed.range.end())
        .execute(&mut **tx)
        .await
        .map_err(storage)?;
    }
    for added in after.iter().filter(|b| !before.contains(b)) {
        sqlx::query(
            "INSERT INTO blocked_ranges (property_id, start_date, end_date, booking_id) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(property_id.as_uuid())
        .bind(added.range.start())
        .bind(added.range.end())
        .bind(added.booking_id.map(|id| *id.as_uuid()))
        .execute(&mut **tx)
        .await
        .map_err(storage)?;
    }
    Ok(())
}

#[async_trait]
impl PropertyStore for PostgresPropertyStore {
    async fn load(&self, property_id: PropertyId) -> Result<Option<PropertyCalendar>, InventoryError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let calendar = read_calendar(&mut tx, property_id, false).await?;
        tx.commit().await.map_err(storage)?;
        Ok(calendar)
    }

    async fn upsert_property(
        &self,
        property: PropertyRecord,
        window: Option<DateRange>,
    ) -> Result<PropertyCalendar, InventoryError> {
        let out_of_range = |e: std::num::TryFromIntError| {
            InventoryError::Storage(format!("property value out of range: {e}"))
        };
        let max_guests = i32::try_from(property.max_guests).map_err(out_of_range)?;
        let base_price = i64::try_from(property.base_price.cents()).map_err(out_of_range)?;

        let mut tx = self.pool.begin().await.map_err(storage)?;
        sqlx::query(
            r"
            INSERT INTO properties (property_id, owner_id, max_guests, base_price, window_start, window_end)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (property_id) DO UPDATE SET
                owner_id = EXCLUDED.owner_id,
                max_guests = EXCLUDED.max_guests,
                base_price = EXCLUDED.base_price,
                window_start = EXCLUDED.window_start,
                window_end = EXCLUDED.window_end
            ",
        )
        .bind(property.property_id.as_uuid())
        .bind(property.owner_id.as_uuid())
        .bind(max_guests)
        .bind(base_price)
        .bind(window.map(|w| w.start()))
        .bind(window.map(|w| w.end()))
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        let calendar = read_calendar(&mut tx, property.property_id, false)
            .await?
            .ok_or(InventoryError::PropertyNotFound(property.property_id))?;
        tx.commit().await.map_err(storage)?;

        tracing::debug!(property_id = %property.property_id, "Property upserted");
        Ok(calendar)
    }

    async fn apply(
        &self,
        property_id: PropertyId,
        command: CalendarCommand,
    ) -> Result<CalendarChange, InventoryError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let mut calendar = read_calendar(&mut tx, property_id, true)
            .await?
            .ok_or(InventoryError::PropertyNotFound(property_id))?;

        let before = calendar.blocked().to_vec();
        // Dropping `tx` on the error path rolls back and releases the lock.
        let change = calendar.apply(command)?;
        if change.modified() {
            write_diff(&mut tx, property_id, &before, calendar.blocked()).await?;
        }
        tx.commit().await.map_err(storage)?;

        tracing::debug!(
            property_id = %property_id,
            command = command.name(),
            outcome = change.name(),
            "Calendar command committed"
        );
        Ok(change)
    }
}
