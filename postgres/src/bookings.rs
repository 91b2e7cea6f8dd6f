//! Booking records in `PostgreSQL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use staysync_booking::BookingRepository;
use staysync_core::error::BookingError;
use staysync_core::types::{
    Booking, BookingId, BookingStatus, DateRange, Money, OwnerId, ParseStatusError, PropertyId,
    TravelerId,
};
use uuid::Uuid;

const COLUMNS: &str = "id, property_id, traveler_id, owner_id, start_date, end_date, \
                       guest_count, total_price, status, created_at, updated_at";

/// [`BookingRepository`] backed by the `bookings` table.
#[derive(Clone, Debug)]
pub struct PostgresBookingRepository {
    pool: PgPool,
}

impl PostgresBookingRepository {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn list_where(
        &self,
        column: &'static str,
        id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, BookingError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM bookings \
             WHERE {column} = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC, id"
        );
        let rows = sqlx::query(&sql)
            .bind(id)
            .bind(status.map(BookingStatus::as_str))
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.iter().map(booking_from_row).collect()
    }
}

fn storage(error: sqlx::Error) -> BookingError {
    BookingError::Storage(error.to_string())
}

fn booking_from_row(row: &PgRow) -> Result<Booking, BookingError> {
    let status: String = row.try_get("status").map_err(storage)?;
    let guest_count: i32 = row.try_get("guest_count").map_err(storage)?;
    let total_price: i64 = row.try_get("total_price").map_err(storage)?;

    Ok(Booking {
        id: BookingId::from_uuid(row.try_get("id").map_err(storage)?),
        property_id: PropertyId::from_uuid(row.try_get("property_id").map_err(storage)?),
        traveler_id: TravelerId::from_uuid(row.try_get("traveler_id").map_err(storage)?),
        owner_id: OwnerId::from_uuid(row.try_get("owner_id").map_err(storage)?),
        range: DateRange::new(
            row.try_get("start_date").map_err(storage)?,
            row.try_get("end_date").map_err(storage)?,
        )
        .map_err(|e| BookingError::Storage(format!("stored booking has {e}")))?,
        guest_count: u32::try_from(guest_count)
            .map_err(|_| BookingError::Storage(format!("negative guest count {guest_count}")))?,
        total_price: Money::from_cents(
            u64::try_from(total_price)
                .map_err(|_| BookingError::Storage(format!("negative price {total_price}")))?,
        ),
        status: status
            .parse()
            .map_err(|e: ParseStatusError| BookingError::Storage(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(storage)?,
        updated_at: row.try_get("updated_at").map_err(storage)?,
    })
}

#[async_trait]
impl BookingRepository for PostgresBookingRepository {
    async fn insert(&self, booking: &Booking) -> Result<(), BookingError> {
        let guest_count = i32::try_from(booking.guest_count)
            .map_err(|_| BookingError::Validation("guest count too large".to_string()))?;
        let total_price = i64::try_from(booking.total_price.cents())
            .map_err(|_| BookingError::Validation("price too large".to_string()))?;

        sqlx::query(
            r"
            INSERT INTO bookings (
                id, property_id, traveler_id, owner_id, start_date, end_date,
                guest_count, total_price, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(booking.id.as_uuid())
        .bind(booking.property_id.as_uuid())
        .bind(booking.traveler_id.as_uuid())
        .bind(booking.owner_id.as_uuid())
        .bind(booking.range.start())
        .bind(booking.range.end())
        .bind(guest_count)
        .bind(total_price)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        tracing::debug!(booking_id = %booking.id, "Booking row inserted");
        Ok(())
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>, BookingError> {
        let sql = format!("SELECT {COLUMNS} FROM bookings WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn update_status_if(
        &self,
        id: BookingId,
        expected: BookingStatus,
        next: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Booking>, BookingError> {
        let sql = format!(
            "UPDATE bookings SET status = $3, updated_at = $4 \
             WHERE id = $1 AND status = $2 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(expected.as_str())
            .bind(next.as_str())
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn list_by_traveler(
        &self,
        traveler_id: TravelerId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, BookingError> {
        self.list_where("traveler_id", *traveler_id.as_uuid(), status)
            .await
    }

    async fn list_by_owner(
        &self,
        owner_id: OwnerId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, BookingError> {
        self.list_where("owner_id", *owner_id.as_uuid(), status).await
    }

    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>, BookingError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM bookings WHERE status = $1 ORDER BY created_at DESC, id"
        );
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.iter().map(booking_from_row).collect()
    }
}
