//! Durable dead letters.
//!
//! Consumers write here once an event is out of retries or failed
//! permanently. Rows are kept for inspection and manual replay; nothing in
//! the service reads them back automatically.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use staysync_runtime::dead_letter::{DeadLetter, DeadLetterError, DeadLetterSink};

/// [`DeadLetterSink`] backed by the `dead_letters` table.
#[derive(Clone, Debug)]
pub struct PostgresDeadLetterSink {
    pool: PgPool,
}

impl PostgresDeadLetterSink {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Most recent dead letters of one consumer, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DeadLetterError::Storage`] if the query fails.
    pub async fn recent(&self, consumer: &str, limit: i64) -> Result<Vec<DeadLetter>, DeadLetterError> {
        let rows = sqlx::query(
            r"
            SELECT consumer, event_type, event_key, payload, error, attempts, permanent, failed_at
            FROM dead_letters
            WHERE consumer = $1
            ORDER BY failed_at DESC, id DESC
            LIMIT $2
            ",
        )
        .bind(consumer)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DeadLetterError::Storage(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let attempts: i32 = row.try_get("attempts")?;
                Ok(DeadLetter {
                    consumer: row.try_get("consumer")?,
                    event_type: row.try_get("event_type")?,
                    key: row.try_get("event_key")?,
                    payload: row.try_get("payload")?,
                    error: row.try_get("error")?,
                    attempts: u32::try_from(attempts).unwrap_or_default(),
                    permanent: row.try_get("permanent")?,
                    failed_at: row.try_get("failed_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| DeadLetterError::Storage(e.to_string()))
    }
}

#[async_trait]
impl DeadLetterSink for PostgresDeadLetterSink {
    async fn record(&self, letter: DeadLetter) -> Result<(), DeadLetterError> {
        let attempts = i32::try_from(letter.attempts).unwrap_or(i32::MAX);
        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO dead_letters (
                consumer, event_type, event_key, payload, error, attempts, permanent, failed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(&letter.consumer)
        .bind(&letter.event_type)
        .bind(&letter.key)
        .bind(&letter.payload)
        .bind(&letter.error)
        .bind(attempts)
        .bind(letter.permanent)
        .bind(letter.failed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DeadLetterError::Storage(e.to_string()))?;

        tracing::warn!(
            dead_letter_id = id,
            consumer = %letter.consumer,
            event_type = %letter.event_type,
            key = ?letter.key,
            attempts = letter.attempts,
            permanent = letter.permanent,
            error = %letter.error,
            "Event added to dead letters"
        );
        metrics::counter!("staysync_dead_letters_stored_total", "consumer" => letter.consumer)
            .increment(1);
        Ok(())
    }
}
