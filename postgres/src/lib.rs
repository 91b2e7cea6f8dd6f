//! `PostgreSQL` storage for StaySync.
//!
//! - [`PostgresBookingRepository`]: booking records, with compare-and-set
//!   status writes
//! - [`PostgresPropertyStore`]: property calendars; every mutation locks the
//!   property row, so concurrent accepts of overlapping stays serialize
//! - [`PostgresDeadLetterSink`]: durable dead letters
//!
//! Queries are checked at runtime (`sqlx::query`), so building this crate
//! does not need a live database.
//!
//! # Example
//!
//! ```no_run
//! use staysync_postgres::{PostgresBookingRepository, connect, migrate};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = connect("postgres://localhost/staysync", 10).await?;
//! migrate(&pool).await?;
//! let bookings = PostgresBookingRepository::new(pool);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bookings;
mod calendars;
mod dead_letters;

pub use bookings::PostgresBookingRepository;
pub use calendars::PostgresPropertyStore;
pub use dead_letters::PostgresDeadLetterSink;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Open a connection pool.
///
/// # Errors
///
/// Returns the driver error if the database cannot be reached.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await?;
    tracing::info!(max_connections, "Connected to PostgreSQL");
    Ok(pool)
}

/// Apply the bundled migrations.
///
/// # Errors
///
/// Returns the migration error if any script fails.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
