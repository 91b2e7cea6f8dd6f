//! Booking persistence.
//!
//! Status writes are compare-and-set on the previous status
//! ([`BookingRepository::update_status_if`]), so two concurrent transitions
//! of the same booking cannot both win.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use staysync_core::error::BookingError;
use staysync_core::types::{Booking, BookingId, BookingStatus, OwnerId, TravelerId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Storage for booking records.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Persist a new booking.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] on storage failure or duplicate id.
    async fn insert(&self, booking: &Booking) -> Result<(), BookingError>;

    /// Load a booking.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] on storage failure.
    async fn get(&self, id: BookingId) -> Result<Option<Booking>, BookingError>;

    /// Set `next` only if the stored status is still `expected`.
    ///
    /// Returns the updated booking, or `None` when the booking is missing or
    /// its status moved on.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] on storage failure.
    async fn update_status_if(
        &self,
        id: BookingId,
        expected: BookingStatus,
        next: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Booking>, BookingError>;

    /// A traveler's bookings, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] on storage failure.
    async fn list_by_traveler(
        &self,
        traveler_id: TravelerId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, BookingError>;

    /// An owner's bookings, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] on storage failure.
    async fn list_by_owner(
        &self,
        owner_id: OwnerId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, BookingError>;

    /// Every booking currently in `status`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] on storage failure.
    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>, BookingError>;
}

/// Process-local repository.
#[derive(Debug, Default)]
pub struct InMemoryBookingRepository {
    bookings: RwLock<HashMap<BookingId, Booking>>,
}

impl InMemoryBookingRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn select(&self, keep: impl Fn(&Booking) -> bool) -> Vec<Booking> {
        let mut found: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| keep(b))
            .cloned()
            .collect();
        newest_first(&mut found);
        found
    }
}

/// Order by `created_at` descending, id as tie-breaker.
pub fn newest_first(bookings: &mut [Booking]) {
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn insert(&self, booking: &Booking) -> Result<(), BookingError> {
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) {
            return Err(BookingError::Storage(format!(
                "booking {} already exists",
                booking.id
            )));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>, BookingError> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn update_status_if(
        &self,
        id: BookingId,
        expected: BookingStatus,
        next: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Booking>, BookingError> {
        let mut bookings = self.bookings.write().await;
        Ok(bookings
            .get_mut(&id)
            .filter(|b| b.status == expected)
            .map(|b| {
                b.status = next;
                b.updated_at = at;
                b.clone()
            }))
    }

    async fn list_by_traveler(
        &self,
        traveler_id: TravelerId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, BookingError> {
        Ok(self
            .select(|b| b.traveler_id == traveler_id && status.is_none_or(|s| b.status == s))
            .await)
    }

    async fn list_by_owner(
        &self,
        owner_id: OwnerId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, BookingError> {
        Ok(self
            .select(|b| b.owner_id == owner_id && status.is_none_or(|s| b.status == s))
            .await)
    }

    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>, BookingError> {
        Ok(self.select(|b| b.status == status).await)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use chrono::Duration;
    use staysync_core::types::{Money, PropertyId};
    use staysync_testing::fixtures::june_range;
    use staysync_testing::test_clock;
    use staysync_core::environment::Clock;

    fn booking(traveler_id: TravelerId, minutes: i64) -> Booking {
        let at = test_clock().now() + Duration::minutes(minutes);
        Booking {
            id: BookingId::new(),
            property_id: PropertyId::new(),
            traveler_id,
            owner_id: OwnerId::new(),
            range: june_range(1, 5),
            guest_count: 2,
            total_price: Money::from_cents(40_000),
            status: BookingStatus::Pending,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn conditional_update_only_wins_once() {
        let repo = InMemoryBookingRepository::new();
        let b = booking(TravelerId::new(), 0);
        repo.insert(&b).await.unwrap();
        let now = test_clock().now();

        let first = repo
            .update_status_if(b.id, BookingStatus::Pending, BookingStatus::Accepted, now)
            .await
            .unwrap();
        let second = repo
            .update_status_if(b.id, BookingStatus::Pending, BookingStatus::Cancelled, now)
            .await
            .unwrap();

        assert_eq!(first.unwrap().status, BookingStatus::Accepted);
        assert!(second.is_none());
        assert_eq!(
            repo.get(b.id).await.unwrap().unwrap().status,
            BookingStatus::Accepted
        );
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let repo = InMemoryBookingRepository::new();
        let b = booking(TravelerId::new(), 0);
        repo.insert(&b).await.unwrap();
        assert!(matches!(
            repo.insert(&b).await.unwrap_err(),
            BookingError::Storage(_)
        ));
    }

    #[tokio::test]
    async fn traveler_listing_is_newest_first_and_filtered() {
        let repo = InMemoryBookingRepository::new();
        let traveler = TravelerId::new();
        let older = booking(traveler, 0);
        let newer = booking(traveler, 10);
        repo.insert(&older).await.unwrap();
        repo.insert(&newer).await.unwrap();
        repo.insert(&booking(TravelerId::new(), 5)).await.unwrap();
        repo.update_status_if(
            older.id,
            BookingStatus::Pending,
            BookingStatus::Cancelled,
            test_clock().now(),
        )
        .await
        .unwrap();

        let all = repo.list_by_traveler(traveler, None).await.unwrap();
        assert_eq!(
            all.iter().map(|b| b.id).collect::<Vec<_>>(),
            vec![newer.id, older.id]
        );

        let pending = repo
            .list_by_traveler(traveler, Some(BookingStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, newer.id);

        assert_eq!(
            repo.list_by_status(BookingStatus::Pending).await.unwrap().len(),
            2
        );
    }
}
