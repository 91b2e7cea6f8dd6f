//! The Booking Authority: sole writer of booking records.

use crate::cache::BookingCache;
use crate::repository::BookingRepository;
use async_trait::async_trait;
use staysync_core::environment::Clock;
use staysync_core::error::BookingError;
use staysync_core::event_bus::EventBus;
use staysync_core::events::{BookingCreated, BookingEvent};
use staysync_core::outcome::Outcome;
use staysync_core::ports::{BookingLedger, InventoryService, StatusChange};
use staysync_core::types::{
    Booking, BookingId, BookingStatus, DateRange, Money, OwnerId, PropertyId, PropertyRecord,
    TravelerId,
};
use staysync_runtime::announce;
use staysync_runtime::metrics::BookingMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Default deadline for the synchronous availability check.
pub const DEFAULT_INVENTORY_TIMEOUT: Duration = Duration::from_secs(2);

/// A traveler's request for a stay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateBooking {
    /// Property to book
    pub property_id: PropertyId,
    /// Requesting traveler
    pub traveler_id: TravelerId,
    /// Requested stay
    pub range: DateRange,
    /// Number of guests
    pub guest_count: u32,
    /// Quoted price; nightly base price times nights when absent
    pub total_price: Option<Money>,
}

/// Owns booking records and the booking state machine.
pub struct BookingAuthority {
    repository: Arc<dyn BookingRepository>,
    inventory: Arc<dyn InventoryService>,
    event_bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    inventory_timeout: Duration,
    cache: Mutex<BookingCache>,
}

impl BookingAuthority {
    /// Create an authority with the default inventory timeout and cache.
    #[must_use]
    pub fn new(
        repository: Arc<dyn BookingRepository>,
        inventory: Arc<dyn InventoryService>,
        event_bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            inventory,
            event_bus,
            clock,
            inventory_timeout: DEFAULT_INVENTORY_TIMEOUT,
            cache: Mutex::new(BookingCache::default()),
        }
    }

    /// Deadline for the availability check made by [`Self::create`].
    #[must_use]
    pub const fn with_inventory_timeout(mut self, timeout: Duration) -> Self {
        self.inventory_timeout = timeout;
        self
    }

    /// Replace the read cache.
    #[must_use]
    pub fn with_cache(mut self, cache: BookingCache) -> Self {
        self.cache = Mutex::new(cache);
        self
    }

    /// Validate, check availability, persist a pending booking and announce it.
    ///
    /// A failed publish does not fail the call; it shows up in the outcome's
    /// [`Delivery`](staysync_core::outcome::Delivery).
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] for zero guests or an overflowing price
    /// - [`BookingError::NotAvailable`] if the range is outside the window or taken
    /// - [`BookingError::GuestLimitExceeded`] above the property's maximum
    /// - [`BookingError::PropertyNotFound`] for unknown properties
    /// - [`BookingError::InventoryUnavailable`] on timeout or transport failure
    /// - [`BookingError::Storage`] if the booking cannot be persisted
    #[instrument(
        skip(self, request),
        fields(
            property_id = %request.property_id,
            traveler_id = %request.traveler_id,
            range = %request.range,
        )
    )]
    pub async fn create(&self, request: CreateBooking) -> Result<Outcome<Booking>, BookingError> {
        match self.create_inner(&request).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                BookingMetrics::record_rejected(error.code());
                warn!(code = error.code(), error = %error, "Booking request rejected");
                Err(error)
            }
        }
    }

    async fn create_inner(&self, request: &CreateBooking) -> Result<Outcome<Booking>, BookingError> {
        if request.guest_count == 0 {
            return Err(BookingError::Validation(
                "guestCount must be at least 1".to_string(),
            ));
        }

        let property = self.check_availability(request).await?;
        if request.guest_count > property.max_guests {
            return Err(BookingError::GuestLimitExceeded {
                requested: request.guest_count,
                max: property.max_guests,
            });
        }

        let total_price = match request.total_price {
            Some(price) => price,
            None => quote(&property, &request.range)?,
        };

        let now = self.clock.now();
        let booking = Booking {
            id: BookingId::new(),
            property_id: request.property_id,
            traveler_id: request.traveler_id,
            owner_id: property.owner_id,
            range: request.range,
            guest_count: request.guest_count,
            total_price,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.repository.insert(&booking).await?;
        BookingMetrics::record_created();
        info!(booking_id = %booking.id, owner_id = %booking.owner_id, "Booking created");

        let delivery = announce(
            self.event_bus.as_ref(),
            &BookingEvent::Created(BookingCreated::from_booking(&booking)),
        )
        .await;
        Ok(Outcome::new(booking, delivery))
    }

    /// Ask the Inventory Authority, failing closed on timeout.
    async fn check_availability(&self, request: &CreateBooking) -> Result<PropertyRecord, BookingError> {
        let started = Instant::now();
        let answer = tokio::time::timeout(
            self.inventory_timeout,
            self.inventory.availability(request.property_id, request.range),
        )
        .await;
        BookingMetrics::record_inventory_call(started.elapsed());

        let answer = answer.map_err(|_| {
            BookingError::InventoryUnavailable(format!(
                "availability check exceeded {}ms",
                self.inventory_timeout.as_millis()
            ))
        })??;

        if !answer.available {
            return Err(BookingError::NotAvailable);
        }
        Ok(answer.property)
    }

    /// Load a booking, through the read cache.
    ///
    /// # Errors
    ///
    /// [`BookingError::BookingNotFound`] for unknown ids.
    pub async fn get_by_id(&self, id: BookingId) -> Result<Booking, BookingError> {
        if let Some(hit) = self.cache.lock().await.get(id) {
            return Ok(hit);
        }
        let booking = self
            .repository
            .get(id)
            .await?
            .ok_or(BookingError::BookingNotFound(id))?;
        self.cache.lock().await.insert(booking.clone());
        Ok(booking)
    }

    /// A traveler's bookings, newest first.
    ///
    /// # Errors
    ///
    /// [`BookingError::Storage`] on storage failure.
    pub async fn list_by_traveler(
        &self,
        traveler_id: TravelerId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, BookingError> {
        self.repository.list_by_traveler(traveler_id, status).await
    }

    /// An owner's bookings, newest first.
    ///
    /// # Errors
    ///
    /// [`BookingError::Storage`] on storage failure.
    pub async fn list_by_owner(
        &self,
        owner_id: OwnerId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, BookingError> {
        self.repository.list_by_owner(owner_id, status).await
    }

    /// Move a booking along the state machine.
    ///
    /// Re-applying the current status is a successful no-op. A concurrent
    /// writer that moves the status first is re-read and judged again.
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`] for unknown ids
    /// - [`BookingError::InvalidTransition`] if `status` is unreachable
    #[instrument(skip_all, fields(booking_id = %id, to = %status))]
    pub async fn apply_status_change(
        &self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<StatusChange, BookingError> {
        loop {
            let current = self
                .repository
                .get(id)
                .await?
                .ok_or(BookingError::BookingNotFound(id))?;

            if current.status == status {
                debug!("Status already applied");
                return Ok(StatusChange {
                    booking: current,
                    previous: status,
                    applied: false,
                });
            }
            if !current.status.can_transition_to(status) {
                return Err(BookingError::InvalidTransition {
                    from: current.status,
                    to: status,
                });
            }

            let previous = current.status;
            if let Some(updated) = self
                .repository
                .update_status_if(id, previous, status, self.clock.now())
                .await?
            {
                self.invalidate(id).await;
                BookingMetrics::record_transition(status.as_str());
                info!(from = %previous, "Booking status changed");
                return Ok(StatusChange {
                    booking: updated,
                    previous,
                    applied: true,
                });
            }
            debug!(from = %previous, "Status moved concurrently, re-reading");
        }
    }

    /// Drop a booking from the read cache.
    pub async fn invalidate(&self, id: BookingId) {
        self.cache.lock().await.invalidate(id);
    }
}

/// Nightly base price times nights.
fn quote(property: &PropertyRecord, range: &DateRange) -> Result<Money, BookingError> {
    u64::try_from(range.nights())
        .ok()
        .and_then(|nights| property.base_price.checked_mul(nights))
        .ok_or_else(|| BookingError::Validation("total price out of range".to_string()))
}

#[async_trait]
impl BookingLedger for BookingAuthority {
    async fn get(&self, id: BookingId) -> Result<Booking, BookingError> {
        self.get_by_id(id).await
    }

    async fn apply_status_change(
        &self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<StatusChange, BookingError> {
        Self::apply_status_change(self, id, status).await
    }

    async fn list_by_owner(
        &self,
        owner_id: OwnerId,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, BookingError> {
        Self::list_by_owner(self, owner_id, status).await
    }

    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>, BookingError> {
        self.repository.list_by_status(status).await
    }
}
