//! Read-through cache for single-booking reads.
//!
//! Bounded, least-recently-used eviction with a time-to-live. Entries are
//! dropped on every local status change and whenever a status event for the
//! booking is consumed, so other instances converge after a remote change.
//! Expired entries are dropped lazily: on a read, or first in line when the
//! cache is full.

use staysync_core::types::{Booking, BookingId};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct CachedBooking {
    booking: Booking,
    cached_at: Instant,
    last_accessed: Instant,
}

impl CachedBooking {
    fn new(booking: Booking) -> Self {
        let now = Instant::now();
        Self {
            booking,
            cached_at: now,
            last_accessed: now,
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// LRU cache of bookings with TTL.
#[derive(Clone, Debug)]
pub struct BookingCache {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<BookingId, CachedBooking>,
}

impl BookingCache {
    /// Create a cache holding at most `capacity` bookings for `ttl` each.
    ///
    /// A zero capacity disables caching.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Cached booking, if present and fresh.
    pub fn get(&mut self, id: BookingId) -> Option<Booking> {
        let entry = self.entries.get_mut(&id)?;
        if entry.is_expired(self.ttl) {
            self.entries.remove(&id);
            return None;
        }
        entry.last_accessed = Instant::now();
        Some(entry.booking.clone())
    }

    /// Cache a booking.
    pub fn insert(&mut self, booking: Booking) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&booking.id) {
            self.evict_lru();
        }
        self.entries.insert(booking.id, CachedBooking::new(booking));
    }

    /// Drop a booking.
    pub fn invalidate(&mut self, id: BookingId) {
        self.entries.remove(&id);
    }

    /// Number of cached bookings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove one entry, an expired one if any, else the least recently used.
    fn evict_lru(&mut self) {
        let ttl = self.ttl;
        if let Some(lru) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| (!entry.is_expired(ttl), entry.last_accessed))
            .map(|(id, _)| *id)
        {
            self.entries.remove(&lru);
        }
    }
}

impl Default for BookingCache {
    fn default() -> Self {
        Self::new(1_024, Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use chrono::Utc;
    use staysync_core::types::{BookingStatus, Money, OwnerId, PropertyId, TravelerId};
    use staysync_testing::fixtures::june_range;

    fn booking() -> Booking {
        Booking {
            id: BookingId::new(),
            property_id: PropertyId::new(),
            traveler_id: TravelerId::new(),
            owner_id: OwnerId::new(),
            range: june_range(1, 5),
            guest_count: 1,
            total_price: Money::from_cents(1),
            status: BookingStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = BookingCache::new(2, Duration::from_secs(60));
        let (a, b, c) = (booking(), booking(), booking());
        cache.insert(a.clone());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(b.clone());
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get(a.id).is_some());

        cache.insert(c.clone());

        assert!(cache.get(a.id).is_some());
        assert!(cache.get(b.id).is_none());
        assert!(cache.get(c.id).is_some());
    }

    #[test]
    fn expired_entries_are_misses() {
        let mut cache = BookingCache::new(4, Duration::from_millis(20));
        let a = booking();
        cache.insert(a.clone());
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get(a.id).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn full_cache_evicts_an_expired_entry_before_a_fresh_one() {
        let mut cache = BookingCache::new(2, Duration::from_millis(300));
        let (a, b, c) = (booking(), booking(), booking());
        cache.insert(a.clone());
        std::thread::sleep(Duration::from_millis(150));
        cache.insert(b.clone());
        std::thread::sleep(Duration::from_millis(50));
        // a is now the most recently used, b the least.
        assert!(cache.get(a.id).is_some());
        std::thread::sleep(Duration::from_millis(150));

        // a has expired but stays until something needs its slot.
        assert_eq!(cache.len(), 2);
        cache.insert(c.clone());

        assert_eq!(cache.len(), 2);
        assert!(cache.get(a.id).is_none());
        assert!(cache.get(b.id).is_some());
        assert!(cache.get(c.id).is_some());
    }

    #[test]
    fn invalidate_and_zero_capacity() {
        let mut cache = BookingCache::default();
        let a = booking();
        cache.insert(a.clone());
        cache.invalidate(a.id);
        assert!(cache.get(a.id).is_none());

        let mut disabled = BookingCache::new(0, Duration::from_secs(60));
        disabled.insert(a.clone());
        assert_eq!(disabled.len(), 0);
    }
}
