//! Owner dashboard: booking counts, accepted revenue, recent activity and
//! the requests still waiting for a decision.

use serde::Serialize;
use staysync_core::types::{Booking, BookingStatus, Money};

/// How many bookings the dashboard lists as recent.
pub const RECENT_BOOKINGS: usize = 10;

/// Counters shown at the top of the dashboard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Bookings in any status
    pub total_bookings: usize,
    /// Bookings waiting for a decision
    pub pending_requests: usize,
    /// Accepted bookings
    pub accepted_bookings: usize,
    /// Sum of `total_price` over accepted bookings
    pub total_revenue: Money,
}

/// Everything an owner sees on their dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerDashboard {
    /// Counters
    pub stats: DashboardStats,
    /// Newest bookings first, at most [`RECENT_BOOKINGS`]
    pub recent_bookings: Vec<Booking>,
    /// Pending bookings, newest first
    pub pending_requests: Vec<Booking>,
}

impl OwnerDashboard {
    /// Summarise one owner's bookings.
    #[must_use]
    pub fn from_bookings(mut bookings: Vec<Booking>) -> Self {
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let pending_requests: Vec<Booking> = bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Pending)
            .cloned()
            .collect();
        let accepted = bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Accepted);
        let stats = DashboardStats {
            total_bookings: bookings.len(),
            pending_requests: pending_requests.len(),
            accepted_bookings: accepted.clone().count(),
            total_revenue: Money::from_cents(
                accepted.fold(0_u64, |sum, b| sum.saturating_add(b.total_price.cents())),
            ),
        };
        bookings.truncate(RECENT_BOOKINGS);

        Self {
            stats,
            recent_bookings: bookings,
            pending_requests,
        }
    }
}
