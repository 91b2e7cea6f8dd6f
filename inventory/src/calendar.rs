//! Property availability calendar.
//!
//! A [`PropertyCalendar`] owns the blocked ranges of one property. The list
//! is only ever changed through [`PropertyCalendar::apply`], which enforces
//! that no two blocked ranges overlap (half-open, see
//! [`DateRange::overlaps`]).
//!
//! | command   | exact range present             | other overlap | otherwise  |
//! |-----------|---------------------------------|---------------|------------|
//! | `Block`   | `AlreadyBlocked`                | `Conflict`    | `Blocked`  |
//! | `TryBlock`| `AlreadyBlocked` if same booking, else `Conflict` | `Conflict` | `Blocked` if inside the window |
//! | `Unblock` | `Released` if the tag matches   | `NotBlocked`  | `NotBlocked` |

use serde::{Deserialize, Serialize};
use staysync_core::error::InventoryError;
use staysync_core::ports::{BlockOutcome, UnblockOutcome};
use staysync_core::types::{BlockedRange, BookingId, DateRange, PropertyRecord};

/// A mutation of a property calendar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalendarCommand {
    /// Record a confirmed stay. Idempotent per exact range.
    Block {
        /// Days to block
        range: DateRange,
        /// Booking that caused the block
        booking_id: Option<BookingId>,
    },
    /// Re-check availability and block only if still free.
    TryBlock {
        /// Days to block
        range: DateRange,
        /// Booking being accepted
        booking_id: BookingId,
    },
    /// Release a previously blocked stay.
    Unblock {
        /// Days to release
        range: DateRange,
        /// Only release an entry held by this booking (or untagged)
        booking_id: Option<BookingId>,
    },
}

impl CalendarCommand {
    /// Short name for logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Block { .. } => "block",
            Self::TryBlock { .. } => "try_block",
            Self::Unblock { .. } => "unblock",
        }
    }
}

/// What a successful command did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalendarChange {
    /// Result of `Block` / `TryBlock`
    Block(BlockOutcome),
    /// Result of `Unblock`
    Unblock(UnblockOutcome),
}

impl CalendarChange {
    /// Whether the calendar was modified.
    #[must_use]
    pub const fn modified(&self) -> bool {
        matches!(
            self,
            Self::Block(BlockOutcome::Blocked) | Self::Unblock(UnblockOutcome::Released)
        )
    }

    /// Short name for logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Block(BlockOutcome::Blocked) => "blocked",
            Self::Block(BlockOutcome::AlreadyBlocked) => "already_blocked",
            Self::Unblock(UnblockOutcome::Released) => "released",
            Self::Unblock(UnblockOutcome::NotBlocked) => "not_blocked",
        }
    }
}

/// Availability state of one property.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyCalendar {
    /// Property facts
    pub property: PropertyRecord,
    /// Bookable window, if restricted
    pub window: Option<DateRange>,
    /// Blocked ranges, sorted by start date
    blocked: Vec<BlockedRange>,
}

impl PropertyCalendar {
    /// An empty calendar.
    #[must_use]
    pub const fn new(property: PropertyRecord, window: Option<DateRange>) -> Self {
        Self {
            property,
            window,
            blocked: Vec::new(),
        }
    }

    /// Rebuild a calendar from stored ranges.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Storage`] if the stored ranges overlap.
    pub fn restore(
        property: PropertyRecord,
        window: Option<DateRange>,
        mut blocked: Vec<BlockedRange>,
    ) -> Result<Self, InventoryError> {
        blocked.sort_by_key(|b| b.range);
        if blocked
            .windows(2)
            .any(|pair| pair[0].range.overlaps(&pair[1].range))
        {
            return Err(InventoryError::Storage(format!(
                "stored calendar for property {} has overlapping ranges",
                property.property_id
            )));
        }
        Ok(Self {
            property,
            window,
            blocked,
        })
    }

    /// Blocked ranges, sorted by start date.
    #[must_use]
    pub fn blocked(&self) -> &[BlockedRange] {
        &self.blocked
    }

    /// True if the range lies inside the window (or there is no window).
    #[must_use]
    pub fn in_window(&self, range: &DateRange) -> bool {
        self.window.as_ref().is_none_or(|w| range.within(w))
    }

    /// Blocked ranges overlapping `range`.
    pub fn conflicts<'a>(&'a self, range: &'a DateRange) -> impl Iterator<Item = &'a BlockedRange> {
        self.blocked.iter().filter(move |b| b.range.overlaps(range))
    }

    /// Inside the window and overlapping no blocked range.
    #[must_use]
    pub fn is_available(&self, range: &DateRange) -> bool {
        self.in_window(range) && self.conflicts(range).next().is_none()
    }

    /// Apply a command.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Conflict`] when a block would overlap
    /// another blocked range.
    pub fn apply(&mut self, command: CalendarCommand) -> Result<CalendarChange, InventoryError> {
        match command {
            CalendarCommand::Block { range, booking_id } => {
                if self.exact(&range).is_some() {
                    return Ok(CalendarChange::Block(BlockOutcome::AlreadyBlocked));
                }
                self.ensure_free(&range)?;
                self.insert(BlockedRange::new(range, booking_id));
                Ok(CalendarChange::Block(BlockOutcome::Blocked))
            }
            CalendarCommand::TryBlock { range, booking_id } => {
                if let Some(existing) = self.exact(&range) {
                    if existing.booking_id == Some(booking_id) {
                        return Ok(CalendarChange::Block(BlockOutcome::AlreadyBlocked));
                    }
                    return Err(self.conflict(range));
                }
                if !self.in_window(&range) {
                    return Err(self.conflict(range));
                }
                self.ensure_free(&range)?;
                self.insert(BlockedRange::new(range, Some(booking_id)));
                Ok(CalendarChange::Block(BlockOutcome::Blocked))
            }
            CalendarCommand::Unblock { range, booking_id } => {
                let position = self.blocked.iter().position(|b| {
                    b.range == range
                        && match booking_id {
                            None => true,
                            Some(id) => b.booking_id.is_none_or(|held| held == id),
                        }
                });
                Ok(CalendarChange::Unblock(match position {
                    Some(index) => {
                        self.blocked.remove(index);
                        UnblockOutcome::Released
                    }
                    None => UnblockOutcome::NotBlocked,
                }))
            }
        }
    }

    fn exact(&self, range: &DateRange) -> Option<&BlockedRange> {
        self.blocked.iter().find(|b| b.range == *range)
    }

    fn ensure_free(&self, range: &DateRange) -> Result<(), InventoryError> {
        if self.conflicts(range).next().is_some() {
            return Err(self.conflict(*range));
        }
        Ok(())
    }

    const fn conflict(&self, range: DateRange) -> InventoryError {
        InventoryError::Conflict {
            property_id: self.property.property_id,
            range,
        }
    }

    fn insert(&mut self, entry: BlockedRange) {
        let index = self.blocked.partition_point(|b| b.range < entry.range);
        self.blocked.insert(index, entry);
    }
}
