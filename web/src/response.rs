//! Response bodies shared by the services.

use serde::{Deserialize, Serialize};
use staysync_core::outcome::Outcome;

/// A committed value plus `eventDelivered`, telling the caller whether the
/// event announcing the change reached the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeResponse<T> {
    /// The persisted value
    #[serde(flatten)]
    pub value: T,
    /// Whether the announcing event was published
    pub event_delivered: bool,
}

impl<T> From<Outcome<T>> for OutcomeResponse<T> {
    fn from(outcome: Outcome<T>) -> Self {
        Self {
            event_delivered: outcome.is_delivered(),
            value: outcome.value,
        }
    }
}
