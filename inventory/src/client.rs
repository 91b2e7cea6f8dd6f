//! HTTP client for a remote Inventory Authority.
//!
//! Every request carries the configured timeout. A timeout, a transport
//! failure or an unexpected answer is reported as
//! [`InventoryError::Unavailable`], so callers fail closed.

use crate::api::{CommandResponse, RangeCommand};
use crate::calendar::PropertyCalendar;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use staysync_core::error::InventoryError;
use staysync_core::ports::{AvailabilityAnswer, BlockOutcome, InventoryService, UnblockOutcome};
use staysync_core::types::{BlockedRange, BookingId, DateRange, PropertyId, PropertyRecord};
use staysync_web::ErrorResponse;
use std::time::Duration;
use tracing::warn;

/// [`InventoryService`] over the Inventory Authority's HTTP API.
#[derive(Clone, Debug)]
pub struct HttpInventoryClient {
    client: Client,
    base_url: String,
}

impl HttpInventoryClient {
    /// Create a client for the authority at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Unavailable`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, InventoryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InventoryError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn command<T: DeserializeOwned>(
        &self,
        path: &str,
        body: RangeCommand,
        range: DateRange,
    ) -> Result<T, InventoryError> {
        let response = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let answer: CommandResponse<T> = decode(response, body.property_id, Some(range)).await?;
        Ok(answer.outcome)
    }
}

fn transport_error(error: reqwest::Error) -> InventoryError {
    if error.is_timeout() {
        InventoryError::Unavailable("inventory request timed out".to_string())
    } else {
        InventoryError::Unavailable(format!("inventory request failed: {error}"))
    }
}

/// Decode a success body, or map an error body back onto [`InventoryError`].
async fn decode<T: DeserializeOwned>(
    response: Response,
    property_id: PropertyId,
    range: Option<DateRange>,
) -> Result<T, InventoryError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| InventoryError::Unavailable(format!("unreadable inventory response: {e}")));
    }

    let body = response.json::<ErrorResponse>().await.ok();
    let code = body.as_ref().map(|b| b.code.as_str());
    match (code, range) {
        (Some("PROPERTY_NOT_FOUND"), _) => Err(InventoryError::PropertyNotFound(property_id)),
        (Some("NOW_UNAVAILABLE"), Some(range)) => Err(InventoryError::Conflict { property_id, range }),
        _ => {
            let message = body.map_or_else(|| status.to_string(), |b| b.message);
            warn!(%property_id, status = status.as_u16(), %message, "Inventory request rejected");
            Err(InventoryError::Unavailable(format!(
                "inventory answered {}: {message}",
                status.as_u16()
            )))
        }
    }
}

#[async_trait]
impl InventoryService for HttpInventoryClient {
    async fn property(&self, property_id: PropertyId) -> Result<PropertyRecord, InventoryError> {
        let response = self
            .client
            .get(self.url(&format!("/api/properties/{property_id}")))
            .send()
            .await
            .map_err(transport_error)?;
        decode(response, property_id, None).await
    }

    async fn availability(
        &self,
        property_id: PropertyId,
        range: DateRange,
    ) -> Result<AvailabilityAnswer, InventoryError> {
        let response = self
            .client
            .get(self.url(&format!("/api/properties/{property_id}/available")))
            .query(&[
                ("start", range.start().to_string()),
                ("end", range.end().to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;
        decode(response, property_id, Some(range)).await
    }

    async fn block_range(
        &self,
        property_id: PropertyId,
        range: DateRange,
        booking_id: Option<BookingId>,
    ) -> Result<BlockOutcome, InventoryError> {
        self.command("/api/block", RangeCommand::new(property_id, range, booking_id), range)
            .await
    }

    async fn try_block_range(
        &self,
        property_id: PropertyId,
        range: DateRange,
        booking_id: BookingId,
    ) -> Result<BlockOutcome, InventoryError> {
        self.command(
            "/api/try-block",
            RangeCommand::new(property_id, range, Some(booking_id)),
            range,
        )
        .await
    }

    async fn unblock_range(
        &self,
        property_id: PropertyId,
        range: DateRange,
        booking_id: Option<BookingId>,
    ) -> Result<UnblockOutcome, InventoryError> {
        self.command("/api/unblock", RangeCommand::new(property_id, range, booking_id), range)
            .await
    }

    async fn blocked_ranges(
        &self,
        property_id: PropertyId,
    ) -> Result<Vec<BlockedRange>, InventoryError> {
        let response = self
            .client
            .get(self.url(&format!("/api/properties/{property_id}/availability")))
            .send()
            .await
            .map_err(transport_error)?;
        let calendar: PropertyCalendar = decode(response, property_id, None).await?;
        Ok(calendar.blocked().to_vec())
    }
}
