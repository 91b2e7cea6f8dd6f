//! HTTP surface of the Inventory Authority.
//!
//! - `GET  /api/properties/:id/available?start=&end=` - availability check
//! - `GET  /api/properties/:id` - property lookup
//! - `PUT  /api/properties/:id` - register a property record and window
//! - `GET  /api/properties/:id/availability` - calendar snapshot
//! - `POST /api/block`, `/api/unblock`, `/api/try-block` - calendar commands

use crate::authority::InventoryAuthority;
use crate::calendar::PropertyCalendar;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use staysync_core::error::BookingError;
use staysync_core::ports::{AvailabilityAnswer, BlockOutcome, InventoryService, UnblockOutcome};
use staysync_core::types::{
    BookingId, DateRange, Money, OwnerId, PropertyId, PropertyRecord,
};
use staysync_web::{AppError, WebResult};
use std::sync::Arc;
use uuid::Uuid;

/// `?start=&end=` of the availability check.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct AvailabilityQuery {
    /// First night
    pub start: NaiveDate,
    /// Check-out day
    pub end: NaiveDate,
}

/// Body of the block, unblock and try-block commands.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeCommand {
    /// Target property
    pub property_id: PropertyId,
    /// First night
    pub start_date: NaiveDate,
    /// Check-out day
    pub end_date: NaiveDate,
    /// Booking holding the range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
}

impl RangeCommand {
    /// Build a command body.
    #[must_use]
    pub const fn new(
        property_id: PropertyId,
        range: DateRange,
        booking_id: Option<BookingId>,
    ) -> Self {
        Self {
            property_id,
            start_date: range.start(),
            end_date: range.end(),
            booking_id,
        }
    }

    fn range(&self) -> Result<DateRange, BookingError> {
        DateRange::new(self.start_date, self.end_date)
    }
}

/// `{ ok: true, outcome }` answer to a calendar command.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CommandResponse<T> {
    /// Always true; failures use the error body
    pub ok: bool,
    /// What the command did
    pub outcome: T,
}

impl<T> CommandResponse<T> {
    const fn ok(outcome: T) -> Json<Self> {
        Json(Self { ok: true, outcome })
    }
}

/// Body of `PUT /api/properties/:id`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterProperty {
    /// Owner allowed to accept or cancel stays
    pub owner_id: OwnerId,
    /// Maximum number of guests
    pub max_guests: u32,
    /// Price per night in cents
    pub base_price: Money,
    /// Bookable window; unrestricted when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<DateRange>,
}

/// Routes of the Inventory Authority.
pub fn router(inventory: Arc<InventoryAuthority>) -> Router {
    Router::new()
        .route("/api/properties/:id", get(get_property).put(register_property))
        .route("/api/properties/:id/available", get(check_available))
        .route("/api/properties/:id/availability", get(get_calendar))
        .route("/api/block", post(block))
        .route("/api/unblock", post(unblock))
        .route("/api/try-block", post(try_block))
        .with_state(inventory)
}

async fn check_available(
    State(inventory): State<Arc<InventoryAuthority>>,
    Path(id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> WebResult<Json<AvailabilityAnswer>> {
    let range = DateRange::new(query.start, query.end)?;
    let answer = inventory
        .availability(PropertyId::from_uuid(id), range)
        .await?;
    Ok(Json(answer))
}

async fn get_property(
    State(inventory): State<Arc<InventoryAuthority>>,
    Path(id): Path<Uuid>,
) -> WebResult<Json<PropertyRecord>> {
    Ok(Json(inventory.property(PropertyId::from_uuid(id)).await?))
}

async fn register_property(
    State(inventory): State<Arc<InventoryAuthority>>,
    Path(id): Path<Uuid>,
    Json(body): Json<RegisterProperty>,
) -> WebResult<Json<PropertyCalendar>> {
    if body.max_guests == 0 {
        return Err(AppError::bad_request("maxGuests must be at least 1"));
    }
    let record = PropertyRecord {
        property_id: PropertyId::from_uuid(id),
        owner_id: body.owner_id,
        max_guests: body.max_guests,
        base_price: body.base_price,
    };
    Ok(Json(inventory.register_property(record, body.window).await?))
}

async fn get_calendar(
    State(inventory): State<Arc<InventoryAuthority>>,
    Path(id): Path<Uuid>,
) -> WebResult<Json<PropertyCalendar>> {
    Ok(Json(inventory.calendar(PropertyId::from_uuid(id)).await?))
}

async fn block(
    State(inventory): State<Arc<InventoryAuthority>>,
    Json(body): Json<RangeCommand>,
) -> WebResult<Json<CommandResponse<BlockOutcome>>> {
    let outcome = inventory
        .block_range(body.property_id, body.range()?, body.booking_id)
        .await?;
    Ok(CommandResponse::ok(outcome))
}

async fn unblock(
    State(inventory): State<Arc<InventoryAuthority>>,
    Json(body): Json<RangeCommand>,
) -> WebResult<Json<CommandResponse<UnblockOutcome>>> {
    let outcome = inventory
        .unblock_range(body.property_id, body.range()?, body.booking_id)
        .await?;
    Ok(CommandResponse::ok(outcome))
}

async fn try_block(
    State(inventory): State<Arc<InventoryAuthority>>,
    Json(body): Json<RangeCommand>,
) -> WebResult<Json<CommandResponse<BlockOutcome>>> {
    let booking_id = body
        .booking_id
        .ok_or_else(|| AppError::bad_request("bookingId is required for try-block"))?;
    let outcome = inventory
        .try_block_range(body.property_id, body.range()?, booking_id)
        .await?;
    Ok(CommandResponse::ok(outcome))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use crate::store::InMemoryPropertyStore;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use staysync_testing::fixtures::{june_range, property};
    use tower::ServiceExt;

    async fn app() -> (Router, PropertyId) {
        let inventory = Arc::new(InventoryAuthority::new(Arc::new(InMemoryPropertyStore::new())));
        let record = property();
        inventory
            .register_property(record.clone(), Some(june_range(1, 30)))
            .await
            .unwrap();
        (router(inventory), record.property_id)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn block_makes_range_unavailable() {
        let (app, pid) = app().await;
        let available = format!("/api/properties/{pid}/available?start=2025-06-01&end=2025-06-05");

        let (status, body) = send(&app, get(&available)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["available"], true);

        let command = json!({"propertyId": pid, "startDate": "2025-06-01", "endDate": "2025-06-05"});
        let (status, body) = send(&app, post_json("/api/block", &command)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["outcome"], "blocked");

        let (_, body) = send(&app, get(&available)).await;
        assert_eq!(body["available"], false);

        let (_, body) = send(&app, post_json("/api/unblock", &command)).await;
        assert_eq!(body["outcome"], "released");
    }

    #[tokio::test]
    async fn inverted_range_is_bad_request() {
        let (app, pid) = app().await;
        let (status, body) = send(
            &app,
            get(&format!(
                "/api/properties/{pid}/available?start=2025-06-05&end=2025-06-01"
            )),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_DATES");
    }

    #[tokio::test]
    async fn try_block_conflict_is_409() {
        let (app, pid) = app().await;
        let first = json!({
            "propertyId": pid, "startDate": "2025-06-01", "endDate": "2025-06-05",
            "bookingId": BookingId::new(),
        });
        let (status, _) = send(&app, post_json("/api/try-block", &first)).await;
        assert_eq!(status, StatusCode::OK);

        let second = json!({
            "propertyId": pid, "startDate": "2025-06-04", "endDate": "2025-06-08",
            "bookingId": BookingId::new(),
        });
        let (status, body) = send(&app, post_json("/api/try-block", &second)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "NOW_UNAVAILABLE");
    }

    #[tokio::test]
    async fn unknown_property_is_404() {
        let (app, _) = app().await;
        let (status, body) = send(&app, get(&format!("/api/properties/{}", PropertyId::new()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "PROPERTY_NOT_FOUND");
    }

    #[tokio::test]
    async fn register_then_snapshot() {
        let (app, _) = app().await;
        let pid = PropertyId::new();
        let body = json!({
            "ownerId": OwnerId::new(),
            "maxGuests": 2,
            "basePrice": 8_000,
            "window": {"startDate": "2025-06-01", "endDate": "2025-07-01"},
        });
        let request = Request::builder()
            .method("PUT")
            .uri(format!("/api/properties/{pid}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);

        let (status, snapshot) = send(&app, get(&format!("/api/properties/{pid}/availability"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["property"]["maxGuests"], 2);
        assert_eq!(snapshot["blocked"], json!([]));
    }
}
