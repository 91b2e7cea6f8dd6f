//! HTTP surface of the Booking Authority.
//!
//! - `POST /api/bookings` - request a stay (caller is the traveler)
//! - `GET  /api/bookings/:id`
//! - `GET  /api/bookings/traveler/:id?status=`
//! - `GET  /api/bookings/owner/:id?status=`
//!
//! Status changes are not exposed here. They go through the Acceptance
//! Gateway, which checks ownership, claims the dates and announces the change.

use crate::authority::{BookingAuthority, CreateBooking};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use staysync_core::types::{
    Booking, BookingId, BookingStatus, DateRange, Money, OwnerId, PropertyId, TravelerId,
};
use staysync_web::{CallerId, OutcomeResponse, WebResult};
use std::sync::Arc;
use uuid::Uuid;

/// Body of `POST /api/bookings`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    /// Property to book
    pub property_id: PropertyId,
    /// First night
    pub start_date: NaiveDate,
    /// Check-out day
    pub end_date: NaiveDate,
    /// Number of guests
    pub guest_count: u32,
    /// Quoted price in cents
    #[serde(default)]
    pub total_price: Option<Money>,
}

/// `?status=` filter of the list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StatusFilter {
    /// Only bookings in this status
    pub status: Option<BookingStatus>,
}

/// Routes of the Booking Authority.
pub fn router(bookings: Arc<BookingAuthority>) -> Router {
    Router::new()
        .route("/api/bookings", post(create_booking))
        .route("/api/bookings/:id", get(get_booking))
        .route("/api/bookings/traveler/:id", get(list_for_traveler))
        .route("/api/bookings/owner/:id", get(list_for_owner))
        .with_state(bookings)
}

async fn create_booking(
    State(bookings): State<Arc<BookingAuthority>>,
    CallerId(caller): CallerId,
    Json(body): Json<CreateBookingRequest>,
) -> WebResult<(StatusCode, Json<OutcomeResponse<Booking>>)> {
    let range = DateRange::new(body.start_date, body.end_date)?;
    let outcome = bookings
        .create(CreateBooking {
            property_id: body.property_id,
            traveler_id: TravelerId::from_uuid(caller),
            range,
            guest_count: body.guest_count,
            total_price: body.total_price,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

async fn get_booking(
    State(bookings): State<Arc<BookingAuthority>>,
    Path(id): Path<Uuid>,
) -> WebResult<Json<Booking>> {
    Ok(Json(bookings.get_by_id(BookingId::from_uuid(id)).await?))
}

async fn list_for_traveler(
    State(bookings): State<Arc<BookingAuthority>>,
    Path(id): Path<Uuid>,
    Query(filter): Query<StatusFilter>,
) -> WebResult<Json<Vec<Booking>>> {
    Ok(Json(
        bookings
            .list_by_traveler(TravelerId::from_uuid(id), filter.status)
            .await?,
    ))
}

async fn list_for_owner(
    State(bookings): State<Arc<BookingAuthority>>,
    Path(id): Path<Uuid>,
    Query(filter): Query<StatusFilter>,
) -> WebResult<Json<Vec<Booking>>> {
    Ok(Json(
        bookings
            .list_by_owner(OwnerId::from_uuid(id), filter.status)
            .await?,
    ))
}
