//! Owner-facing HTTP routes. The caller (from `X-User-Id`) is the owner.
//!
//! - `GET  /api/owner/dashboard`
//! - `GET  /api/owner/bookings?status=`
//! - `GET  /api/owner/bookings/:id`
//! - `POST /api/owner/bookings/:id/accept`
//! - `POST /api/owner/bookings/:id/cancel`

use crate::acceptance::AcceptanceGateway;
use crate::dashboard::OwnerDashboard;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use staysync_core::types::{Booking, BookingId, BookingStatus, OwnerId};
use staysync_web::{CallerId, OutcomeResponse, WebResult};
use std::sync::Arc;
use uuid::Uuid;

/// `?status=` filter.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OwnerFilter {
    /// Only bookings in this status
    pub status: Option<BookingStatus>,
}

/// Routes of the Acceptance Gateway.
pub fn router(gateway: Arc<AcceptanceGateway>) -> Router {
    Router::new()
        .route("/api/owner/dashboard", get(dashboard))
        .route("/api/owner/bookings", get(list_bookings))
        .route("/api/owner/bookings/:id", get(get_booking))
        .route("/api/owner/bookings/:id/accept", post(accept))
        .route("/api/owner/bookings/:id/cancel", post(cancel))
        .with_state(gateway)
}

async fn dashboard(
    State(gateway): State<Arc<AcceptanceGateway>>,
    CallerId(caller): CallerId,
) -> WebResult<Json<OwnerDashboard>> {
    Ok(Json(gateway.owner_dashboard(OwnerId::from_uuid(caller)).await?))
}

async fn list_bookings(
    State(gateway): State<Arc<AcceptanceGateway>>,
    CallerId(caller): CallerId,
    Query(filter): Query<OwnerFilter>,
) -> WebResult<Json<Vec<Booking>>> {
    Ok(Json(
        gateway
            .owner_bookings(OwnerId::from_uuid(caller), filter.status)
            .await?,
    ))
}

async fn get_booking(
    State(gateway): State<Arc<AcceptanceGateway>>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> WebResult<Json<Booking>> {
    Ok(Json(
        gateway
            .owner_booking(BookingId::from_uuid(id), OwnerId::from_uuid(caller))
            .await?,
    ))
}

async fn accept(
    State(gateway): State<Arc<AcceptanceGateway>>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> WebResult<Json<OutcomeResponse<Booking>>> {
    let outcome = gateway
        .accept(BookingId::from_uuid(id), OwnerId::from_uuid(caller))
        .await?;
    Ok(Json(outcome.into()))
}

async fn cancel(
    State(gateway): State<Arc<AcceptanceGateway>>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> WebResult<Json<OutcomeResponse<Booking>>> {
    let outcome = gateway
        .cancel(BookingId::from_uuid(id), OwnerId::from_uuid(caller))
        .await?;
    Ok(Json(outcome.into()))
}
