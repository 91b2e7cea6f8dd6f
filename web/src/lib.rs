//! Axum integration shared by the StaySync HTTP surfaces.
//!
//! Each service builds its own `Router`; this crate supplies what they have
//! in common:
//!
//! - [`AppError`]: domain error to HTTP status + `{code, message}` body
//! - [`extractors`]: correlation id and caller identity
//! - [`middleware`]: correlation-id propagation
//! - [`handlers::health`]: liveness and readiness probes
//! - [`response`]: [`OutcomeResponse`], a value plus its `eventDelivered` flag
//!
//! # Example
//!
//! ```ignore
//! use staysync_web::{AppError, extractors::CallerId};
//!
//! async fn accept(
//!     State(gateway): State<Arc<AcceptanceGateway>>,
//!     CallerId(caller): CallerId,
//!     Path(id): Path<Uuid>,
//! ) -> Result<Json<Booking>, AppError> {
//!     let outcome = gateway.accept(BookingId::from_uuid(id), OwnerId::from_uuid(caller)).await?;
//!     Ok(Json(outcome.value))
//! }
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod response;

pub use error::{AppError, ErrorResponse};
pub use extractors::{CallerId, CorrelationId};
pub use handlers::{Readiness, health_check, readiness_check};
pub use response::OutcomeResponse;

/// Result alias for handlers.
pub type WebResult<T> = Result<T, AppError>;
