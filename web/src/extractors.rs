//! Custom Axum extractors.
//!
//! - [`CorrelationId`]: the request's correlation id (set by
//!   [`correlation_id`](crate::middleware::correlation_id) or read from the header)
//! - [`CallerId`]: the authenticated caller, forwarded by the upstream
//!   identity layer in the `X-User-Id` header

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Header carrying the authenticated caller's id.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Correlation ID for request tracing.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .extensions
            .get::<Uuid>()
            .copied()
            .or_else(|| {
                parts
                    .headers
                    .get(CORRELATION_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| Uuid::parse_str(s).ok())
            })
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(id))
    }
}

/// Id of the authenticated caller.
///
/// Authentication itself happens upstream; this only reads the forwarded id
/// and rejects requests without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing caller identity"))?;

        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| AppError::unauthorized("malformed caller identity"))
    }
}
