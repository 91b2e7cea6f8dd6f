//! Health check endpoints.
//!
//! `/health` is liveness: the process answers. `/ready` is readiness: the
//! service finished wiring its stores and consumers and has not begun
//! shutting down.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared readiness flag.
#[derive(Clone, Debug, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    /// A flag that starts not ready.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark ready or not ready.
    pub fn set(&self, ready: bool) {
        self.0.store(ready, Ordering::SeqCst);
    }

    /// Current state.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Readiness response body.
#[derive(Debug, Serialize)]
pub struct ReadinessBody {
    /// `ready` or `starting`
    pub status: &'static str,
}

/// Liveness probe.
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness probe.
#[allow(clippy::unused_async)]
pub async fn readiness_check(
    State(readiness): State<Readiness>,
) -> (StatusCode, Json<ReadinessBody>) {
    if readiness.is_ready() {
        (StatusCode::OK, Json(ReadinessBody { status: "ready" }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessBody { status: "starting" }),
        )
    }
}
