//! Prometheus metrics for the booking services.
//!
//! [`MetricsServer::start`] installs the global recorder and describes every
//! counter; the binary then serves [`MetricsServer::render`] on `/metrics`.
//! Call sites record through the small recorder structs below so that metric
//! names live in one place.

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address it is meant to be scraped on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint should bind to.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Install the recorder and describe all metrics.
    ///
    /// A recorder installed earlier (tests) is tolerated; `handle()` is then `None`.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                register_metrics();
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Prometheus handle, if this instance installed the recorder.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "staysync_bookings_created_total",
        "Bookings persisted as pending"
    );
    describe_counter!(
        "staysync_booking_rejections_total",
        "Booking requests rejected, by error code"
    );
    describe_counter!(
        "staysync_booking_transitions_total",
        "Booking status transitions, by target status"
    );
    describe_counter!(
        "staysync_accept_conflicts_total",
        "Accepts refused because the dates were taken in the meantime"
    );
    describe_counter!(
        "staysync_booking_requests_received_total",
        "BOOKING_CREATED events seen by the acceptance gateway"
    );
    describe_counter!(
        "staysync_event_publish_failures_total",
        "Events not delivered after a committed mutation, by topic"
    );
    describe_counter!(
        "staysync_calendar_mutations_total",
        "Calendar block/unblock operations, by op and outcome"
    );
    describe_counter!(
        "staysync_events_dead_lettered_total",
        "Events handed to the dead-letter sink, by consumer"
    );
    describe_counter!(
        "staysync_reconcile_repairs_total",
        "Drift repaired by the reconciliation job, by kind"
    );
    describe_histogram!(
        "staysync_inventory_call_duration_seconds",
        "Latency of synchronous inventory calls"
    );
    describe_counter!("retry_attempts_total", "Retry attempts");
    describe_counter!("retry_successes_total", "Operations that succeeded after retry");
    describe_counter!("retry_exhausted_total", "Operations that exhausted their retries");
}

/// Booking Authority and Gateway metrics.
pub struct BookingMetrics;

impl BookingMetrics {
    /// A pending booking was persisted.
    pub fn record_created() {
        counter!("staysync_bookings_created_total").increment(1);
    }

    /// A booking request was rejected with `code`.
    pub fn record_rejected(code: &'static str) {
        counter!("staysync_booking_rejections_total", "code" => code).increment(1);
    }

    /// A status transition was persisted.
    pub fn record_transition(to: &'static str) {
        counter!("staysync_booking_transitions_total", "to" => to).increment(1);
    }

    /// An accept lost the race for its dates.
    pub fn record_accept_conflict() {
        counter!("staysync_accept_conflicts_total").increment(1);
    }

    /// The gateway observed a new booking request.
    pub fn record_request_received() {
        counter!("staysync_booking_requests_received_total").increment(1);
    }

    /// Latency of a synchronous inventory call.
    pub fn record_inventory_call(duration: Duration) {
        histogram!("staysync_inventory_call_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Event bus metrics.
pub struct EventBusMetrics;

impl EventBusMetrics {
    /// An event could not be published after its mutation committed.
    pub fn record_publish_failure(topic: &str) {
        counter!("staysync_event_publish_failures_total", "topic" => topic.to_string())
            .increment(1);
    }

    /// An event was dead-lettered by `consumer`.
    pub fn record_dead_letter(consumer: &str) {
        counter!("staysync_events_dead_lettered_total", "consumer" => consumer.to_string())
            .increment(1);
    }
}

/// Inventory calendar metrics.
pub struct CalendarMetrics;

impl CalendarMetrics {
    /// A calendar mutation finished with `outcome`.
    pub fn record_mutation(op: &'static str, outcome: &'static str) {
        counter!("staysync_calendar_mutations_total", "op" => op, "outcome" => outcome)
            .increment(1);
    }
}

/// Reconciliation metrics.
pub struct ReconcileMetrics;

impl ReconcileMetrics {
    /// Drift of `kind` was repaired (or found unrepairable).
    pub fn record_repair(kind: &'static str, count: usize) {
        counter!("staysync_reconcile_repairs_total", "kind" => kind).increment(count as u64);
    }
}

/// Retry metrics.
pub struct RetryMetrics;

impl RetryMetrics {
    /// A retry is about to happen.
    pub fn record_attempt() {
        counter!("retry_attempts_total").increment(1);
    }

    /// An operation succeeded after at least one retry.
    pub fn record_success() {
        counter!("retry_successes_total").increment(1);
    }

    /// An operation ran out of retries.
    pub fn record_exhausted() {
        counter!("retry_exhausted_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn server_starts_and_renders_recorded_counters() {
        let mut server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        assert!(server.handle().is_none());
        server.start().unwrap();

        BookingMetrics::record_created();
        CalendarMetrics::record_mutation("block", "blocked");

        // Another test may have installed the recorder first.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("staysync_bookings_created_total"));
            assert!(rendered.contains("staysync_calendar_mutations_total"));
        }
    }
}
