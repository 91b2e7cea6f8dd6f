//! End-to-end booking saga over HTTP with the in-process bus.
//!
//! Every role runs in one process with in-memory stores; consumers are
//! spawned exactly as in production, so calendar releases happen
//! asynchronously and are awaited by polling.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use staysync_core::event::SerializedEvent;
use staysync_core::event_bus::EventBus;
use staysync_core::events::{BOOKING_REQUESTS_TOPIC, BOOKING_STATUS_TOPIC};
use staysync_core::types::{BookingId, OwnerId, PropertyId, TravelerId};
use staysync_server::app::consumers;
use staysync_server::{Application, Config};
use staysync_testing::{InMemoryDeadLetterSink, InMemoryEventBus, init_test_tracing, test_clock};
use staysync_web::extractors::USER_ID_HEADER;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower::ServiceExt;

struct Harness {
    app: Router,
    bus: Arc<InMemoryEventBus>,
    dead_letters: Arc<InMemoryDeadLetterSink>,
    shutdown: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl Harness {
    async fn start() -> Self {
        init_test_tracing();
        let config = Config::from_lookup(|key| match key {
            "RECONCILE_INTERVAL_SECS" => Some("0".to_string()),
            "CONSUMER_RETRY_DELAY_MS" => Some("1".to_string()),
            _ => None,
        })
        .unwrap();
        let bus = Arc::new(InMemoryEventBus::new());
        let dead_letters = Arc::new(InMemoryDeadLetterSink::new());
        let mut application = Application::builder(config)
            .event_bus(bus.clone())
            .dead_letters(dead_letters.clone())
            .clock(Arc::new(test_clock()))
            .build()
            .await
            .unwrap();
        let tasks = application.start_background();
        bus.wait_for_subscribers(BOOKING_STATUS_TOPIC, 2).await;
        bus.wait_for_subscribers(BOOKING_REQUESTS_TOPIC, 1).await;

        Self {
            app: application.router(),
            bus,
            dead_letters,
            shutdown: application.shutdown_sender(),
            tasks,
        }
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        for task in self.tasks {
            tokio::time::timeout(Duration::from_secs(5), task)
                .await
                .unwrap()
                .unwrap();
        }
    }

    async fn call(&self, method: &str, uri: &str, caller: Option<String>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            request = request.header(USER_ID_HEADER, caller);
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn register_property(&self, owner: OwnerId) -> PropertyId {
        let property = PropertyId::new();
        let (status, _) = self
            .call(
                "PUT",
                &format!("/api/properties/{property}"),
                None,
                Some(json!({"ownerId": owner, "maxGuests": 4, "basePrice": 10_000})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        property
    }

    async fn request_stay(&self, property: PropertyId, start: &str, end: &str) -> (StatusCode, Value) {
        self.call(
            "POST",
            "/api/bookings",
            Some(TravelerId::new().to_string()),
            Some(json!({
                "propertyId": property,
                "startDate": start,
                "endDate": end,
                "guestCount": 2
            })),
        )
        .await
    }

    async fn book(&self, property: PropertyId, start: &str, end: &str) -> String {
        let (status, body) = self.request_stay(property, start, end).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["status"], "pending");
        body["id"].as_str().unwrap().to_string()
    }

    async fn decide(&self, owner: OwnerId, booking: &str, action: &str) -> (StatusCode, Value) {
        self.call(
            "POST",
            &format!("/api/owner/bookings/{booking}/{action}"),
            Some(owner.to_string()),
            None,
        )
        .await
    }

    async fn available(&self, property: PropertyId, start: &str, end: &str) -> bool {
        let (status, body) = self
            .call(
                "GET",
                &format!("/api/properties/{property}/available?start={start}&end={end}"),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["available"].as_bool().unwrap()
    }

    async fn blocked_count(&self, property: PropertyId) -> usize {
        let (_, body) = self
            .call("GET", &format!("/api/properties/{property}/availability"), None, None)
            .await;
        body["blocked"].as_array().map_or(0, Vec::len)
    }

    /// Poll until the range reaches `expected` availability.
    async fn await_available(&self, property: PropertyId, start: &str, end: &str, expected: bool) {
        for _ in 0..500 {
            if self.available(property, start, end).await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{start}..{end} never became available={expected}");
    }
}

#[tokio::test]
async fn accept_then_cancel_round_trip() {
    let harness = Harness::start().await;
    let owner = OwnerId::new();
    let property = harness.register_property(owner).await;

    let booking = harness.book(property, "2025-06-01", "2025-06-05").await;
    assert!(
        harness.available(property, "2025-06-01", "2025-06-05").await,
        "a pending request holds no dates"
    );

    let (status, accepted) = harness.decide(owner, &booking, "accept").await;
    assert_eq!(status, StatusCode::OK, "{accepted}");
    assert_eq!(accepted["status"], "accepted");
    assert_eq!(accepted["eventDelivered"], true);
    assert!(!harness.available(property, "2025-06-01", "2025-06-05").await);
    assert!(!harness.available(property, "2025-06-04", "2025-06-06").await);

    let (status, cancelled) = harness.decide(owner, &booking, "cancel").await;
    assert_eq!(status, StatusCode::OK, "{cancelled}");
    assert_eq!(cancelled["status"], "cancelled");
    harness
        .await_available(property, "2025-06-01", "2025-06-05", true)
        .await;

    let (status, body) = harness.decide(owner, &booking, "cancel").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_CANCELLED");

    let events = harness.bus.published_on(BOOKING_STATUS_TOPIC).await;
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.key.as_deref() == Some(booking.as_str())));

    harness.stop().await;
}

#[tokio::test]
async fn checkout_day_is_free_for_the_next_guest() {
    let harness = Harness::start().await;
    let owner = OwnerId::new();
    let property = harness.register_property(owner).await;

    let first = harness.book(property, "2025-06-01", "2025-06-05").await;
    let (status, _) = harness.decide(owner, &first, "accept").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = harness.request_stay(property, "2025-06-03", "2025-06-07").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NOT_AVAILABLE");

    let second = harness.book(property, "2025-06-05", "2025-06-08").await;
    let (status, body) = harness.decide(owner, &second, "accept").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(harness.blocked_count(property).await, 2);

    harness.stop().await;
}

#[tokio::test]
async fn only_one_of_two_overlapping_requests_is_accepted() {
    let harness = Harness::start().await;
    let owner = OwnerId::new();
    let property = harness.register_property(owner).await;

    let first = harness.book(property, "2025-06-01", "2025-06-05").await;
    let second = harness.book(property, "2025-06-03", "2025-06-06").await;

    let (status, _) = harness.decide(owner, &first, "accept").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = harness.decide(owner, &second, "accept").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NOW_UNAVAILABLE");

    let (_, loser) = harness
        .call("GET", &format!("/api/bookings/{second}"), None, None)
        .await;
    assert_eq!(loser["status"], "pending");

    let (status, _) = harness.decide(owner, &second, "cancel").await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        harness.blocked_count(property).await,
        1,
        "cancelling a never-accepted stay must not release the winner's dates"
    );

    harness.stop().await;
}

#[tokio::test]
async fn redelivered_status_events_change_nothing() {
    let harness = Harness::start().await;
    let owner = OwnerId::new();
    let property = harness.register_property(owner).await;

    let booking = harness.book(property, "2025-06-10", "2025-06-12").await;
    let (status, _) = harness.decide(owner, &booking, "accept").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(harness.bus.redeliver(BOOKING_STATUS_TOPIC).await, 1);
    assert_eq!(harness.bus.redeliver(BOOKING_STATUS_TOPIC).await, 1);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(harness.blocked_count(property).await, 1);
    let (_, stored) = harness
        .call("GET", &format!("/api/bookings/{booking}"), None, None)
        .await;
    assert_eq!(stored["status"], "accepted");

    harness.stop().await;
}

#[tokio::test]
async fn failed_publish_still_commits_the_acceptance() {
    let harness = Harness::start().await;
    let owner = OwnerId::new();
    let property = harness.register_property(owner).await;
    let booking = harness.book(property, "2025-06-01", "2025-06-03").await;

    harness.bus.fail_next_publishes(1).await;
    let (status, body) = harness.decide(owner, &booking, "accept").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["eventDelivered"], false);

    assert!(!harness.available(property, "2025-06-01", "2025-06-03").await);
    assert!(harness.bus.published_on(BOOKING_STATUS_TOPIC).await.is_empty());

    harness.stop().await;
}

#[tokio::test]
async fn strangers_cannot_decide_on_a_booking() {
    let harness = Harness::start().await;
    let owner = OwnerId::new();
    let property = harness.register_property(owner).await;
    let booking = harness.book(property, "2025-06-01", "2025-06-03").await;

    let (status, body) = harness.decide(OwnerId::new(), &booking, "accept").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = harness.decide(owner, &booking, "accept").await;
    assert_eq!(status, StatusCode::OK);

    let (status, listed) = harness
        .call("GET", "/api/owner/bookings?status=accepted", Some(owner.to_string()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    harness.stop().await;
}

#[tokio::test]
async fn events_for_unknown_records_are_dead_lettered() {
    let harness = Harness::start().await;
    let booking = BookingId::new();
    let payload = json!({
        "eventType": "BOOKING_STATUS_UPDATED",
        "bookingId": booking,
        "propertyId": PropertyId::new(),
        "travelerId": TravelerId::new(),
        "startDate": "2025-06-01",
        "endDate": "2025-06-04",
        "oldStatus": "pending",
        "newStatus": "accepted",
        "timestamp": "2025-05-01T12:00:00Z"
    });
    let event = SerializedEvent::new(
        "BOOKING_STATUS_UPDATED".to_string(),
        Some(booking.to_string()),
        serde_json::to_vec(&payload).unwrap(),
    );
    harness.bus.publish(BOOKING_STATUS_TOPIC, &event).await.unwrap();

    let mut letters = Vec::new();
    for _ in 0..500 {
        letters = harness.dead_letters.letters().await;
        if letters.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(letters.len(), 2, "{letters:?}");
    assert!(letters.iter().all(|l| l.permanent && l.attempts == 1));
    let mut consumers_hit: Vec<&str> = letters.iter().map(|l| l.consumer.as_str()).collect();
    consumers_hit.sort_unstable();
    assert_eq!(consumers_hit, [consumers::STATUS_RESYNC, consumers::CALENDAR_SYNC]);

    harness.stop().await;
}
