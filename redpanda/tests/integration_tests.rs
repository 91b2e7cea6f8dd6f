//! Integration tests for [`RedpandaEventBus`] against a real Kafka-compatible
//! broker.
//!
//! Docker must be running. Each test starts a Kafka container through
//! testcontainers with topic auto-creation enabled; startup takes a while.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use chrono::{NaiveDate, Utc};
use futures::StreamExt;
use staysync_core::event::SerializedEvent;
use staysync_core::event_bus::{EventBus, publish_event};
use staysync_core::events::{BookingCreated, BookingEvent};
use staysync_core::types::{
    Booking, BookingId, BookingStatus, DateRange, Money, OwnerId, PropertyId, TravelerId,
};
use staysync_redpanda::RedpandaEventBus;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

/// Start a broker container; the container is returned to keep it alive.
async fn broker() -> (ContainerAsync<Kafka>, String) {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");
    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    (kafka, format!("{host}:{port}"))
}

fn unique_topic(name: &str) -> String {
    format!("{name}-{}", uuid::Uuid::new_v4())
}

fn bus(brokers: &str, group: &str) -> RedpandaEventBus {
    RedpandaEventBus::builder()
        .brokers(brokers)
        .consumer_group(group)
        .auto_offset_reset("earliest")
        .build()
        .expect("bus")
}

fn booking() -> Booking {
    let now = Utc::now();
    Booking {
        id: BookingId::new(),
        property_id: PropertyId::new(),
        traveler_id: TravelerId::new(),
        owner_id: OwnerId::new(),
        range: DateRange::new(
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 5).unwrap(),
        )
        .unwrap(),
        guest_count: 2,
        total_price: Money::from_cents(40_000),
        status: BookingStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}

/// Publishes until the topic is auto-created and accepts writes.
async fn warm_up(bus: &RedpandaEventBus, topic: &str, event: &SerializedEvent) {
    for _ in 0..60 {
        if bus.publish(topic, event).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("broker never accepted a publish on {topic}");
}

#[tokio::test]
async fn booking_event_round_trips_as_json() {
    let topic = unique_topic("booking-requests");
    let (_kafka, brokers) = broker().await;
    let bus = bus(&brokers, &unique_topic("group"));
    let booking = booking();
    let event = BookingEvent::Created(BookingCreated::from_booking(&booking));
    let serialized = SerializedEvent::from_event(&event).unwrap();

    warm_up(&bus, &topic, &serialized).await;
    let mut stream = bus.subscribe(&[topic.as_str()]).await.unwrap();
    publish_event(&bus, &topic, &event).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(30), stream.next())
        .await
        .expect("timed out")
        .expect("stream ended")
        .expect("event");

    assert_eq!(received.event_type, BookingEvent::CREATED);
    assert_eq!(received.key.as_deref(), Some(booking.id.to_string().as_str()));
    let decoded: BookingEvent = received.decode().unwrap();
    assert_eq!(decoded.booking_id(), booking.id);

    let json: serde_json::Value = serde_json::from_slice(&received.data).unwrap();
    assert_eq!(json["eventType"], "BOOKING_CREATED");
}

#[tokio::test]
async fn one_booking_keeps_publish_order() {
    let topic = unique_topic("booking-status-updates");
    let (_kafka, brokers) = broker().await;
    let bus = bus(&brokers, &unique_topic("group"));
    let booking = booking();
    let created = BookingEvent::Created(BookingCreated::from_booking(&booking));
    let first = SerializedEvent::from_event(&created).unwrap();

    warm_up(&bus, &topic, &first).await;
    let mut stream = bus.subscribe(&[topic.as_str()]).await.unwrap();

    for _ in 0..5 {
        bus.publish(&topic, &first).await.unwrap();
    }

    let mut seen = 0;
    while seen < 5 {
        let event = tokio::time::timeout(Duration::from_secs(30), stream.next())
            .await
            .expect("timed out")
            .expect("stream ended")
            .expect("event");
        assert_eq!(event.key.as_deref(), Some(booking.id.to_string().as_str()));
        seen += 1;
    }
}
