//! Wiring and lifecycle of a StaySync process.
//!
//! [`ApplicationBuilder::build`] turns a [`Config`] into an [`Application`]:
//! stores (Postgres or in-memory), the event bus (Redpanda or in-process),
//! the services for the configured roles, their consumers and one merged
//! router. [`Application::run`] serves HTTP until SIGINT/SIGTERM, then
//! broadcasts shutdown to the background tasks and waits for them.

use crate::config::{Config, RedpandaConfig};
use crate::reconcile::Reconciler;
use anyhow::Context;
use axum::{Router, middleware, routing::get};
use staysync_booking::{BookingAuthority, BookingCache, BookingRepository, InMemoryBookingRepository, StatusResyncHandler};
use staysync_core::environment::{Clock, SystemClock};
use staysync_core::event_bus::EventBus;
use staysync_core::events::{BOOKING_REQUESTS_TOPIC, BOOKING_STATUS_TOPIC};
use staysync_core::ports::InventoryService;
use staysync_gateway::{AcceptanceGateway, BookingRequestHandler};
use staysync_inventory::{
    CalendarSyncHandler, HttpInventoryClient, InMemoryPropertyStore, InventoryAuthority, PropertyStore,
};
use staysync_postgres::{PostgresBookingRepository, PostgresDeadLetterSink, PostgresPropertyStore};
use staysync_redpanda::RedpandaEventBus;
use staysync_runtime::metrics::MetricsServer;
use staysync_runtime::{DeadLetterSink, EventConsumer, EventHandler, LoggingDeadLetterSink, RetryPolicy};
use staysync_testing::InMemoryEventBus;
use staysync_web::{Readiness, health_check, readiness_check};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Consumer names; with Redpanda each is also a consumer group suffix.
pub mod consumers {
    /// Inventory: block/unblock on status changes
    pub const CALENDAR_SYNC: &str = "calendar-sync";
    /// Booking Authority: resync status and caches
    pub const STATUS_RESYNC: &str = "booking-status-resync";
    /// Gateway: surface new requests to owners
    pub const BOOKING_REQUESTS: &str = "booking-requests";
}

/// Builder for [`Application`].
pub struct ApplicationBuilder {
    config: Config,
    event_bus: Option<Arc<dyn EventBus>>,
    dead_letters: Option<Arc<dyn DeadLetterSink>>,
    clock: Arc<dyn Clock>,
}

impl ApplicationBuilder {
    /// Use this bus for publishing and for every consumer instead of the
    /// configured one.
    #[must_use]
    pub fn event_bus(mut self, event_bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Send dead letters here instead of the database or the log.
    #[must_use]
    pub fn dead_letters(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letters = Some(sink);
        self
    }

    /// Replace the system clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Connect stores and the bus and assemble the services.
    ///
    /// # Errors
    ///
    /// Fails when the database or broker cannot be reached, migrations fail,
    /// or the inventory client cannot be created.
    pub async fn build(self) -> anyhow::Result<Application> {
        let config = self.config;

        let pool = match &config.database {
            Some(db) => {
                let pool = staysync_postgres::connect(&db.url, db.max_connections)
                    .await
                    .context("connecting to PostgreSQL")?;
                staysync_postgres::migrate(&pool)
                    .await
                    .context("running migrations")?;
                Some(pool)
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory stores");
                None
            }
        };

        let buses = Buses::new(self.event_bus, config.redpanda.clone())?;
        let dead_letters: Arc<dyn DeadLetterSink> = match (self.dead_letters, &pool) {
            (Some(sink), _) => sink,
            (None, Some(pool)) => Arc::new(PostgresDeadLetterSink::new(pool.clone())),
            (None, None) => Arc::new(LoggingDeadLetterSink),
        };
        let retry_policy = RetryPolicy::builder()
            .max_retries(config.consumer.max_retries)
            .initial_delay(config.consumer.retry_delay)
            .jitter(true)
            .build();
        let (shutdown_tx, _) = broadcast::channel(1);

        let mut router = Router::new();
        let mut pending_consumers: Vec<(&'static str, &'static str, Arc<dyn EventHandler>)> = Vec::new();
        let mut reconciler = None;

        let local_inventory = if config.roles.inventory {
            let store: Arc<dyn PropertyStore> = match &pool {
                Some(pool) => Arc::new(PostgresPropertyStore::new(pool.clone())),
                None => Arc::new(InMemoryPropertyStore::new()),
            };
            let authority = Arc::new(InventoryAuthority::new(store));
            router = router.merge(staysync_inventory::api::router(authority.clone()));
            pending_consumers.push((
                consumers::CALENDAR_SYNC,
                BOOKING_STATUS_TOPIC,
                Arc::new(CalendarSyncHandler::new(authority.clone())),
            ));
            info!("Inventory role enabled");
            Some(authority)
        } else {
            None
        };

        if config.roles.bookings {
            let inventory: Arc<dyn InventoryService> = match (&local_inventory, &config.inventory.url) {
                (Some(authority), _) => authority.clone(),
                (None, Some(url)) => {
                    info!(url = %url, "Using remote Inventory Authority");
                    Arc::new(
                        HttpInventoryClient::new(url.clone(), config.inventory.timeout)
                            .context("building inventory client")?,
                    )
                }
                (None, None) => anyhow::bail!("INVENTORY_URL is required when the inventory role is not local"),
            };

            let repository: Arc<dyn BookingRepository> = match &pool {
                Some(pool) => Arc::new(PostgresBookingRepository::new(pool.clone())),
                None => Arc::new(InMemoryBookingRepository::new()),
            };
            let bookings = Arc::new(
                BookingAuthority::new(
                    repository.clone(),
                    inventory.clone(),
                    buses.publisher(),
                    self.clock,
                )
                .with_inventory_timeout(config.inventory.timeout)
                .with_cache(BookingCache::new(config.cache.capacity, config.cache.ttl)),
            );
            let gateway = Arc::new(
                AcceptanceGateway::new(bookings.clone(), inventory.clone(), buses.publisher())
                    .with_inventory_timeout(config.inventory.timeout),
            );

            router = router
                .merge(staysync_booking::api::router(bookings.clone()))
                .merge(staysync_gateway::api::router(gateway));
            pending_consumers.push((
                consumers::STATUS_RESYNC,
                BOOKING_STATUS_TOPIC,
                Arc::new(StatusResyncHandler::new(bookings)),
            ));
            pending_consumers.push((
                consumers::BOOKING_REQUESTS,
                BOOKING_REQUESTS_TOPIC,
                Arc::new(BookingRequestHandler),
            ));

            if let Some(interval) = config.reconcile_interval {
                reconciler = Some((Reconciler::new(repository, inventory), interval));
            }
            info!("Bookings role enabled");
        }

        let mut built = Vec::with_capacity(pending_consumers.len());
        for (name, topic, handler) in pending_consumers {
            built.push(
                EventConsumer::builder()
                    .name(name)
                    .topics(vec![topic.to_string()])
                    .event_bus(buses.subscriber(name)?)
                    .handler(handler)
                    .dead_letters(dead_letters.clone())
                    .retry_policy(retry_policy.clone())
                    .shutdown(shutdown_tx.subscribe())
                    .build()?,
            );
        }

        let readiness = Readiness::new();
        let router = router
            .merge(
                Router::new()
                    .route("/health", get(health_check))
                    .route("/ready", get(readiness_check))
                    .with_state(readiness.clone()),
            )
            .layer(middleware::from_fn(staysync_web::middleware::correlation_id))
            .layer(TraceLayer::new_for_http());

        Ok(Application {
            config,
            router,
            consumers: built,
            reconciler,
            readiness,
            shutdown_tx,
        })
    }
}

/// Hands out event buses: one shared publisher, and one subscriber per
/// consumer (each Redpanda consumer gets its own group).
struct Buses {
    shared: Arc<dyn EventBus>,
    redpanda: Option<RedpandaConfig>,
}

impl Buses {
    fn new(injected: Option<Arc<dyn EventBus>>, redpanda: Option<RedpandaConfig>) -> anyhow::Result<Self> {
        if let Some(bus) = injected {
            return Ok(Self {
                shared: bus,
                redpanda: None,
            });
        }
        match redpanda {
            Some(rp) => {
                let producer = RedpandaEventBus::builder()
                    .brokers(&rp.brokers)
                    .build()
                    .context("connecting to Redpanda")?;
                Ok(Self {
                    shared: Arc::new(producer),
                    redpanda: Some(rp),
                })
            }
            None => {
                warn!("REDPANDA_BROKERS not set; using the in-process event bus");
                Ok(Self {
                    shared: Arc::new(InMemoryEventBus::new()),
                    redpanda: None,
                })
            }
        }
    }

    fn publisher(&self) -> Arc<dyn EventBus> {
        self.shared.clone()
    }

    fn subscriber(&self, consumer: &str) -> anyhow::Result<Arc<dyn EventBus>> {
        let Some(rp) = &self.redpanda else {
            return Ok(self.shared.clone());
        };
        let bus = RedpandaEventBus::builder()
            .brokers(&rp.brokers)
            .consumer_group(rp.group(consumer))
            .auto_offset_reset(&rp.auto_offset_reset)
            .build()
            .with_context(|| format!("creating Redpanda consumer {consumer}"))?;
        Ok(Arc::new(bus))
    }
}

/// A fully wired process.
pub struct Application {
    config: Config,
    router: Router,
    consumers: Vec<EventConsumer>,
    reconciler: Option<(Reconciler, Duration)>,
    readiness: Readiness,
    shutdown_tx: broadcast::Sender<()>,
}

impl Application {
    /// Start a builder with the system clock and the configured bus.
    #[must_use]
    pub fn builder(config: Config) -> ApplicationBuilder {
        ApplicationBuilder {
            config,
            event_bus: None,
            dead_letters: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// The merged HTTP router.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Readiness flag served on `/ready`.
    #[must_use]
    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    /// Sender that stops every background task.
    #[must_use]
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Spawn consumers and the reconciliation job, then report ready.
    pub fn start_background(&mut self) -> Vec<JoinHandle<()>> {
        let mut handles: Vec<JoinHandle<()>> = self
            .consumers
            .drain(..)
            .map(EventConsumer::spawn)
            .collect();
        if let Some((reconciler, interval)) = self.reconciler.take() {
            handles.push(tokio::spawn(
                reconciler.run_every(interval, self.shutdown_tx.subscribe()),
            ));
        }
        info!(tasks = handles.len(), "Background tasks started");
        self.readiness.set(true);
        handles
    }

    /// Serve until a shutdown signal, then stop background tasks.
    ///
    /// # Errors
    ///
    /// Fails if the listener cannot bind or the server errors.
    pub async fn run(mut self) -> anyhow::Result<()> {
        if self.config.server.metrics_port > 0 {
            let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.metrics_port)
                .parse()
                .context("parsing metrics address")?;
            spawn_metrics_endpoint(addr).await?;
        }

        let address = self.config.bind_address();
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .with_context(|| format!("binding {address}"))?;
        info!(address = %address, "HTTP server listening");

        let handles = self.start_background();
        let readiness = self.readiness.clone();
        axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                readiness.set(false);
            })
            .await
            .context("HTTP server failed")?;

        info!("HTTP server stopped, stopping background tasks");
        let _ = self.shutdown_tx.send(());
        await_shutdown(handles, self.config.server.shutdown_timeout).await;
        info!("Shutdown complete");
        Ok(())
    }
}

/// Install the Prometheus recorder and serve it on `/metrics`.
async fn spawn_metrics_endpoint(addr: SocketAddr) -> anyhow::Result<()> {
    let mut server = MetricsServer::new(addr);
    server.start().context("installing metrics recorder")?;
    let Some(handle) = server.handle().cloned() else {
        return Ok(());
    };

    let app = Router::new().route("/metrics", get(move || std::future::ready(handle.render())));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding metrics endpoint {addr}"))?;
    info!(addr = %addr, "Metrics endpoint listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "Metrics endpoint stopped");
        }
    });
    Ok(())
}

async fn await_shutdown(handles: Vec<JoinHandle<()>>, timeout: Duration) {
    for (idx, handle) in handles.into_iter().enumerate() {
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => info!(task = idx, "Task stopped"),
            Ok(Err(e)) => warn!(task = idx, error = %e, "Task failed"),
            Err(_) => warn!(task = idx, "Task shutdown timed out"),
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
