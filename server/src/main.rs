//! `staysync` binary.

use staysync_server::{Application, Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,staysync=debug,sqlx=warn,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        address = %config.bind_address(),
        inventory = config.roles.inventory,
        bookings = config.roles.bookings,
        postgres = config.database.is_some(),
        redpanda = config.redpanda.is_some(),
        "Starting StaySync"
    );

    Application::builder(config).build().await?.run().await
}
