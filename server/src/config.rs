//! Configuration loaded from environment variables.
//!
//! `.env` is read first (via `dotenvy`) when present. Every setting has a
//! default except `INVENTORY_URL`, which is required when this instance
//! serves bookings without hosting the Inventory Authority.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration problems found at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but does not parse.
    #[error("invalid value {value:?} for {key}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Offending value
        value: String,
    },

    /// `STAYSYNC_ROLES` names something other than `inventory` or `bookings`.
    #[error("unknown role {0:?} in STAYSYNC_ROLES (expected inventory, bookings)")]
    UnknownRole(String),

    /// `STAYSYNC_ROLES` is empty.
    #[error("STAYSYNC_ROLES must name at least one role")]
    NoRoles,

    /// Bookings without a local or remote Inventory Authority.
    #[error("INVENTORY_URL is required when the inventory role is not local")]
    MissingInventoryUrl,
}

/// Which services this process hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roles {
    /// Inventory Authority routes and the calendar-sync consumer
    pub inventory: bool,
    /// Booking Authority, Acceptance Gateway and their consumers
    pub bookings: bool,
}

impl Default for Roles {
    fn default() -> Self {
        Self {
            inventory: true,
            bookings: true,
        }
    }
}

impl FromStr for Roles {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut roles = Self {
            inventory: false,
            bookings: false,
        };
        for role in s.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            match role {
                "inventory" => roles.inventory = true,
                "bookings" => roles.bookings = true,
                other => return Err(ConfigError::UnknownRole(other.to_string())),
            }
        }
        if !roles.inventory && !roles.bookings {
            return Err(ConfigError::NoRoles);
        }
        Ok(roles)
    }
}

/// HTTP and process settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Prometheus scrape port; 0 disables the exporter
    pub metrics_port: u16,
    /// How long background tasks get to stop
    pub shutdown_timeout: Duration,
}

/// How the Booking Authority and Gateway reach the Inventory Authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryConfig {
    /// Base URL of a remote Inventory Authority
    pub url: Option<String>,
    /// Timeout of every synchronous inventory call
    pub timeout: Duration,
}

/// `PostgreSQL` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Connection URL
    pub url: String,
    /// Pool size
    pub max_connections: u32,
}

/// Redpanda settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedpandaConfig {
    /// Bootstrap servers
    pub brokers: String,
    /// Prefix of every consumer group id
    pub group_prefix: String,
    /// Offset policy for new consumer groups
    pub auto_offset_reset: String,
}

impl RedpandaConfig {
    /// Consumer group of one consumer.
    #[must_use]
    pub fn group(&self, consumer: &str) -> String {
        format!("{}{consumer}", self.group_prefix)
    }
}

/// Consumer retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub retry_delay: Duration,
}

/// Booking read cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Entries kept; 0 disables the cache
    pub capacity: usize,
    /// Entry lifetime
    pub ttl: Duration,
}

/// Complete service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// HTTP and process settings
    pub server: ServerConfig,
    /// Hosted services
    pub roles: Roles,
    /// Inventory access
    pub inventory: InventoryConfig,
    /// Durable storage; in-memory stores when `None`
    pub database: Option<DatabaseConfig>,
    /// Broker; in-process bus when `None`
    pub redpanda: Option<RedpandaConfig>,
    /// Consumer retries
    pub consumer: ConsumerConfig,
    /// Reconciliation period; `None` disables the job
    pub reconcile_interval: Option<Duration>,
    /// Booking read cache
    pub cache: CacheConfig,
}

impl Config {
    /// Load `.env` (if any) and read the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for malformed values or an inconsistent role
    /// setup.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let roles = match vars.get("STAYSYNC_ROLES") {
            Some(value) => value.parse()?,
            None => Roles::default(),
        };

        let inventory = InventoryConfig {
            url: vars.get("INVENTORY_URL"),
            timeout: Duration::from_millis(vars.parse("INVENTORY_TIMEOUT_MS", 2000)?),
        };
        if roles.bookings && !roles.inventory && inventory.url.is_none() {
            return Err(ConfigError::MissingInventoryUrl);
        }

        let database = match vars.get("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: vars.parse("DATABASE_MAX_CONNECTIONS", 10)?,
            }),
            None => None,
        };

        let redpanda = vars.get("REDPANDA_BROKERS").map(|brokers| RedpandaConfig {
            brokers,
            group_prefix: vars
                .get("CONSUMER_GROUP_PREFIX")
                .unwrap_or_else(|| "staysync-".to_string()),
            auto_offset_reset: vars
                .get("REDPANDA_AUTO_OFFSET_RESET")
                .unwrap_or_else(|| "earliest".to_string()),
        });

        let reconcile_secs: u64 = vars.parse("RECONCILE_INTERVAL_SECS", 300)?;

        Ok(Self {
            server: ServerConfig {
                host: vars.get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: vars.parse("PORT", 8080)?,
                metrics_port: vars.parse("METRICS_PORT", 9090)?,
                shutdown_timeout: Duration::from_secs(vars.parse("SHUTDOWN_TIMEOUT", 10)?),
            },
            roles,
            inventory,
            database,
            redpanda,
            consumer: ConsumerConfig {
                max_retries: vars.parse("CONSUMER_MAX_RETRIES", 5)?,
                retry_delay: Duration::from_millis(vars.parse("CONSUMER_RETRY_DELAY_MS", 200)?),
            },
            reconcile_interval: (reconcile_secs > 0).then(|| Duration::from_secs(reconcile_secs)),
            cache: CacheConfig {
                capacity: vars.parse("BOOKING_CACHE_CAPACITY", 1024)?,
                ttl: Duration::from_secs(vars.parse("BOOKING_CACHE_TTL_SECS", 60)?),
            },
        })
    }

    /// `host:port` of the HTTP listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// A set, non-blank variable.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value }),
            None => Ok(default),
        }
    }
}
