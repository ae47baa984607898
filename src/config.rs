use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid listen address {0:?}")]
    InvalidAddr(String),

    #[error("ping period ({ping:?}) must be shorter than the read deadline ({pong:?})")]
    PingPeriodTooLong { ping: Duration, pong: Duration },
}

/// Per-connection limits and timers
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Capacity of each client's outbound queue
    pub outbound_capacity: usize,
    /// Deadline for a single frame write
    pub write_wait: Duration,
    /// Read deadline, refreshed by any inbound frame
    pub pong_wait: Duration,
    /// Keepalive ping period; must be below `pong_wait`
    pub ping_period: Duration,
    pub max_message_bytes: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            write_wait: Duration::from_secs(10),
            pong_wait: Duration::from_secs(60),
            ping_period: Duration::from_secs(54), // 9/10 of pong_wait
            max_message_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub connection: ConnectionConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup, falling back to the
    /// defaults for unset or unparsable values
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ConnectionConfig::default();

        let addr_raw = lookup("STATEHUB_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let addr = addr_raw
            .parse()
            .map_err(|_| ConfigError::InvalidAddr(addr_raw.clone()))?;

        let connection = ConnectionConfig {
            outbound_capacity: parse_or(
                &lookup,
                "STATEHUB_OUTBOUND_CAPACITY",
                defaults.outbound_capacity,
            )
            .max(1),
            write_wait: seconds_or(&lookup, "STATEHUB_WRITE_WAIT_SECS", defaults.write_wait),
            pong_wait: seconds_or(&lookup, "STATEHUB_PONG_WAIT_SECS", defaults.pong_wait),
            ping_period: seconds_or(&lookup, "STATEHUB_PING_PERIOD_SECS", defaults.ping_period),
            max_message_bytes: parse_or(
                &lookup,
                "STATEHUB_MAX_MESSAGE_BYTES",
                defaults.max_message_bytes,
            ),
        };
        if connection.ping_period >= connection.pong_wait || connection.ping_period.is_zero() {
            return Err(ConfigError::PingPeriodTooLong {
                ping: connection.ping_period,
                pong: connection.pong_wait,
            });
        }

        Ok(Self {
            addr,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            db_max_connections: parse_or(&lookup, "STATEHUB_DB_MAX_CONNECTIONS", 5),
            connection,
        })
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Ignoring invalid configuration value");
            default
        }),
    }
}

fn seconds_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    Duration::from_secs(parse_or(lookup, key, default.as_secs()))
}
