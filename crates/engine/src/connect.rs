//! Connection establishment with fixed-interval retry
//!
//! Databases started alongside the application (containers, CI services)
//! often refuse connections for a while. `connect_with_retry` keeps trying a
//! connector at a fixed interval until it succeeds or the attempts run out.
//!
//! This is the only retry in the system. Units of work are never retried.

use crate::config::{DataSourceConfig, PoolConfig};
use std::thread;
use std::time::Duration;
use tracing::info;
use txroute_core::{Connection, Error, Result};
use txroute_dialects::Dialect;

/// Retry policy for establishing a connection
///
/// # Example
/// ```ignore
/// let policy = RetryPolicy::default().with_max_attempts(5);
/// let conn = connect_with_retry(&policy, || MyDriver::open(&dsn))?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with default values (20 attempts, 1 second apart)
    pub fn new() -> Self {
        Self::default()
    }

    /// Single attempt, no waiting
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Set the number of attempts (at least 1)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the delay between attempts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Everything a driver needs to open a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Driver name (`"mysql"`, `"postgres"`, `"sqlite3"`)
    pub driver: &'static str,
    /// Connection string
    pub dsn: String,
    /// Pool sizing
    pub pool: PoolConfig,
    /// Driver-level statement logging
    pub debug: bool,
}

/// Call `connect` until it succeeds or `policy.max_attempts` is reached
///
/// Each failure is logged at info level and followed by `policy.delay`
/// (except after the last attempt).
///
/// # Errors
/// `Error::PingTimeout` when every attempt failed.
pub fn connect_with_retry<C, F>(policy: &RetryPolicy, mut connect: F) -> Result<C>
where
    F: FnMut() -> Result<C>,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        match connect() {
            Ok(conn) => {
                info!(target: "txroute::connect", attempt, "connection established");
                return Ok(conn);
            }
            Err(e) => {
                info!(target: "txroute::connect", attempt, error = %e, "connect attempt failed");
                if attempt < attempts {
                    thread::sleep(policy.delay);
                }
            }
        }
    }
    Err(Error::PingTimeout { attempts })
}

/// Open a connection described by `config` for `dialect`, with retry
///
/// `open` receives the resolved connection string plus pool and debug
/// settings and returns a driver connection.
pub fn establish<C, F>(
    config: &DataSourceConfig,
    dialect: &dyn Dialect,
    policy: &RetryPolicy,
    mut open: F,
) -> Result<C>
where
    C: Connection,
    F: FnMut(&ConnectOptions) -> Result<C>,
{
    let options = ConnectOptions {
        driver: dialect.name(),
        dsn: config.dsn(dialect),
        pool: config.pool.clone(),
        debug: config.debug,
    };
    info!(target: "txroute::connect", driver = options.driver, "opening connection");
    connect_with_retry(policy, || open(&options))
}
