//! Transaction routing engine for txroute
//!
//! This crate ties the lower layers together:
//! - DataSource: default primary, default replica pool, entry points
//! - Transaction coordination: begin, commit/rollback, hooks, panics
//! - Connection establishment with retry
//! - Data source configuration (TOML or `DB_*` environment variables)
//!
//! The engine is the only component that begins or finishes transactions.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connect;
pub mod coordinator;
pub mod datasource;
pub mod testing;

pub use config::{DataSourceConfig, DataSourceEnv, PoolConfig};
pub use connect::{connect_with_retry, establish, ConnectOptions, RetryPolicy};
pub use coordinator::{TransactionCoordinator, TransactionMetrics};
pub use datasource::{DataSource, DataSourceBuilder};
