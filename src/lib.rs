//! txroute - ambient transactions and read-replica routing
//!
//! Nested calls share one physical transaction, reads spread across replica
//! connections while writes stay on the primary, and side effects can be
//! deferred until the transaction outcome is known.
//!
//! # Quick Start
//!
//! ```ignore
//! use txroute::{register_commit, Context, DataSource, Error, ReplicaPool};
//!
//! let ds = DataSource::builder(primary).replicas(ReplicaPool::new(connectors)?).build();
//! let ctx = Context::background();
//!
//! ds.run::<_, Error, _>(&ctx, |ctx, tx| {
//!     tx.with(|tx| tx.execute("INSERT INTO orders ..."))??;
//!     register_commit(ctx, |_| notify_shipping());
//!     // joins the transaction above instead of opening a new one
//!     ds.run_with::<_, Error, _>(ctx, |_, tx| { /* ... */ Ok(()) })
//! })?;
//!
//! let count = ds.with_replica::<_, Error, _>(&ctx, |_, tx| { /* ... */ Ok(0) })?;
//! ```
//!
//! # Architecture
//!
//! - `txroute-core`: errors, driver traits, transaction options
//! - `txroute-concurrency`: context, handles, hooks, replica pool, selector
//! - `txroute-engine`: `DataSource` entry points, coordinator, config, retry
//! - `txroute-dialects`: connection-string builders
//!
//! The `sqlite` feature adds a `rusqlite`-backed driver.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use txroute_concurrency::{
    register_commit, register_replica_commit, register_replica_rollback, register_rollback,
    Context, CyclicSelector, Hook, ReplicaPool, ScopeBinding, TransactionHandle,
};
pub use txroute_core::{
    Classification, Connection, Error, IsolationLevel, Result, ScopeKind, Transaction, TxOptions,
};
pub use txroute_engine::{
    connect_with_retry, establish, ConnectOptions, DataSource, DataSourceBuilder,
    DataSourceConfig, DataSourceEnv, PoolConfig, RetryPolicy, TransactionMetrics,
};

/// Connection-string builders
pub mod dialects {
    pub use txroute_dialects::*;
}

/// Recording in-memory driver for tests
pub mod testing {
    pub use txroute_engine::testing::*;
}

#[cfg(feature = "sqlite")]
pub mod sqlite;
