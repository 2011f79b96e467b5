//! DataSource: the process-wide registry of connections
//!
//! A `DataSource` holds the default primary connection, the default replica
//! pool, default transaction options and the transaction coordinator. It is
//! built once at startup, shared behind an `Arc`, and torn down explicitly
//! with `shutdown()`.
//!
//! ## Entry Points
//!
//! Write path (see `transactions.rs`):
//! - `run`: always a new ReadWrite transaction on the primary
//! - `run_with`: join the ambient ReadWrite transaction, else `run`
//! - `run_with_options`: `run` with explicit begin options
//!
//! Read path (see `replicas.rs`):
//! - `run_replica`: always a new ReadOnly transaction on a replica
//! - `with_replica`: join the ambient ReadOnly transaction, else `run_replica`
//! - `read_with`: join ReadOnly, else join ReadWrite, else `run_replica`
//!
//! All of them take the caller's `Context`, so nothing is stored in
//! globals or thread-locals and independent call trees never interfere.

mod builder;
mod replicas;
mod transactions;

pub use builder::DataSourceBuilder;

use crate::coordinator::{TransactionCoordinator, TransactionMetrics};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use txroute_concurrency::{Context, ReplicaPool};
use txroute_core::{Connection, Error, Result, TxOptions};

/// Default connections, options and transaction bookkeeping
pub struct DataSource<C: Connection> {
    /// Primary used when the context pins none
    primary: Arc<C>,
    /// Replica pool used when the context pins none
    replicas: Option<Arc<ReplicaPool<C>>>,
    /// Options for transactions begun without explicit options
    default_options: TxOptions,
    /// Begins, finishes and counts transactions
    coordinator: TransactionCoordinator,
    /// Cleared by `shutdown()`
    accepting: AtomicBool,
}

impl<C: Connection> DataSource<C> {
    /// Start building a data source around `primary`
    pub fn builder(primary: impl Into<Arc<C>>) -> DataSourceBuilder<C> {
        DataSourceBuilder::new(primary.into())
    }

    /// Default primary connection
    pub fn primary(&self) -> &Arc<C> {
        &self.primary
    }

    /// Default replica pool, if configured
    pub fn replicas(&self) -> Option<&Arc<ReplicaPool<C>>> {
        self.replicas.as_ref()
    }

    /// Options used by `run` and `run_replica`
    pub fn default_options(&self) -> TxOptions {
        self.default_options
    }

    /// Primary connection for `ctx`: the pinned one, else the default
    pub fn connection(&self, ctx: &Context<C>) -> Arc<C> {
        ctx.primary().unwrap_or_else(|| Arc::clone(&self.primary))
    }

    /// Next replica connection for `ctx`
    ///
    /// A pool pinned into the context wins over the default pool.
    ///
    /// # Errors
    /// `Error::NoReplicaPool` when neither exists.
    pub fn replica(&self, ctx: &Context<C>) -> Result<Arc<C>> {
        let pool = ctx
            .replica_pool()
            .or_else(|| self.replicas.clone())
            .ok_or(Error::NoReplicaPool)?;
        Ok(Arc::clone(pool.next_connection()))
    }

    /// Transaction counters
    pub fn metrics(&self) -> TransactionMetrics {
        self.coordinator.metrics()
    }

    /// False once `shutdown()` has been called
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Stop accepting new transactions and close every connection
    ///
    /// Transactions already running finish normally; joining them still
    /// works. Close failures are logged and counted, never raised.
    ///
    /// Returns the number of connections that failed to close. A second
    /// call does nothing and returns 0.
    pub fn shutdown(&self) -> usize {
        if !self.accepting.swap(false, Ordering::SeqCst) {
            return 0;
        }
        let mut failures = self.replicas.as_ref().map_or(0, |pool| pool.close());
        if let Err(e) = self.primary.close() {
            failures += 1;
            warn!(target: "txroute::txn", error = %e, "primary close failed");
        }
        info!(target: "txroute::txn", failures, "data source shut down");
        failures
    }

    fn check_accepting(&self) -> Result<()> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

impl<C: Connection> fmt::Debug for DataSource<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("replicas", &self.replicas.as_ref().map(|p| p.len()))
            .field("default_options", &self.default_options)
            .field("accepting", &self.is_accepting())
            .field("metrics", &self.metrics())
            .finish()
    }
}
