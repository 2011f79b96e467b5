//! Fluent construction of a `DataSource`

use super::DataSource;
use crate::coordinator::TransactionCoordinator;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use txroute_concurrency::ReplicaPool;
use txroute_core::{Connection, IsolationLevel, TxOptions};

// ============================================================================
// DataSource Builder Pattern
// ============================================================================

/// Builder for `DataSource`
///
/// ```ignore
/// let pool = ReplicaPool::new(replica_configs.iter().map(|cfg| {
///     move || establish(cfg, &MySqlBuilder::recommended(), &RetryPolicy::default(), open)
/// }))?;
/// let ds = DataSource::builder(primary)
///     .replicas(pool)
///     .isolation(IsolationLevel::ReadCommitted)
///     .build();
/// ```
#[derive(Debug)]
pub struct DataSourceBuilder<C: Connection> {
    primary: Arc<C>,
    replicas: Option<Arc<ReplicaPool<C>>>,
    default_options: TxOptions,
}

impl<C: Connection> DataSourceBuilder<C> {
    pub(super) fn new(primary: Arc<C>) -> Self {
        Self {
            primary,
            replicas: None,
            default_options: TxOptions::read_write(),
        }
    }

    /// Set the default replica pool
    pub fn replicas(mut self, pool: impl Into<Arc<ReplicaPool<C>>>) -> Self {
        self.replicas = Some(pool.into());
        self
    }

    /// Set the default begin options
    ///
    /// `read_only` is ignored: the entry point decides it.
    pub fn default_options(mut self, options: TxOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Shorthand for a default isolation level
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.default_options = self.default_options.with_isolation(level);
        self
    }

    /// Finish building
    pub fn build(self) -> DataSource<C> {
        DataSource {
            primary: self.primary,
            replicas: self.replicas,
            default_options: TxOptions {
                read_only: false,
                ..self.default_options
            },
            coordinator: TransactionCoordinator::new(),
            accepting: AtomicBool::new(true),
        }
    }
}
