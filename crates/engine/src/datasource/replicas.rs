//! Read path: the replica router
//!
//! Mirrors the write path with ReadOnly transactions on replica
//! connections. The replica is chosen once per top-level replica
//! transaction, so every read nested inside one `with_replica` call sees the
//! same replica. Reads outside any replica scope rotate independently.
//!
//! Replica scopes live in their own context slot, so a replica transaction
//! nested inside a write transaction (or the other way around) keeps its
//! own hooks.

use super::DataSource;
use std::sync::Arc;
use tracing::debug;
use txroute_concurrency::{Context, ReplicaPool, TransactionHandle};
use txroute_core::{Classification, Connection, Error, Result, ScopeKind, TxOptions};

impl<C: Connection> DataSource<C> {
    /// Run `work` in a new ReadOnly transaction on the next replica
    ///
    /// The replica comes from the pool pinned into `ctx`, else the default
    /// pool. An ambient replica scope is ignored: this always begins.
    ///
    /// # Errors
    /// - `Error::Closed` after `shutdown()`
    /// - `Error::NoReplicaPool` when no pool is pinned or configured
    /// - begin and commit failures, converted through `E: From<Error>`
    /// - the error returned by `work`, unchanged, after rollback
    ///
    /// # Panics
    /// Re-raises a panic from `work` after rollback and rollback hooks.
    pub fn run_replica<T, E, F>(&self, ctx: &Context<C>, work: F) -> std::result::Result<T, E>
    where
        E: From<Error>,
        F: FnOnce(&Context<C>, &TransactionHandle<C>) -> std::result::Result<T, E>,
    {
        self.check_accepting()?;
        let conn = self.replica(ctx)?;
        debug!(target: "txroute::replica", pinned = ctx.replica_pool().is_some(), "replica selected");
        let options = TxOptions {
            read_only: true,
            ..self.default_options
        };
        self.coordinator
            .execute(ctx, conn.as_ref(), Classification::ReadOnly, options, work)
    }

    /// Join the ambient ReadOnly transaction, or `run_replica` a new one
    pub fn with_replica<T, E, F>(&self, ctx: &Context<C>, work: F) -> std::result::Result<T, E>
    where
        E: From<Error>,
        F: FnOnce(&Context<C>, &TransactionHandle<C>) -> std::result::Result<T, E>,
    {
        match ctx.active_handle(ScopeKind::ReadOnly) {
            Some(handle) => self.join(ctx, handle, work),
            None => self.run_replica(ctx, work),
        }
    }

    /// Run read-only `work` wherever it is cheapest and most consistent
    ///
    /// 1. an active replica scope in `ctx` is joined
    /// 2. else an active write scope is joined, so the reads observe the
    ///    surrounding transaction's own uncommitted writes
    /// 3. else a new replica transaction is run
    pub fn read_with<T, E, F>(&self, ctx: &Context<C>, work: F) -> std::result::Result<T, E>
    where
        E: From<Error>,
        F: FnOnce(&Context<C>, &TransactionHandle<C>) -> std::result::Result<T, E>,
    {
        let ambient = ctx
            .active_handle(ScopeKind::ReadOnly)
            .or_else(|| ctx.active_handle(ScopeKind::Write));
        match ambient {
            Some(handle) => self.join(ctx, handle, work),
            None => self.run_replica(ctx, work),
        }
    }

    /// Derive a context pinned to a single replica
    ///
    /// The replica is picked now, by the usual rotation. Every replica
    /// transaction started from the returned context (and its children)
    /// lands on that replica, which gives sticky-session reads.
    ///
    /// # Errors
    /// `Error::NoReplicaPool` when no pool is pinned or configured.
    pub fn pin_replica(&self, ctx: &Context<C>) -> Result<Context<C>> {
        let conn = self.replica(ctx)?;
        let pool = ReplicaPool::from_connections(vec![conn])?;
        Ok(ctx.with_replica_pool(Arc::new(pool)))
    }
}
