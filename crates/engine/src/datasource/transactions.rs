//! Write path: the transaction boundary
//!
//! Units of work have the shape
//! `FnOnce(&Context<C>, &TransactionHandle<C>) -> Result<T, E>`. The context
//! they receive carries the handle, so nested calls that go through
//! `run_with` join the same physical transaction.

use super::DataSource;
use std::sync::Arc;
use tracing::debug;
use txroute_concurrency::{Context, TransactionHandle};
use txroute_core::{Classification, Connection, Error, ScopeKind, TxOptions};

impl<C: Connection> DataSource<C> {
    /// Run `work` in a new ReadWrite transaction on the primary
    ///
    /// The primary is the one pinned into `ctx`, else the default. An
    /// ambient write scope in `ctx` is ignored: this always begins.
    ///
    /// # Errors
    /// - `Error::Closed` after `shutdown()`
    /// - begin and commit failures, converted through `E: From<Error>`
    /// - the error returned by `work`, unchanged, after rollback
    ///
    /// # Panics
    /// Re-raises a panic from `work` after rollback and rollback hooks.
    pub fn run<T, E, F>(&self, ctx: &Context<C>, work: F) -> Result<T, E>
    where
        E: From<Error>,
        F: FnOnce(&Context<C>, &TransactionHandle<C>) -> Result<T, E>,
    {
        self.run_with_options(ctx, self.default_options, work)
    }

    /// `run` with explicit begin options
    ///
    /// `options.read_only` is forced to false; use the replica path for
    /// read-only work.
    pub fn run_with_options<T, E, F>(&self, ctx: &Context<C>, options: TxOptions, work: F) -> Result<T, E>
    where
        E: From<Error>,
        F: FnOnce(&Context<C>, &TransactionHandle<C>) -> Result<T, E>,
    {
        self.check_accepting()?;
        let conn = self.connection(ctx);
        let options = TxOptions {
            read_only: false,
            ..options
        };
        self.coordinator
            .execute(ctx, conn.as_ref(), Classification::ReadWrite, options, work)
    }

    /// Join the ambient ReadWrite transaction, or `run` a new one
    ///
    /// When `ctx` carries an active write-scope handle, `work` runs directly
    /// against it: nothing is begun or committed here, and errors or panics
    /// travel up to the boundary that owns the handle.
    pub fn run_with<T, E, F>(&self, ctx: &Context<C>, work: F) -> Result<T, E>
    where
        E: From<Error>,
        F: FnOnce(&Context<C>, &TransactionHandle<C>) -> Result<T, E>,
    {
        match ctx.active_handle(ScopeKind::Write) {
            Some(handle) => self.join(ctx, handle, work),
            None => self.run(ctx, work),
        }
    }

    pub(super) fn join<T, E, F>(&self, ctx: &Context<C>, handle: Arc<TransactionHandle<C>>, work: F) -> Result<T, E>
    where
        F: FnOnce(&Context<C>, &TransactionHandle<C>) -> Result<T, E>,
    {
        self.coordinator.record_reuse();
        debug!(
            target: "txroute::txn",
            txn_id = handle.id(),
            classification = %handle.classification(),
            "joining ambient transaction"
        );
        work(ctx, handle.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use crate::datasource::DataSource;
    use crate::testing::{MockConn, Op};
    use std::sync::Arc;
    use txroute_concurrency::{register_commit, Context};
    use txroute_core::{Error, IsolationLevel, ScopeKind, TxOptions};

    fn source() -> (MockConn, DataSource<MockConn>) {
        let primary = MockConn::new("primary");
        let ds = DataSource::builder(primary.clone()).build();
        (primary, ds)
    }

    #[test]
    fn test_run_commits_and_returns_value() {
        let (primary, ds) = source();
        let value = ds
            .run::<_, Error, _>(&Context::background(), |_, handle| {
                handle.with(|tx| tx.execute("INSERT INTO t VALUES (1)"))?;
                Ok("done")
            })
            .unwrap();
        assert_eq!(value, "done");
        assert_eq!(
            primary.ops(),
            vec![Op::Begin, Op::Exec("INSERT INTO t VALUES (1)".into()), Op::Commit]
        );
        assert!(!primary.last_options().unwrap().read_only);
    }

    #[test]
    fn test_run_always_begins_even_inside_scope() {
        let (primary, ds) = source();
        ds.run::<_, Error, _>(&Context::background(), |ctx, _| {
            ds.run::<_, Error, _>(ctx, |_, _| Ok(()))
        })
        .unwrap();
        assert_eq!(primary.begins(), 2);
        assert_eq!(primary.commits(), 2);
    }

    #[test]
    fn test_run_with_joins_ambient_transaction() {
        let (primary, ds) = source();
        ds.run::<_, Error, _>(&Context::background(), |ctx, outer| {
            ds.run_with::<_, Error, _>(ctx, |_, inner| {
                assert_eq!(inner.id(), outer.id());
                Ok(())
            })
        })
        .unwrap();
        assert_eq!(primary.begins(), 1);
        assert_eq!(primary.commits(), 1);
        assert_eq!(ds.metrics().total_reused, 1);
    }

    #[test]
    fn test_run_with_without_scope_begins() {
        let (primary, ds) = source();
        ds.run_with::<_, Error, _>(&Context::background(), |_, _| Ok(()))
            .unwrap();
        assert_eq!(primary.begins(), 1);
        assert_eq!(ds.metrics().total_reused, 0);
    }

    #[test]
    fn test_run_with_ignores_finished_handle() {
        let (primary, ds) = source();
        let mut leaked = None;
        ds.run::<_, Error, _>(&Context::background(), |ctx, _| {
            leaked = Some(ctx.clone());
            Ok(())
        })
        .unwrap();

        let stale = leaked.unwrap();
        assert!(stale.active_handle(ScopeKind::Write).is_none());
        ds.run_with::<_, Error, _>(&stale, |ctx, handle| {
            assert!(handle.is_active());
            assert_eq!(ctx.active_handle(ScopeKind::Write).unwrap().id(), handle.id());
            Ok(())
        })
        .unwrap();
        assert_eq!(primary.begins(), 2);
    }

    #[test]
    fn test_nested_error_rolls_back_outer_transaction() {
        let (primary, ds) = source();
        let result = ds.run::<(), Error, _>(&Context::background(), |ctx, _| {
            ds.run_with(ctx, |_, _| Err(Error::InvalidConfig("nested".into())))
        });
        assert!(result.is_err());
        assert_eq!(primary.ops(), vec![Op::Begin, Op::Rollback]);
    }

    #[test]
    fn test_pinned_primary_used() {
        let (default, ds) = source();
        let pinned = MockConn::new("pinned");
        let ctx = Context::background().with_primary(Arc::new(pinned.clone()));
        ds.run::<_, Error, _>(&ctx, |_, handle| {
            handle.with(|tx| assert_eq!(tx.connection_name(), "pinned"))?;
            Ok(())
        })
        .unwrap();
        assert_eq!(pinned.begins(), 1);
        assert_eq!(default.begins(), 0);
    }

    #[test]
    fn test_run_with_options_forwards_isolation() {
        let (primary, ds) = source();
        let opts = TxOptions::read_only().with_isolation(IsolationLevel::Serializable);
        ds.run_with_options::<_, Error, _>(&Context::background(), opts, |_, _| Ok(()))
            .unwrap();
        let seen = primary.last_options().unwrap();
        assert_eq!(seen.isolation, Some(IsolationLevel::Serializable));
        assert!(!seen.read_only);
    }

    #[test]
    fn test_closed_source_refuses_new_transactions() {
        let (primary, ds) = source();
        ds.shutdown();
        let err = ds
            .run::<(), Error, _>(&Context::background(), |_, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, Error::Closed));
        assert_eq!(primary.begins(), 0);
    }

    #[test]
    fn test_hook_registered_in_joined_scope_fires_on_outer_commit() {
        let (_primary, ds) = source();
        let fired = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let f1 = Arc::clone(&fired);
        let f2 = Arc::clone(&fired);
        ds.run::<_, Error, _>(&Context::background(), |ctx, _| {
            register_commit(ctx, move |_| f1.lock().push("outer"));
            ds.run_with::<_, Error, _>(ctx, move |inner, _| {
                assert!(register_commit(inner, move |_| f2.lock().push("inner")));
                Ok(())
            })
        })
        .unwrap();
        assert_eq!(*fired.lock(), vec!["outer", "inner"]);
    }
}
