//! Deferred commit/rollback callbacks
//!
//! Every transaction handle owns a `HookRegistry`: two append-only lists of
//! callbacks that fire once the outcome of the transaction is known.
//!
//! - Hooks fire in registration order, at most once, never before the
//!   physical commit or rollback has returned.
//! - Commit and rollback lists are mutually exclusive per handle: the
//!   boundary drains exactly one of them.
//! - Hooks are notifications, not participants. A panicking hook is caught,
//!   logged, and the remaining hooks still fire.

use crate::context::Context;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;
use txroute_core::{panic_message, Connection, ScopeKind};

/// A deferred, context-aware callback
pub type Hook<C> = Box<dyn FnOnce(&Context<C>) + Send>;

/// Outcome of draining one hook list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookReport {
    /// Hooks that were called
    pub invoked: usize,
    /// Hooks that panicked while being called
    pub panicked: usize,
}

/// Commit and rollback hook lists for one transaction handle
pub struct HookRegistry<C: Connection> {
    commit: Mutex<Vec<Hook<C>>>,
    rollback: Mutex<Vec<Hook<C>>>,
}

impl<C: Connection> HookRegistry<C> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            commit: Mutex::new(Vec::new()),
            rollback: Mutex::new(Vec::new()),
        }
    }

    /// Append a commit hook
    pub fn add_commit(&self, hook: Hook<C>) {
        self.commit.lock().push(hook);
    }

    /// Append a rollback hook
    pub fn add_rollback(&self, hook: Hook<C>) {
        self.rollback.lock().push(hook);
    }

    /// Number of pending commit hooks
    pub fn commit_len(&self) -> usize {
        self.commit.lock().len()
    }

    /// Number of pending rollback hooks
    pub fn rollback_len(&self) -> usize {
        self.rollback.lock().len()
    }

    /// Fire commit hooks in order and discard rollback hooks
    pub fn invoke_commit(&self, ctx: &Context<C>) -> HookReport {
        self.rollback.lock().clear();
        let hooks = std::mem::take(&mut *self.commit.lock());
        invoke_all(hooks, ctx, "commit")
    }

    /// Fire rollback hooks in order and discard commit hooks
    pub fn invoke_rollback(&self, ctx: &Context<C>) -> HookReport {
        self.commit.lock().clear();
        let hooks = std::mem::take(&mut *self.rollback.lock());
        invoke_all(hooks, ctx, "rollback")
    }

    /// Drop every pending hook without calling it
    ///
    /// Used when commit itself fails: neither list applies.
    pub fn discard(&self) {
        self.commit.lock().clear();
        self.rollback.lock().clear();
    }
}

impl<C: Connection> Default for HookRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connection> std::fmt::Debug for HookRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("commit", &self.commit_len())
            .field("rollback", &self.rollback_len())
            .finish()
    }
}

// Lists are taken out of their mutex before invoking, so a hook that
// registers another hook on a finished handle cannot deadlock.
fn invoke_all<C: Connection>(hooks: Vec<Hook<C>>, ctx: &Context<C>, phase: &str) -> HookReport {
    let mut report = HookReport::default();
    for hook in hooks {
        report.invoked += 1;
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| hook(ctx))) {
            report.panicked += 1;
            error!(
                target: "txroute::txn",
                phase,
                message = %panic_message(payload.as_ref()),
                "transaction hook panicked"
            );
        }
    }
    report
}

// ============================================================================
// Registration through the ambient context
// ============================================================================

fn register<C, F>(ctx: &Context<C>, kind: ScopeKind, commit: bool, hook: F) -> bool
where
    C: Connection,
    F: FnOnce(&Context<C>) + Send + 'static,
{
    match ctx.active_handle(kind) {
        Some(handle) => {
            if commit {
                handle.hooks().add_commit(Box::new(hook));
            } else {
                handle.hooks().add_rollback(Box::new(hook));
            }
            true
        }
        None => false,
    }
}

/// Register a hook to run after the ambient write transaction commits
///
/// Returns `false` (and drops the hook) when `ctx` carries no live write
/// transaction.
pub fn register_commit<C, F>(ctx: &Context<C>, hook: F) -> bool
where
    C: Connection,
    F: FnOnce(&Context<C>) + Send + 'static,
{
    register(ctx, ScopeKind::Write, true, hook)
}

/// Register a hook to run after the ambient write transaction rolls back
///
/// Returns `false` (and drops the hook) when `ctx` carries no live write
/// transaction.
pub fn register_rollback<C, F>(ctx: &Context<C>, hook: F) -> bool
where
    C: Connection,
    F: FnOnce(&Context<C>) + Send + 'static,
{
    register(ctx, ScopeKind::Write, false, hook)
}

/// Register a hook to run after the ambient replica transaction commits
pub fn register_replica_commit<C, F>(ctx: &Context<C>, hook: F) -> bool
where
    C: Connection,
    F: FnOnce(&Context<C>) + Send + 'static,
{
    register(ctx, ScopeKind::ReadOnly, true, hook)
}

/// Register a hook to run after the ambient replica transaction rolls back
pub fn register_replica_rollback<C, F>(ctx: &Context<C>, hook: F) -> bool
where
    C: Connection,
    F: FnOnce(&Context<C>) + Send + 'static,
{
    register(ctx, ScopeKind::ReadOnly, false, hook)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::TransactionHandle;
    use crate::test_support::{NullConn, NullTx};
    use std::sync::Arc;
    use txroute_core::Classification;

    fn recording_hook(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Hook<NullConn> {
        let log = Arc::clone(log);
        Box::new(move |_ctx: &Context<NullConn>| log.lock().push(name))
    }

    #[test]
    fn test_commit_hooks_fire_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = HookRegistry::<NullConn>::new();
        registry.add_commit(recording_hook(&log, "a"));
        registry.add_commit(recording_hook(&log, "b"));
        registry.add_rollback(recording_hook(&log, "never"));

        let report = registry.invoke_commit(&Context::background());
        assert_eq!(report, HookReport { invoked: 2, panicked: 0 });
        assert_eq!(*log.lock(), vec!["a", "b"]);
        assert_eq!(registry.rollback_len(), 0);
    }

    #[test]
    fn test_hooks_fire_at_most_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = HookRegistry::<NullConn>::new();
        registry.add_rollback(recording_hook(&log, "r"));

        registry.invoke_rollback(&Context::background());
        let second = registry.invoke_rollback(&Context::background());
        assert_eq!(second.invoked, 0);
        assert_eq!(*log.lock(), vec!["r"]);
    }

    #[test]
    fn test_panicking_hook_does_not_stop_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = HookRegistry::<NullConn>::new();
        registry.add_rollback(recording_hook(&log, "first"));
        registry.add_rollback(Box::new(|_ctx: &Context<NullConn>| panic!("hook failure")));
        registry.add_rollback(recording_hook(&log, "third"));

        let report = registry.invoke_rollback(&Context::background());
        assert_eq!(report, HookReport { invoked: 3, panicked: 1 });
        assert_eq!(*log.lock(), vec!["first", "third"]);
    }

    #[test]
    fn test_register_without_scope_is_noop() {
        let ctx = Context::<NullConn>::background();
        assert!(!register_commit(&ctx, |_| {}));
        assert!(!register_rollback(&ctx, |_| {}));
        assert!(!register_replica_commit(&ctx, |_| {}));
        assert!(!register_replica_rollback(&ctx, |_| {}));
    }

    #[test]
    fn test_register_targets_matching_scope() {
        let write = Arc::new(TransactionHandle::<NullConn>::new(1, Classification::ReadWrite, NullTx));
        let read = Arc::new(TransactionHandle::<NullConn>::new(2, Classification::ReadOnly, NullTx));
        let ctx = Context::background()
            .with_scope(Arc::clone(&write))
            .with_scope(Arc::clone(&read));

        assert!(register_commit(&ctx, |_| {}));
        assert!(register_replica_rollback(&ctx, |_| {}));

        assert_eq!(write.hooks().commit_len(), 1);
        assert_eq!(write.hooks().rollback_len(), 0);
        assert_eq!(read.hooks().commit_len(), 0);
        assert_eq!(read.hooks().rollback_len(), 1);
    }

    #[test]
    fn test_register_on_finished_handle_is_noop() {
        let write = Arc::new(TransactionHandle::<NullConn>::new(1, Classification::ReadWrite, NullTx));
        let ctx = Context::background().with_scope(Arc::clone(&write));
        assert!(write.take().is_some());
        assert!(!register_commit(&ctx, |_| {}));
        assert_eq!(write.hooks().commit_len(), 0);
    }
}
