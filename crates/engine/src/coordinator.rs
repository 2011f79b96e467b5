//! Transaction coordinator: begin, run, finish
//!
//! Every new transaction, primary or replica, goes through
//! `TransactionCoordinator::execute`. It owns the outcome protocol:
//!
//! ```text
//! 1. clear the scope slot in the entry context (a finished handle is never reused)
//! 2. begin on the chosen connection          -> Err: acquisition failure, no hooks
//! 3. wrap in a TransactionHandle, bind into a child context
//! 4. run the unit of work, catching panics
//! 5a. Ok(value)  -> commit -> Ok: commit hooks,   return value
//!                          -> Err: no hooks,       return commit error
//! 5b. Err(e)     -> rollback, rollback hooks,      return e unchanged
//! 5c. panic      -> rollback, rollback hooks,      resume the original panic
//! ```
//!
//! Normal failures travel through `Result`; panics travel through the
//! unwind payload and are resumed untouched once cleanup is done.
//!
//! The coordinator also keeps transaction metrics.

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};
use txroute_concurrency::{Context, HookReport, TransactionHandle};
use txroute_core::{Classification, Connection, Error, Transaction, TxOptions};

/// Point-in-time copy of the coordinator's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionMetrics {
    /// Transactions begun (primary and replica)
    pub total_started: u64,
    /// Transactions committed
    pub total_committed: u64,
    /// Transactions rolled back (error or panic)
    pub total_rolled_back: u64,
    /// Commits that failed
    pub commit_failures: u64,
    /// Calls that joined an ambient transaction instead of beginning one
    pub total_reused: u64,
    /// Hooks that panicked
    pub hook_panics: u64,
    /// Transactions currently open
    pub active_count: u64,
}

/// Runs units of work inside new transactions and tracks metrics
///
/// The metric counters use Relaxed ordering: they are observational only
/// and synchronize nothing else.
#[derive(Debug, Default)]
pub struct TransactionCoordinator {
    next_txn_id: AtomicU64,
    active_count: AtomicU64,
    total_started: AtomicU64,
    total_committed: AtomicU64,
    total_rolled_back: AtomicU64,
    commit_failures: AtomicU64,
    total_reused: AtomicU64,
    hook_panics: AtomicU64,
}

impl TransactionCoordinator {
    /// Create a coordinator with zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the metrics
    pub fn metrics(&self) -> TransactionMetrics {
        TransactionMetrics {
            total_started: self.total_started.load(Ordering::Relaxed),
            total_committed: self.total_committed.load(Ordering::Relaxed),
            total_rolled_back: self.total_rolled_back.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            total_reused: self.total_reused.load(Ordering::Relaxed),
            hook_panics: self.hook_panics.load(Ordering::Relaxed),
            active_count: self.active_count.load(Ordering::Relaxed),
        }
    }

    /// Record that a call joined an ambient transaction
    pub fn record_reuse(&self) {
        self.total_reused.fetch_add(1, Ordering::Relaxed);
    }

    /// Run `work` inside a new transaction begun on `conn`
    ///
    /// # Arguments
    /// * `ctx` - Entry context
    /// * `conn` - Connection to begin on
    /// * `classification` - ReadWrite (primary) or ReadOnly (replica)
    /// * `options` - Begin options; the context deadline is merged in
    /// * `work` - Unit of work, given the child context and the new handle
    ///
    /// # Returns
    /// * `Ok(T)` - work succeeded and the commit went through
    /// * `Err(E)` - acquisition or commit failure converted via `From<Error>`,
    ///   or the work's own error, unchanged
    ///
    /// # Panics
    /// Resumes the panic of `work` after rolling back and running rollback hooks.
    pub fn execute<C, T, E, F>(
        &self,
        ctx: &Context<C>,
        conn: &C,
        classification: Classification,
        options: TxOptions,
        work: F,
    ) -> Result<T, E>
    where
        C: Connection,
        E: From<Error>,
        F: FnOnce(&Context<C>, &TransactionHandle<C>) -> Result<T, E>,
    {
        let kind = classification.scope();
        let parent = if ctx.scope(kind).is_none() {
            ctx.clone()
        } else {
            ctx.without_scope(kind)
        };

        let options = options.with_deadline(ctx.deadline());
        let tx = conn.begin(&options).map_err(E::from)?;

        let txn_id = self.next_txn_id.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = Arc::new(TransactionHandle::new(txn_id, classification, tx));
        self.active_count.fetch_add(1, Ordering::Relaxed);
        self.total_started.fetch_add(1, Ordering::Relaxed);
        debug!(target: "txroute::txn", txn_id, %classification, "transaction started");

        let child = parent.with_scope(Arc::clone(&handle));
        let outcome = catch_unwind(AssertUnwindSafe(|| work(&child, &handle)));
        drop(child);

        let result = match outcome {
            Ok(Ok(value)) => match self.commit(&handle, &parent) {
                Ok(()) => Ok(value),
                Err(e) => Err(E::from(e)),
            },
            Ok(Err(e)) => {
                self.rollback(&handle, &parent);
                Err(e)
            }
            Err(payload) => {
                let cause = Error::from_panic(payload.as_ref());
                error!(target: "txroute::txn", txn_id, error = %cause, "unit of work panicked, rolling back");
                self.rollback(&handle, &parent);
                self.active_count.fetch_sub(1, Ordering::Relaxed);
                resume_unwind(payload);
            }
        };
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        result
    }

    fn commit<C: Connection>(&self, handle: &TransactionHandle<C>, ctx: &Context<C>) -> Result<(), Error> {
        let committed = match handle.take() {
            Some(tx) => tx.commit(),
            None => Err(Error::TransactionClosed),
        };
        match committed {
            Ok(()) => {
                self.total_committed.fetch_add(1, Ordering::Relaxed);
                debug!(target: "txroute::txn", txn_id = handle.id(), "transaction committed");
                let report = handle.hooks().invoke_commit(ctx);
                self.record_hooks(report);
                Ok(())
            }
            Err(e) => {
                self.commit_failures.fetch_add(1, Ordering::Relaxed);
                warn!(target: "txroute::txn", txn_id = handle.id(), error = %e, "commit failed");
                handle.hooks().discard();
                Err(e)
            }
        }
    }

    // Rollback failures are logged; the caller's original failure wins.
    fn rollback<C: Connection>(&self, handle: &TransactionHandle<C>, ctx: &Context<C>) {
        if let Some(tx) = handle.take() {
            if let Err(e) = tx.rollback() {
                warn!(target: "txroute::txn", txn_id = handle.id(), error = %e, "rollback failed");
            }
        }
        self.total_rolled_back.fetch_add(1, Ordering::Relaxed);
        debug!(target: "txroute::txn", txn_id = handle.id(), "transaction rolled back");
        let report = handle.hooks().invoke_rollback(ctx);
        self.record_hooks(report);
    }

    fn record_hooks(&self, report: HookReport) {
        if report.panicked > 0 {
            self.hook_panics
                .fetch_add(report.panicked as u64, Ordering::Relaxed);
        }
    }
}
