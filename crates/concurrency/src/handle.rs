//! Transaction handle
//!
//! A `TransactionHandle` wraps one physical transaction together with its
//! classification and hook registry. It is created by the transaction
//! boundary (or the replica router), bound into a child context, and shared
//! with every nested call through that context.
//!
//! ## Lifecycle
//!
//! ```text
//! new() -> Active --take()--> Finished
//! ```
//!
//! `take()` hands the physical transaction back to the boundary for commit or
//! rollback. From then on `is_active()` is false, `with()` returns
//! `Error::TransactionClosed`, and hook registration is refused. A residual
//! `Arc` to a finished handle is harmless: there is nothing left to drive.

use crate::hooks::HookRegistry;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use txroute_core::{Classification, Connection, Error, Result};

/// One physical transaction plus its classification and hooks
pub struct TransactionHandle<C: Connection> {
    /// Identifier for logging
    id: u64,
    /// ReadWrite or ReadOnly
    classification: Classification,
    /// The physical transaction; `None` once finished
    tx: Mutex<Option<C::Tx>>,
    /// Set when `tx` has been taken
    ///
    /// Kept apart from the mutex so the liveness probe never waits on a
    /// caller that is inside `with()`.
    finished: AtomicBool,
    /// Commit/rollback callbacks
    hooks: HookRegistry<C>,
}

impl<C: Connection> TransactionHandle<C> {
    /// Wrap a freshly begun transaction
    pub fn new(id: u64, classification: Classification, tx: C::Tx) -> Self {
        Self {
            id,
            classification,
            tx: Mutex::new(Some(tx)),
            finished: AtomicBool::new(false),
            hooks: HookRegistry::new(),
        }
    }

    /// Handle identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// ReadWrite or ReadOnly
    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// True until the physical transaction has been committed or rolled back
    pub fn is_active(&self) -> bool {
        !self.finished.load(Ordering::Acquire)
    }

    /// Hook registry owned by this handle
    pub fn hooks(&self) -> &HookRegistry<C> {
        &self.hooks
    }

    /// Run `f` against the physical transaction
    ///
    /// The transaction is locked for the duration of `f`; do not call `with`
    /// on the same handle from inside `f`.
    ///
    /// # Errors
    /// `Error::TransactionClosed` if the transaction already finished.
    pub fn with<R>(&self, f: impl FnOnce(&mut C::Tx) -> R) -> Result<R> {
        let mut guard = self.tx.lock();
        match guard.as_mut() {
            Some(tx) => Ok(f(tx)),
            None => Err(Error::TransactionClosed),
        }
    }

    /// Take the physical transaction out, finishing the handle
    ///
    /// Returns `None` if it was already taken.
    pub fn take(&self) -> Option<C::Tx> {
        let tx = self.tx.lock().take();
        self.finished.store(true, Ordering::Release);
        tx
    }
}

impl<C: Connection> fmt::Debug for TransactionHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("id", &self.id)
            .field("classification", &self.classification)
            .field("active", &self.is_active())
            .field("hooks", &self.hooks)
            .finish()
    }
}
