//! Execution context
//!
//! An immutable, chainable carrier of ambient values passed explicitly down a
//! call chain. It replaces thread-locals and globals: two call trees that share
//! a root but diverge into different nested scopes each see only their own
//! bindings.
//!
//! ## Structure
//!
//! ```text
//! background ── primary(p) ── scope(Write: tx#1) ── value("tenant") ── scope(Write: None)
//!                                     ▲                                      ▲
//!                            lookups walk this way ◄───────────────── head of child
//! ```
//!
//! Every `with_*` call returns a new context whose head node points at the
//! parent. Nothing is ever mutated in place; a child binding shadows its
//! ancestors for that subtree only. Clearing a scope pushes an explicit
//! `ScopeBinding::None` marker.

use crate::handle::TransactionHandle;
use crate::replica::ReplicaPool;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use txroute_core::{Classification, Connection, ScopeKind};

// ============================================================================
// Scope Binding
// ============================================================================

/// What a scope slot of the context holds
pub enum ScopeBinding<C: Connection> {
    /// No transaction (never bound, or explicitly cleared)
    None,
    /// A primary transaction
    ReadWrite(Arc<TransactionHandle<C>>),
    /// A replica transaction
    ReadOnly(Arc<TransactionHandle<C>>),
}

impl<C: Connection> ScopeBinding<C> {
    /// Wrap a handle according to its classification
    pub fn from_handle(handle: Arc<TransactionHandle<C>>) -> Self {
        match handle.classification() {
            Classification::ReadWrite => ScopeBinding::ReadWrite(handle),
            Classification::ReadOnly => ScopeBinding::ReadOnly(handle),
        }
    }

    /// The bound handle, if any
    pub fn handle(&self) -> Option<&Arc<TransactionHandle<C>>> {
        match self {
            ScopeBinding::None => None,
            ScopeBinding::ReadWrite(h) | ScopeBinding::ReadOnly(h) => Some(h),
        }
    }

    /// Classification of the bound handle, if any
    pub fn classification(&self) -> Option<Classification> {
        match self {
            ScopeBinding::None => None,
            ScopeBinding::ReadWrite(_) => Some(Classification::ReadWrite),
            ScopeBinding::ReadOnly(_) => Some(Classification::ReadOnly),
        }
    }

    /// True if a handle is bound and its transaction has not finished
    pub fn is_active(&self) -> bool {
        self.handle().map_or(false, |h| h.is_active())
    }

    /// True for the `None` variant
    pub fn is_none(&self) -> bool {
        matches!(self, ScopeBinding::None)
    }
}

impl<C: Connection> Clone for ScopeBinding<C> {
    fn clone(&self) -> Self {
        match self {
            ScopeBinding::None => ScopeBinding::None,
            ScopeBinding::ReadWrite(h) => ScopeBinding::ReadWrite(Arc::clone(h)),
            ScopeBinding::ReadOnly(h) => ScopeBinding::ReadOnly(Arc::clone(h)),
        }
    }
}

impl<C: Connection> fmt::Debug for ScopeBinding<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeBinding::None => write!(f, "None"),
            ScopeBinding::ReadWrite(h) => f.debug_tuple("ReadWrite").field(&h.id()).finish(),
            ScopeBinding::ReadOnly(h) => f.debug_tuple("ReadOnly").field(&h.id()).finish(),
        }
    }
}

// ============================================================================
// Context
// ============================================================================

enum Binding<C: Connection> {
    Scope(ScopeKind, ScopeBinding<C>),
    Primary(Arc<C>),
    ReplicaPool(Arc<ReplicaPool<C>>),
    Deadline(Instant),
    Value(&'static str, Arc<dyn Any + Send + Sync>),
}

struct Node<C: Connection> {
    binding: Binding<C>,
    parent: Option<Arc<Node<C>>>,
}

/// Immutable chain of ambient bindings
///
/// Cloning is an `Arc` bump. Contexts are `Send + Sync` and may be handed to
/// other threads, but a transaction handle found in one must only be driven
/// by the call tree that owns it.
pub struct Context<C: Connection> {
    head: Option<Arc<Node<C>>>,
}

impl<C: Connection> Context<C> {
    /// Empty root context
    pub fn background() -> Self {
        Self { head: None }
    }

    fn child(&self, binding: Binding<C>) -> Self {
        Self {
            head: Some(Arc::new(Node {
                binding,
                parent: self.head.clone(),
            })),
        }
    }

    fn bindings(&self) -> impl Iterator<Item = &Binding<C>> {
        let mut cur = self.head.as_deref();
        std::iter::from_fn(move || {
            let node = cur?;
            cur = node.parent.as_deref();
            Some(&node.binding)
        })
    }

    /// Number of bindings in the chain
    pub fn depth(&self) -> usize {
        self.bindings().count()
    }

    // ------------------------------------------------------------------------
    // Transaction scopes
    // ------------------------------------------------------------------------

    /// Child context with `handle` bound in the slot matching its classification
    pub fn with_scope(&self, handle: Arc<TransactionHandle<C>>) -> Self {
        let kind = handle.classification().scope();
        self.child(Binding::Scope(kind, ScopeBinding::from_handle(handle)))
    }

    /// Child context in which the `kind` slot is explicitly empty
    pub fn without_scope(&self, kind: ScopeKind) -> Self {
        self.child(Binding::Scope(kind, ScopeBinding::None))
    }

    /// Nearest binding for the `kind` slot
    pub fn scope(&self, kind: ScopeKind) -> ScopeBinding<C> {
        self.bindings()
            .find_map(|b| match b {
                Binding::Scope(k, s) if *k == kind => Some(s.clone()),
                _ => None,
            })
            .unwrap_or(ScopeBinding::None)
    }

    /// Handle in the `kind` slot, if it is live and correctly classified
    ///
    /// Finished handles are ignored, so a context that outlived its
    /// transaction never leads to reuse of a dead one.
    pub fn active_handle(&self, kind: ScopeKind) -> Option<Arc<TransactionHandle<C>>> {
        match self.scope(kind) {
            ScopeBinding::ReadWrite(h) if kind == ScopeKind::Write && h.is_active() => Some(h),
            ScopeBinding::ReadOnly(h) if kind == ScopeKind::ReadOnly && h.is_active() => Some(h),
            _ => None,
        }
    }

    // ------------------------------------------------------------------------
    // Connection overrides
    // ------------------------------------------------------------------------

    /// Child context pinning a primary connection for new write transactions
    pub fn with_primary(&self, conn: Arc<C>) -> Self {
        self.child(Binding::Primary(conn))
    }

    /// Pinned primary connection, if any
    pub fn primary(&self) -> Option<Arc<C>> {
        self.bindings().find_map(|b| match b {
            Binding::Primary(c) => Some(Arc::clone(c)),
            _ => None,
        })
    }

    /// Child context pinning a replica pool for new replica transactions
    pub fn with_replica_pool(&self, pool: Arc<ReplicaPool<C>>) -> Self {
        self.child(Binding::ReplicaPool(pool))
    }

    /// Pinned replica pool, if any
    pub fn replica_pool(&self) -> Option<Arc<ReplicaPool<C>>> {
        self.bindings().find_map(|b| match b {
            Binding::ReplicaPool(p) => Some(Arc::clone(p)),
            _ => None,
        })
    }

    // ------------------------------------------------------------------------
    // Deadlines
    // ------------------------------------------------------------------------

    /// Child context with a deadline; an earlier inherited deadline wins
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let effective = match self.deadline() {
            Some(existing) => existing.min(deadline),
            None => deadline,
        };
        self.child(Binding::Deadline(effective))
    }

    /// Child context with a deadline `timeout` from now
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Effective deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.bindings().find_map(|b| match b {
            Binding::Deadline(d) => Some(*d),
            _ => None,
        })
    }

    /// True if the deadline has passed
    pub fn is_expired(&self) -> bool {
        self.deadline().map_or(false, |d| Instant::now() >= d)
    }

    // ------------------------------------------------------------------------
    // Application values
    // ------------------------------------------------------------------------

    /// Child context carrying an application value under `key`
    pub fn with_value<T: Any + Send + Sync>(&self, key: &'static str, value: T) -> Self {
        self.child(Binding::Value(key, Arc::new(value)))
    }

    /// Nearest value bound under `key`, if it has type `T`
    pub fn value<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.bindings().find_map(|b| match b {
            Binding::Value(k, v) if *k == key => Some(v.downcast_ref::<T>()),
            _ => None,
        })?
    }
}

impl<C: Connection> Clone for Context<C> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
        }
    }
}

impl<C: Connection> Default for Context<C> {
    fn default() -> Self {
        Self::background()
    }
}

impl<C: Connection> fmt::Debug for Context<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("depth", &self.depth())
            .field("write", &self.scope(ScopeKind::Write))
            .field("read_only", &self.scope(ScopeKind::ReadOnly))
            .field("deadline", &self.deadline())
            .finish()
    }
}

// Long chains would otherwise drop recursively.
impl<C: Connection> Drop for Context<C> {
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.parent.take(),
                Err(_) => break,
            }
        }
    }
}
