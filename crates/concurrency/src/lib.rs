//! Concurrency layer for txroute
//!
//! This crate holds the shared-state building blocks of the routing layer:
//! - Context: immutable ambient bindings passed down a call chain
//! - TransactionHandle: one physical transaction, its classification and hooks
//! - HookRegistry: ordered commit/rollback callbacks
//! - CyclicSelector: lock-light round-robin index generator
//! - ReplicaPool: immutable replica list with a selector
//!
//! Nothing here begins or finishes transactions; that is the engine's job.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod handle;
pub mod hooks;
pub mod replica;
pub mod selector;

#[cfg(test)]
mod test_support;

pub use context::{Context, ScopeBinding};
pub use handle::TransactionHandle;
pub use hooks::{
    register_commit, register_replica_commit, register_replica_rollback, register_rollback, Hook,
    HookRegistry, HookReport,
};
pub use replica::ReplicaPool;
pub use selector::CyclicSelector;
