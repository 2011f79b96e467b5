//! Driver trait definitions
//!
//! These traits are the seam between the routing layer and a concrete
//! database access library. The layer never issues SQL itself; it only
//! begins, commits and rolls back.
//!
//! ## Ownership
//!
//! `Transaction::commit` and `Transaction::rollback` consume the
//! transaction. Once either has been called the value is gone, which is what
//! makes a finished transaction impossible to drive again.

use crate::error::Result;
use crate::types::TxOptions;

/// An established connection (or driver-side pool) capable of beginning
/// transactions
///
/// Implementations must be safe to share: the primary connection and every
/// replica pool member are used by arbitrarily many concurrent callers.
pub trait Connection: Send + Sync + 'static {
    /// Transaction type produced by `begin`
    type Tx: Transaction;

    /// Begin a physical transaction
    ///
    /// Blocking. Called once per new transaction handle; never retried by
    /// the routing layer.
    fn begin(&self, options: &TxOptions) -> Result<Self::Tx>;

    /// Release the underlying resources
    ///
    /// Default implementation does nothing.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A physical, connection-scoped transaction
pub trait Transaction: Send + 'static {
    /// Commit the transaction
    fn commit(self) -> Result<()>;

    /// Roll back the transaction
    fn rollback(self) -> Result<()>;
}
