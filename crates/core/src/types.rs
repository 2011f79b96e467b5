//! Core types shared by every layer
//!
//! - `Classification`: whether a transaction handle is read-write or read-only
//! - `ScopeKind`: which ambient slot of the context a handle lives in
//! - `IsolationLevel`: isolation requested when beginning a transaction
//! - `TxOptions`: everything a driver needs to begin a transaction

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Kind of transaction a handle represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Transaction on the primary that may write
    ReadWrite,
    /// Read-only transaction, usually on a replica
    ReadOnly,
}

impl Classification {
    /// The context slot handles of this classification are bound under
    pub fn scope(self) -> ScopeKind {
        match self {
            Classification::ReadWrite => ScopeKind::Write,
            Classification::ReadOnly => ScopeKind::ReadOnly,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::ReadWrite => write!(f, "read-write"),
            Classification::ReadOnly => write!(f, "read-only"),
        }
    }
}

/// Ambient scope slot in an execution context
///
/// Write and read-only scopes are tracked independently: a replica
/// transaction nested inside a write transaction does not hide it, and
/// vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Slot holding the ambient primary transaction
    Write,
    /// Slot holding the ambient replica transaction
    ReadOnly,
}

impl ScopeKind {
    /// Classification a live handle in this slot is expected to carry
    pub fn classification(self) -> Classification {
        match self {
            ScopeKind::Write => Classification::ReadWrite,
            ScopeKind::ReadOnly => Classification::ReadOnly,
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Write => write!(f, "write"),
            ScopeKind::ReadOnly => write!(f, "read-only"),
        }
    }
}

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// READ UNCOMMITTED
    ReadUncommitted,
    /// READ COMMITTED
    ReadCommitted,
    /// REPEATABLE READ
    RepeatableRead,
    /// SERIALIZABLE
    Serializable,
}

impl IsolationLevel {
    /// SQL spelling of the level, as used in `SET TRANSACTION ISOLATION LEVEL`
    pub fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options passed to a driver when beginning a transaction
///
/// The deadline is copied from the execution context; honoring it is the
/// driver's job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// Begin a read-only transaction
    pub read_only: bool,
    /// Requested isolation level (`None` = driver default)
    pub isolation: Option<IsolationLevel>,
    /// Point in time after which driver calls should give up
    pub deadline: Option<Instant>,
}

impl TxOptions {
    /// Options for a read-write transaction with driver defaults
    pub fn read_write() -> Self {
        Self::default()
    }

    /// Options for a read-only transaction with driver defaults
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Set the isolation level
    pub fn with_isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    /// Set the deadline, keeping the earlier one if already set
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = match (self.deadline, deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_classification_scope_roundtrip() {
        assert_eq!(Classification::ReadWrite.scope(), ScopeKind::Write);
        assert_eq!(Classification::ReadOnly.scope(), ScopeKind::ReadOnly);
        assert_eq!(ScopeKind::Write.classification(), Classification::ReadWrite);
        assert_eq!(ScopeKind::ReadOnly.classification(), Classification::ReadOnly);
    }

    #[test]
    fn test_tx_options_read_only() {
        let opts = TxOptions::read_only().with_isolation(IsolationLevel::Serializable);
        assert!(opts.read_only);
        assert_eq!(opts.isolation, Some(IsolationLevel::Serializable));
        assert_eq!(opts.deadline, None);
    }

    #[test]
    fn test_tx_options_deadline_keeps_earliest() {
        let now = Instant::now();
        let early = now + Duration::from_secs(1);
        let late = now + Duration::from_secs(10);

        let opts = TxOptions::read_write()
            .with_deadline(Some(late))
            .with_deadline(Some(early));
        assert_eq!(opts.deadline, Some(early));

        let opts = TxOptions::read_write()
            .with_deadline(Some(early))
            .with_deadline(None);
        assert_eq!(opts.deadline, Some(early));
    }

    #[test]
    fn test_isolation_level_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            isolation: IsolationLevel,
        }
        let w: Wrapper = toml::from_str("isolation = \"repeatable_read\"").unwrap();
        assert_eq!(w.isolation, IsolationLevel::RepeatableRead);
        assert_eq!(w.isolation.as_sql(), "REPEATABLE READ");
    }
}
