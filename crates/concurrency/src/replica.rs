//! Replica pool
//!
//! An ordered, immutable list of established replica connections with a
//! `CyclicSelector` scoped to it. Constructed once at startup; after that the
//! only mutable state is the selector's counter, so a pool can be shared by
//! any number of concurrent callers behind an `Arc`.

use crate::selector::CyclicSelector;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{info, warn};
use txroute_core::{Connection, Error, Result};

/// Round-robin pool of read replica connections
pub struct ReplicaPool<C: Connection> {
    connections: Vec<Arc<C>>,
    selector: CyclicSelector,
}

impl<C: Connection> ReplicaPool<C> {
    /// Build a pool by running every connector in order
    ///
    /// Each connector must succeed; the first failure aborts construction
    /// and is returned as-is. Connections already established are closed
    /// before returning.
    ///
    /// # Errors
    /// - `Error::EmptyReplicaPool` when no connectors are given
    /// - the first connector error otherwise
    pub fn new<I, F>(connectors: I) -> Result<Self>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Result<C>,
    {
        let mut connections = Vec::new();
        for (i, connect) in connectors.into_iter().enumerate() {
            match connect() {
                Ok(conn) => connections.push(Arc::new(conn)),
                Err(e) => {
                    warn!(target: "txroute::replica", replica = i, error = %e, "replica connect failed");
                    close_all(&connections);
                    return Err(e);
                }
            }
        }
        let pool = Self::from_connections(connections)?;
        info!(target: "txroute::replica", replicas = pool.len(), "replica pool ready");
        Ok(pool)
    }

    /// Build a pool from connections that are already established
    ///
    /// # Errors
    /// `Error::EmptyReplicaPool` when `connections` is empty.
    pub fn from_connections(connections: Vec<Arc<C>>) -> Result<Self> {
        let capacity = NonZeroUsize::new(connections.len()).ok_or(Error::EmptyReplicaPool)?;
        Ok(Self {
            connections,
            selector: CyclicSelector::new(capacity),
        })
    }

    /// Connection picked by the next round-robin turn
    pub fn next_connection(&self) -> &Arc<C> {
        &self.connections[self.selector.next()]
    }

    /// Connection at a fixed position
    pub fn get(&self, index: usize) -> Option<&Arc<C>> {
        self.connections.get(index)
    }

    /// Number of replicas
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Always false: construction rejects empty pools
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Iterate over the replicas in pool order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<C>> {
        self.connections.iter()
    }

    /// Close every replica, logging failures
    ///
    /// Returns the number of connections that failed to close.
    pub fn close(&self) -> usize {
        close_all(&self.connections)
    }
}

fn close_all<C: Connection>(connections: &[Arc<C>]) -> usize {
    let mut failures = 0;
    for (i, conn) in connections.iter().enumerate() {
        if let Err(e) = conn.close() {
            failures += 1;
            warn!(target: "txroute::replica", replica = i, error = %e, "replica close failed");
        }
    }
    failures
}

impl<C: Connection> fmt::Debug for ReplicaPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaPool")
            .field("replicas", &self.connections.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::NullConn;

    fn ok(id: usize) -> impl FnOnce() -> Result<NullConn> {
        move || Ok(NullConn::new(id))
    }

    #[test]
    fn test_pool_cycles_in_order() {
        let pool = ReplicaPool::new(vec![ok(0), ok(1), ok(2)]).unwrap();
        let ids: Vec<usize> = (0..6).map(|_| pool.next_connection().id).collect();
        assert_eq!(ids, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_single_replica_pool() {
        let pool = ReplicaPool::new(vec![ok(9)]).unwrap();
        for _ in 0..10 {
            assert_eq!(pool.next_connection().id, 9);
        }
    }

    #[test]
    fn test_empty_pool_rejected() {
        let connectors: Vec<fn() -> Result<NullConn>> = Vec::new();
        let err = ReplicaPool::new(connectors).err().unwrap();
        assert!(matches!(err, Error::EmptyReplicaPool));
    }

    #[test]
    fn test_failing_connector_fails_pool() {
        let connectors: Vec<Box<dyn FnOnce() -> Result<NullConn>>> = vec![
            Box::new(ok(0)),
            Box::new(|| Err(Error::Connect("replica-1 down".into()))),
            Box::new(ok(2)),
        ];
        let err = ReplicaPool::new(connectors).err().unwrap();
        assert!(matches!(err, Error::Connect(ref m) if m.contains("replica-1")));
    }

    #[test]
    fn test_close_counts_failures() {
        let mut failing = NullConn::new(1);
        failing.fail_close = true;
        let pool = ReplicaPool::from_connections(vec![
            Arc::new(NullConn::new(0)),
            Arc::new(failing),
        ])
        .unwrap();
        assert_eq!(pool.close(), 1);
        assert_eq!(pool.len(), 2);
        assert!(!pool.is_empty());
    }
}
