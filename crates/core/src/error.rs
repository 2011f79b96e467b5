//! Error types for txroute
//!
//! This module defines the errors raised by the transaction and routing layer
//! itself. Errors produced by application code inside a unit of work never pass
//! through this type: entry points are generic over the caller's error type and
//! only convert *our* failures into it via `From<Error>`.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for txroute operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the transaction and routing layer
#[derive(Debug, Error)]
pub enum Error {
    /// Driver failed to establish a connection
    #[error("connect failed: {0}")]
    Connect(String),

    /// Connection establisher gave up after exhausting its attempts
    #[error("ping timeout after {attempts} attempts")]
    PingTimeout {
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// Beginning a physical transaction failed
    #[error("begin failed: {0}")]
    Begin(String),

    /// Committing a physical transaction failed
    #[error("commit failed: {0}")]
    Commit(String),

    /// Rolling back a physical transaction failed
    #[error("rollback failed: {0}")]
    Rollback(String),

    /// A transaction handle was used after its transaction finished
    #[error("transaction already committed or rolled back")]
    TransactionClosed,

    /// The data source has been shut down
    #[error("data source is shut down")]
    Closed,

    /// Replica path used with neither a pinned nor a default replica pool
    #[error("no replica pool configured")]
    NoReplicaPool,

    /// Replica pool constructed without any connectors
    #[error("replica pool requires at least one connection")]
    EmptyReplicaPool,

    /// A unit of work panicked
    #[error("panic: {0}")]
    Panic(String),

    /// Configuration could not be parsed or is inconsistent
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error (file operations, driver sockets, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// True when no transaction object was ever created for the failing call.
    ///
    /// Acquisition failures happen before `begin` returns, so no hooks fire
    /// and nothing needs to be rolled back.
    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            Error::Connect(_)
                | Error::PingTimeout { .. }
                | Error::Begin(_)
                | Error::NoReplicaPool
                | Error::Closed
        )
    }

    /// Build a `Panic` error from a caught panic payload.
    ///
    /// Payloads that are `&str` or `String` keep their message; anything else
    /// is classified as a generic panic.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        Error::Panic(panic_message(payload))
    }
}

/// Extract a printable message from a panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_ping_timeout() {
        let err = Error::PingTimeout { attempts: 20 };
        let msg = err.to_string();
        assert!(msg.contains("ping timeout"));
        assert!(msg.contains("20"));
    }

    #[test]
    fn test_error_display_commit() {
        let err = Error::Commit("connection reset".to_string());
        let msg = err.to_string();
        assert!(msg.contains("commit failed"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_is_acquisition() {
        assert!(Error::Connect("x".into()).is_acquisition());
        assert!(Error::PingTimeout { attempts: 1 }.is_acquisition());
        assert!(Error::Begin("x".into()).is_acquisition());
        assert!(Error::NoReplicaPool.is_acquisition());
        assert!(Error::Closed.is_acquisition());
        assert!(!Error::Commit("x".into()).is_acquisition());
        assert!(!Error::TransactionClosed.is_acquisition());
    }

    #[test]
    fn test_panic_message_str() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
    }

    #[test]
    fn test_panic_message_string() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("kaboom"));
        let err = Error::from_panic(payload.as_ref());
        assert!(matches!(err, Error::Panic(ref m) if m == "kaboom"));
    }

    #[test]
    fn test_panic_message_other() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "panic");
    }
}
