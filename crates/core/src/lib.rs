//! Core types and traits for txroute
//!
//! This crate defines the foundational types used throughout the system:
//! - Error: Error type for the transaction and routing layer
//! - Traits: Driver seam (`Connection`, `Transaction`)
//! - Types: `Classification`, `ScopeKind`, `IsolationLevel`, `TxOptions`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{panic_message, Error, Result};
pub use traits::{Connection, Transaction};
pub use types::{Classification, IsolationLevel, ScopeKind, TxOptions};
