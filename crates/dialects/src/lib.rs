//! Connection-string builders for txroute
//!
//! One builder per database engine. Each turns the generic
//! `(user, password, host, port, schema)` tuple plus engine-specific options
//! into the connection string its driver expects:
//!
//! - `MySqlBuilder`: `user:pass@tcp(host:port)/schema?opt=value&...`
//! - `PostgresBuilder`: `user=.. password=.. host=.. port=.. dbname=.. sslmode=..`
//! - `SqliteBuilder`: the database file path
//!
//! Every builder can also be filled from named environment variables through
//! its `*Env` companion struct.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod env;
pub mod mysql;
pub mod postgresql;
pub mod sqlite;

pub use mysql::{MySqlBuilder, MySqlEnv};
pub use postgresql::{PostgresBuilder, PostgresEnv, SslMode};
pub use sqlite::{SqliteBuilder, SqliteEnv};

/// A database engine's connection-string builder
pub trait Dialect: Send + Sync {
    /// Driver name (`"mysql"`, `"postgres"`, `"sqlite3"`)
    fn name(&self) -> &'static str;

    /// Build the connection string
    fn build(&self, user: &str, password: &str, host: &str, port: u16, schema: &str) -> String;
}

/// Append `key=value` to `buf`, preceded by `sep` when `sep` is non-empty
pub fn write_pair(buf: &mut String, key: &str, value: &str, sep: &str) {
    buf.push_str(sep);
    buf.push_str(key);
    buf.push('=');
    buf.push_str(value);
}
