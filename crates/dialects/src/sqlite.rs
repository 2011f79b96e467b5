//! SQLite connection strings
//!
//! The connection string is the database file path; credentials and network
//! address are ignored.

use crate::{env, Dialect};

/// SQLite connection-string builder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqliteBuilder {
    /// Database file path (or `:memory:`)
    pub path: String,
}

impl SqliteBuilder {
    /// Builder with an empty path
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

impl Dialect for SqliteBuilder {
    fn name(&self) -> &'static str {
        "sqlite3"
    }

    fn build(&self, _user: &str, _password: &str, _host: &str, _port: u16, _schema: &str) -> String {
        self.path.clone()
    }
}

/// Name of the environment variable that fills a `SqliteBuilder`
#[derive(Debug, Clone, Default)]
pub struct SqliteEnv {
    /// Variable holding the database path
    pub path: Option<String>,
}

impl SqliteEnv {
    /// Overlay the path from the environment onto `builder`
    pub fn apply(&self, mut builder: SqliteBuilder) -> SqliteBuilder {
        if let Some(path) = self.path.as_deref().and_then(env::string) {
            builder.path = path;
        }
        builder
    }
}
