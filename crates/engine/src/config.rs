//! Data source configuration
//!
//! Settings come from a TOML file or from environment variables (`DB_*` by
//! default, renamable per field through [`DataSourceEnv`]). They only describe how to reach the database; routing and transaction
//! behavior never read them.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use txroute_core::{Error, Result};
use txroute_dialects::{env, Dialect};

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Full connection string; overrides the individual fields when set
pub const ENV_CONNECT_URL: &str = "DB_CONNECT_URL";
/// Database user
pub const ENV_USER: &str = "DB_USER";
/// Database password
pub const ENV_PASSWORD: &str = "DB_PASSWORD";
/// Host name or address
pub const ENV_HOST: &str = "DB_HOST";
/// TCP port
pub const ENV_PORT: &str = "DB_PORT";
/// Schema / database name
pub const ENV_SCHEMA: &str = "DB_SCHEMA";
/// Idle connection limit
pub const ENV_MAX_IDLE: &str = "DB_MAX_IDLE_CONNECTIONS";
/// Open connection limit
pub const ENV_MAX_OPEN: &str = "DB_MAX_OPEN_CONNECTIONS";
/// Connection lifetime (`30m`, `1h`, ...)
pub const ENV_MAX_LIFETIME: &str = "DB_CONNECTION_MAX_LIFETIME";
/// Driver statement logging
pub const ENV_DEBUG: &str = "DB_DEBUG";
/// Older name for [`ENV_DEBUG`], read when no debug variable is set
pub const ENV_LOG_MODE: &str = "GORM_LOG_MODE";

/// Connection-pool sizing handed to the driver at connect time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum idle connections (default: 10)
    #[serde(default = "default_max_idle")]
    pub max_idle_conns: u32,
    /// Maximum open connections (default: 50)
    #[serde(default = "default_max_open")]
    pub max_open_conns: u32,
    /// Connection lifetime in seconds (default: 3600)
    #[serde(default = "default_lifetime_secs")]
    pub conn_max_lifetime_secs: u64,
}

fn default_max_idle() -> u32 {
    10
}

fn default_max_open() -> u32 {
    50
}

fn default_lifetime_secs() -> u64 {
    3600
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_conns: default_max_idle(),
            max_open_conns: default_max_open(),
            conn_max_lifetime_secs: default_lifetime_secs(),
        }
    }
}

impl PoolConfig {
    /// Connection lifetime as a `Duration`
    pub fn conn_max_lifetime(&self) -> Duration {
        Duration::from_secs(self.conn_max_lifetime_secs)
    }
}

/// Where and how to connect
///
/// # Example
///
/// ```toml
/// user = "app"
/// password = "secret"
/// host = "db.internal"
/// port = 3306
/// schema = "orders"
/// debug = false
///
/// [pool]
/// max_idle_conns = 10
/// max_open_conns = 50
/// conn_max_lifetime_secs = 3600
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Database user
    #[serde(default)]
    pub user: String,
    /// Database password
    #[serde(default)]
    pub password: String,
    /// Host (default: `127.0.0.1`)
    #[serde(default = "default_host")]
    pub host: String,
    /// Port (default: 3306)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Schema / database name
    #[serde(default)]
    pub schema: String,
    /// Explicit connection string; wins over the fields above
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    /// Pool sizing
    #[serde(default)]
    pub pool: PoolConfig,
    /// Driver statement logging
    #[serde(default)]
    pub debug: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3306
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            host: default_host(),
            port: default_port(),
            schema: String::new(),
            connection_string: None,
            pool: PoolConfig::default(),
            debug: false,
        }
    }
}

impl DataSourceConfig {
    /// Connection string for `dialect`
    ///
    /// Returns the explicit `connection_string` when set, otherwise asks the
    /// dialect to build one from the individual fields.
    pub fn dsn(&self, dialect: &dyn Dialect) -> String {
        match self.connection_string.as_deref().filter(|s| !s.is_empty()) {
            Some(explicit) => explicit.to_string(),
            None => dialect.build(&self.user, &self.password, &self.host, self.port, &self.schema),
        }
    }

    /// Build a config from `DB_*` environment variables
    ///
    /// Shorthand for `DataSourceEnv::default().build()`; see [`DataSourceEnv`]
    /// for the lookup rules.
    pub fn from_env() -> Self {
        DataSourceEnv::default().build()
    }

    /// Parse a config from TOML text
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the text is not valid TOML for this shape.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: DataSourceConfig = toml::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a config file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            Error::InvalidConfig(msg) => {
                Error::InvalidConfig(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Serialize to TOML and write to `path`
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.pool.max_open_conns > 0 && self.pool.max_idle_conns > self.pool.max_open_conns {
            return Err(Error::InvalidConfig(format!(
                "max_idle_conns ({}) exceeds max_open_conns ({})",
                self.pool.max_idle_conns, self.pool.max_open_conns
            )));
        }
        Ok(())
    }
}

/// Environment variable names for each [`DataSourceConfig`] field
///
/// A field left `None` reads its `DB_*` default. A named variable that is
/// unset or empty also falls back to the default, so a service can rename a
/// few settings and inherit the rest. Unparsable numbers and durations are
/// logged and ignored.
///
/// Debug logging reads `debug`, then [`ENV_DEBUG`], then [`ENV_LOG_MODE`].
///
/// ```ignore
/// let config = DataSourceEnv {
///     user: Some("ORDERS_DB_USER".into()),
///     schema: Some("ORDERS_DB_SCHEMA".into()),
///     ..Default::default()
/// }
/// .build();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSourceEnv {
    /// Variable holding the user
    pub user: Option<String>,
    /// Variable holding the password
    pub password: Option<String>,
    /// Variable holding the host
    pub host: Option<String>,
    /// Variable holding the port
    pub port: Option<String>,
    /// Variable holding the schema
    pub schema: Option<String>,
    /// Variable holding a full connection string
    pub connection_string: Option<String>,
    /// Variable holding the idle connection limit
    pub max_idle_conns: Option<String>,
    /// Variable holding the open connection limit
    pub max_open_conns: Option<String>,
    /// Variable holding the connection lifetime
    pub conn_max_lifetime: Option<String>,
    /// Variable holding the debug flag
    pub debug: Option<String>,
}

impl DataSourceEnv {
    /// Resolve every field against the environment
    pub fn build(&self) -> DataSourceConfig {
        let mut config = DataSourceConfig::default();
        config.connection_string = lookup(&self.connection_string, ENV_CONNECT_URL, env::string);
        if let Some(v) = lookup(&self.user, ENV_USER, env::string) {
            config.user = v;
        }
        if let Some(v) = lookup(&self.password, ENV_PASSWORD, env::string) {
            config.password = v;
        }
        if let Some(v) = lookup(&self.host, ENV_HOST, env::string) {
            config.host = v;
        }
        if let Some(v) = lookup(&self.port, ENV_PORT, env::integer::<u16>) {
            config.port = v;
        }
        if let Some(v) = lookup(&self.schema, ENV_SCHEMA, env::string) {
            config.schema = v;
        }
        if let Some(v) = lookup(&self.max_idle_conns, ENV_MAX_IDLE, env::integer::<u32>) {
            config.pool.max_idle_conns = v;
        }
        if let Some(v) = lookup(&self.max_open_conns, ENV_MAX_OPEN, env::integer::<u32>) {
            config.pool.max_open_conns = v;
        }
        if let Some(d) = lookup(&self.conn_max_lifetime, ENV_MAX_LIFETIME, env::duration) {
            config.pool.conn_max_lifetime_secs = d.as_secs();
        }
        if let Some(v) =
            lookup(&self.debug, ENV_DEBUG, env::boolean).or_else(|| env::boolean(ENV_LOG_MODE))
        {
            config.debug = v;
        }
        config
    }
}

/// Read `name` if given, falling back to `default`
fn lookup<T>(name: &Option<String>, default: &str, read: fn(&str) -> Option<T>) -> Option<T> {
    name.as_deref().and_then(read).or_else(|| read(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use txroute_dialects::{MySqlBuilder, SqliteBuilder};

    // Overrides fall back to the shared `DB_*` names.
    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

    #[test]
    fn test_defaults() {
        let config = DataSourceConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3306);
        assert_eq!(config.pool.max_idle_conns, 10);
        assert_eq!(config.pool.max_open_conns, 50);
        assert_eq!(config.pool.conn_max_lifetime(), Duration::from_secs(3600));
        assert!(!config.debug);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = DataSourceConfig::from_toml(
            r#"
user = "app"
schema = "orders"

[pool]
max_open_conns = 20
"#,
        )
        .unwrap();
        assert_eq!(config.user, "app");
        assert_eq!(config.port, 3306);
        assert_eq!(config.pool.max_open_conns, 20);
        assert_eq!(config.pool.max_idle_conns, 10);
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let err = DataSourceConfig::from_toml("port = \"not a number\"").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_idle_above_open_rejected() {
        let err = DataSourceConfig::from_toml("[pool]\nmax_idle_conns = 60\nmax_open_conns = 5")
            .unwrap_err();
        assert!(err.to_string().contains("max_idle_conns"));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("datasource.toml");
        let config = DataSourceConfig {
            user: "svc".into(),
            schema: "billing".into(),
            debug: true,
            ..Default::default()
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(DataSourceConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = DataSourceConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_dsn_prefers_explicit_string() {
        let mut config = DataSourceConfig {
            user: "u".into(),
            password: "p".into(),
            schema: "s".into(),
            ..Default::default()
        };
        let dsn = config.dsn(&MySqlBuilder::new());
        assert!(dsn.starts_with("u:p@tcp(127.0.0.1:3306)/s"));

        config.connection_string = Some("file:explicit.db".into());
        assert_eq!(config.dsn(&SqliteBuilder::new().with_path("ignored.db")), "file:explicit.db");
    }

    #[test]
    fn test_from_env() {
        let _env = ENV_LOCK.lock();
        std::env::set_var(ENV_USER, "env_user");
        std::env::set_var(ENV_PORT, "3307");
        std::env::set_var(ENV_MAX_LIFETIME, "30m");
        std::env::set_var(ENV_DEBUG, "true");
        let config = DataSourceConfig::from_env();
        assert_eq!(config.user, "env_user");
        assert_eq!(config.port, 3307);
        assert_eq!(config.pool.conn_max_lifetime(), Duration::from_secs(1800));
        assert!(config.debug);
        for key in [ENV_USER, ENV_PORT, ENV_MAX_LIFETIME, ENV_DEBUG] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_overrides_variable_names() {
        let _env = ENV_LOCK.lock();
        std::env::set_var("ORDERS_DB_SCHEMA", "orders");
        std::env::set_var("ORDERS_DB_LIFETIME", "1h30m");
        std::env::set_var("ORDERS_DB_MAX_OPEN", "12");
        let config = DataSourceEnv {
            schema: Some("ORDERS_DB_SCHEMA".into()),
            conn_max_lifetime: Some("ORDERS_DB_LIFETIME".into()),
            max_open_conns: Some("ORDERS_DB_MAX_OPEN".into()),
            host: Some("ORDERS_DB_HOST_NEVER_SET".into()),
            ..Default::default()
        }
        .build();
        assert_eq!(config.schema, "orders");
        assert_eq!(config.pool.conn_max_lifetime(), Duration::from_secs(5400));
        assert_eq!(config.pool.max_open_conns, 12);
        assert_eq!(config.host, "127.0.0.1");
        for key in ["ORDERS_DB_SCHEMA", "ORDERS_DB_LIFETIME", "ORDERS_DB_MAX_OPEN"] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_overflowing_lifetime_keeps_default() {
        let _env = ENV_LOCK.lock();
        std::env::set_var("BILLING_DB_LIFETIME", "10000000000000000h");
        let config = DataSourceEnv {
            conn_max_lifetime: Some("BILLING_DB_LIFETIME".into()),
            ..Default::default()
        }
        .build();
        assert_eq!(config.pool.conn_max_lifetime(), Duration::from_secs(3600));
        std::env::remove_var("BILLING_DB_LIFETIME");
    }

    #[test]
    fn test_log_mode_enables_debug() {
        let _env = ENV_LOCK.lock();
        std::env::set_var(ENV_LOG_MODE, "true");
        let config = DataSourceEnv {
            debug: Some("LEDGER_DB_DEBUG_NEVER_SET".into()),
            ..Default::default()
        }
        .build();
        std::env::remove_var(ENV_LOG_MODE);
        assert!(config.debug);
    }
}
