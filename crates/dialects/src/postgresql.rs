//! PostgreSQL connection strings
//!
//! Format: space-separated `key=value` pairs in libpq keyword style.
//! `host` and `port` are omitted when empty/zero so libpq defaults apply.

use crate::{env, write_pair, Dialect};
use std::fmt;
use std::time::Duration;

/// libpq `sslmode`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    /// No SSL
    Disable,
    /// Always SSL, skip verification
    Require,
    /// Always SSL, verify the server certificate was signed by a trusted CA
    VerifyCa,
    /// Always SSL, verify the CA and that the host name matches the certificate
    VerifyFull,
}

impl SslMode {
    /// libpq spelling
    pub fn as_str(self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        }
    }

    /// Parse the libpq spelling
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "disable" => Some(SslMode::Disable),
            "require" => Some(SslMode::Require),
            "verify-ca" => Some(SslMode::VerifyCa),
            "verify-full" => Some(SslMode::VerifyFull),
            _ => None,
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PostgreSQL connection-string builder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostgresBuilder {
    /// `sslmode`
    pub ssl_mode: Option<SslMode>,
    /// `fallback_application_name`
    pub fallback_application_name: Option<String>,
    /// `connect_timeout`, rendered in whole seconds
    pub connect_timeout: Option<Duration>,
    /// `sslcert`
    pub ssl_cert: Option<String>,
    /// `sslkey`
    pub ssl_key: Option<String>,
    /// `sslrootcert`
    pub ssl_root_cert: Option<String>,
}

impl PostgresBuilder {
    /// Builder with no options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `sslmode`
    pub fn with_ssl_mode(mut self, mode: SslMode) -> Self {
        self.ssl_mode = Some(mode);
        self
    }

    /// Set `fallback_application_name`
    pub fn with_fallback_application_name(mut self, name: impl Into<String>) -> Self {
        self.fallback_application_name = Some(name.into());
        self
    }

    /// Set `connect_timeout`
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set `sslcert`
    pub fn with_ssl_cert(mut self, path: impl Into<String>) -> Self {
        self.ssl_cert = Some(path.into());
        self
    }

    /// Set `sslkey`
    pub fn with_ssl_key(mut self, path: impl Into<String>) -> Self {
        self.ssl_key = Some(path.into());
        self
    }

    /// Set `sslrootcert`
    pub fn with_ssl_root_cert(mut self, path: impl Into<String>) -> Self {
        self.ssl_root_cert = Some(path.into());
        self
    }
}

impl Dialect for PostgresBuilder {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn build(&self, user: &str, password: &str, host: &str, port: u16, schema: &str) -> String {
        let mut dsn = String::new();
        write_pair(&mut dsn, "user", user, "");
        write_pair(&mut dsn, "password", password, " ");
        if !host.is_empty() {
            write_pair(&mut dsn, "host", host, " ");
        }
        if port > 0 {
            write_pair(&mut dsn, "port", &port.to_string(), " ");
        }
        write_pair(&mut dsn, "dbname", schema, " ");
        if let Some(mode) = self.ssl_mode {
            write_pair(&mut dsn, "sslmode", mode.as_str(), " ");
        }
        let mut opt = |key: &str, value: &Option<String>| {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                write_pair(&mut dsn, key, v, " ");
            }
        };
        opt("fallback_application_name", &self.fallback_application_name);
        if let Some(t) = self.connect_timeout.filter(|t| !t.is_zero()) {
            opt("connect_timeout", &Some(t.as_secs().to_string()));
        }
        opt("sslcert", &self.ssl_cert);
        opt("sslkey", &self.ssl_key);
        opt("sslrootcert", &self.ssl_root_cert);
        dsn
    }
}

/// Names of the environment variables that fill a `PostgresBuilder`
#[derive(Debug, Clone, Default)]
pub struct PostgresEnv {
    /// Variable holding `sslmode`; `disable` when unset
    pub ssl_mode: Option<String>,
    /// Variable holding `fallback_application_name`
    pub fallback_application_name: Option<String>,
    /// Variable holding `connect_timeout` (e.g. `10s`)
    pub connect_timeout: Option<String>,
    /// Variable holding `sslcert`
    pub ssl_cert: Option<String>,
    /// Variable holding `sslkey`
    pub ssl_key: Option<String>,
    /// Variable holding `sslrootcert`
    pub ssl_root_cert: Option<String>,
}

impl PostgresEnv {
    /// Overlay values found in the environment onto `builder`
    pub fn apply(&self, mut builder: PostgresBuilder) -> PostgresBuilder {
        let s = |name: &Option<String>| name.as_deref().and_then(env::string);

        builder.ssl_mode = Some(
            s(&self.ssl_mode)
                .and_then(|v| SslMode::parse(&v))
                .unwrap_or(SslMode::Disable),
        );
        if let Some(v) = s(&self.fallback_application_name) {
            builder.fallback_application_name = Some(v);
        }
        if let Some(d) = self.connect_timeout.as_deref().and_then(env::duration) {
            builder.connect_timeout = Some(d);
        }
        if let Some(v) = s(&self.ssl_cert) {
            builder.ssl_cert = Some(v);
        }
        if let Some(v) = s(&self.ssl_key) {
            builder.ssl_key = Some(v);
        }
        if let Some(v) = s(&self.ssl_root_cert) {
            builder.ssl_root_cert = Some(v);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_minimal() {
        let dsn = PostgresBuilder::new().build("app", "secret", "pg.local", 5432, "orders");
        assert_eq!(dsn, "user=app password=secret host=pg.local port=5432 dbname=orders");
    }

    #[test]
    fn test_build_omits_empty_host_and_port() {
        let dsn = PostgresBuilder::new().build("app", "pw", "", 0, "db");
        assert_eq!(dsn, "user=app password=pw dbname=db");
    }

    #[test]
    fn test_build_with_ssl_options() {
        let dsn = PostgresBuilder::new()
            .with_ssl_mode(SslMode::VerifyFull)
            .with_fallback_application_name("billing")
            .with_connect_timeout(Duration::from_millis(10_400))
            .with_ssl_root_cert("/etc/ssl/root.crt")
            .build("u", "p", "h", 5432, "d");
        assert_eq!(
            dsn,
            "user=u password=p host=h port=5432 dbname=d sslmode=verify-full \
             fallback_application_name=billing connect_timeout=10 sslrootcert=/etc/ssl/root.crt"
        );
    }

    #[test]
    fn test_ssl_mode_parse() {
        for mode in [SslMode::Disable, SslMode::Require, SslMode::VerifyCa, SslMode::VerifyFull] {
            assert_eq!(SslMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(SslMode::parse("prefer"), None);
    }

    #[test]
    fn test_env_overlay_defaults_ssl_disable() {
        std::env::set_var("TXROUTE_TEST_PG_TIMEOUT", "15s");
        let env = PostgresEnv {
            ssl_mode: Some("TXROUTE_TEST_PG_SSLMODE_UNSET".into()),
            connect_timeout: Some("TXROUTE_TEST_PG_TIMEOUT".into()),
            ..Default::default()
        };
        let builder = env.apply(PostgresBuilder::new());
        assert_eq!(builder.ssl_mode, Some(SslMode::Disable));
        assert_eq!(builder.connect_timeout, Some(Duration::from_secs(15)));
    }
}
