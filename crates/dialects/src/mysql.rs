//! MySQL connection strings
//!
//! Format: `user:password@protocol(address)/schema?key=value&key=value`
//!
//! The address is the instance name when one is set (e.g. a cloud SQL
//! socket), otherwise `host:port` with `127.0.0.1:3306` as the fallback.
//! Options appear in a fixed order; system variables follow, sorted by name.

use crate::{env, write_pair, Dialect};
use std::collections::BTreeMap;

/// MySQL connection-string builder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MySqlBuilder {
    /// Replaces `host:port` in the address when set
    pub instance_name: Option<String>,
    /// Network protocol (default `tcp`)
    pub protocol: Option<String>,
    /// `allowAllFiles=true`
    pub allow_all_files: bool,
    /// `allowCleartextPasswords=true`
    pub allow_cleartext_passwords: bool,
    /// `allowNativePasswords=<bool>`, emitted only when set
    pub allow_native_passwords: Option<bool>,
    /// `allowOldPasswords=true`
    pub allow_old_passwords: bool,
    /// `charset=...`
    pub charset: Option<String>,
    /// `collation=...`
    pub collation: Option<String>,
    /// `clientFoundRows=true`
    pub client_found_rows: bool,
    /// `columnsWithAlias=true`
    pub columns_with_alias: bool,
    /// `interpolateParams=true`
    pub interpolate_params: bool,
    /// `loc=...`
    pub loc: Option<String>,
    /// `maxAllowedPacket=...`, emitted when positive
    pub max_allowed_packet: u32,
    /// `multiStatements=true`
    pub multi_statements: bool,
    /// `parseTime=true`
    pub parse_time: bool,
    /// `readTimeout=...`
    pub read_timeout: Option<String>,
    /// `rejectReadOnly=true`
    pub reject_read_only: bool,
    /// `serverPubKey=...`
    pub server_pub_key: Option<String>,
    /// `timeout=...`
    pub timeout: Option<String>,
    /// `tls=...`
    pub tls: Option<String>,
    /// `writeTimeout=...`
    pub write_timeout: Option<String>,
    /// Arbitrary session variables appended as `name=value`
    pub system_variables: BTreeMap<String, String>,
}

impl MySqlBuilder {
    /// Builder with no options
    pub fn new() -> Self {
        Self::default()
    }

    /// Common production defaults: `utf8mb4`, `parseTime`, local time zone,
    /// native passwords
    pub fn recommended() -> Self {
        Self::new()
            .with_charset("utf8mb4")
            .with_parse_time(true)
            .with_loc("Local")
            .with_allow_native_passwords(true)
    }

    /// Set the instance name
    pub fn with_instance_name(mut self, value: impl Into<String>) -> Self {
        self.instance_name = Some(value.into());
        self
    }

    /// Set the protocol
    pub fn with_protocol(mut self, value: impl Into<String>) -> Self {
        self.protocol = Some(value.into());
        self
    }

    /// Set `allowNativePasswords`
    pub fn with_allow_native_passwords(mut self, value: bool) -> Self {
        self.allow_native_passwords = Some(value);
        self
    }

    /// Set the charset
    pub fn with_charset(mut self, value: impl Into<String>) -> Self {
        self.charset = Some(value.into());
        self
    }

    /// Set the collation
    pub fn with_collation(mut self, value: impl Into<String>) -> Self {
        self.collation = Some(value.into());
        self
    }

    /// Set the time zone location
    pub fn with_loc(mut self, value: impl Into<String>) -> Self {
        self.loc = Some(value.into());
        self
    }

    /// Set `parseTime`
    pub fn with_parse_time(mut self, value: bool) -> Self {
        self.parse_time = value;
        self
    }

    /// Set `multiStatements`
    pub fn with_multi_statements(mut self, value: bool) -> Self {
        self.multi_statements = value;
        self
    }

    /// Set `maxAllowedPacket`
    pub fn with_max_allowed_packet(mut self, value: u32) -> Self {
        self.max_allowed_packet = value;
        self
    }

    /// Set the dial timeout (driver syntax, e.g. `"5s"`)
    pub fn with_timeout(mut self, value: impl Into<String>) -> Self {
        self.timeout = Some(value.into());
        self
    }

    /// Set the read timeout
    pub fn with_read_timeout(mut self, value: impl Into<String>) -> Self {
        self.read_timeout = Some(value.into());
        self
    }

    /// Set the write timeout
    pub fn with_write_timeout(mut self, value: impl Into<String>) -> Self {
        self.write_timeout = Some(value.into());
        self
    }

    /// Set the TLS configuration name
    pub fn with_tls(mut self, value: impl Into<String>) -> Self {
        self.tls = Some(value.into());
        self
    }

    /// Add a session variable
    pub fn with_system_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.system_variables.insert(key.into(), value.into());
        self
    }

    fn options(&self) -> String {
        let mut opts = String::new();
        let flag = |opts: &mut String, on: bool, key: &str| {
            if on {
                push(opts, key, "true");
            }
        };
        flag(&mut opts, self.allow_all_files, "allowAllFiles");
        flag(&mut opts, self.allow_cleartext_passwords, "allowCleartextPasswords");
        if let Some(v) = self.allow_native_passwords {
            push(&mut opts, "allowNativePasswords", if v { "true" } else { "false" });
        }
        flag(&mut opts, self.allow_old_passwords, "allowOldPasswords");
        push_opt(&mut opts, "charset", &self.charset);
        push_opt(&mut opts, "collation", &self.collation);
        flag(&mut opts, self.client_found_rows, "clientFoundRows");
        flag(&mut opts, self.columns_with_alias, "columnsWithAlias");
        flag(&mut opts, self.interpolate_params, "interpolateParams");
        push_opt(&mut opts, "loc", &self.loc);
        if self.max_allowed_packet > 0 {
            push(&mut opts, "maxAllowedPacket", &self.max_allowed_packet.to_string());
        }
        flag(&mut opts, self.multi_statements, "multiStatements");
        flag(&mut opts, self.parse_time, "parseTime");
        push_opt(&mut opts, "readTimeout", &self.read_timeout);
        flag(&mut opts, self.reject_read_only, "rejectReadOnly");
        push_opt(&mut opts, "serverPubKey", &self.server_pub_key);
        push_opt(&mut opts, "timeout", &self.timeout);
        push_opt(&mut opts, "tls", &self.tls);
        push_opt(&mut opts, "writeTimeout", &self.write_timeout);
        for (k, v) in &self.system_variables {
            push(&mut opts, k, v);
        }
        opts
    }
}

fn push(opts: &mut String, key: &str, value: &str) {
    let sep = if opts.is_empty() { "" } else { "&" };
    write_pair(opts, key, value, sep);
}

fn push_opt(opts: &mut String, key: &str, value: &Option<String>) {
    if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
        push(opts, key, v);
    }
}

impl Dialect for MySqlBuilder {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn build(&self, user: &str, password: &str, host: &str, port: u16, schema: &str) -> String {
        let mut dsn = format!(
            "{}:{}@{}(",
            user,
            password,
            self.protocol.as_deref().unwrap_or("tcp")
        );
        match self.instance_name.as_deref().filter(|n| !n.is_empty()) {
            Some(instance) => dsn.push_str(instance),
            None => {
                dsn.push_str(if host.is_empty() { "127.0.0.1" } else { host });
                dsn.push(':');
                dsn.push_str(&if port > 0 { port } else { 3306 }.to_string());
            }
        }
        dsn.push_str(")/");
        dsn.push_str(schema);

        let opts = self.options();
        if !opts.is_empty() {
            dsn.push('?');
            dsn.push_str(&opts);
        }
        dsn
    }
}

/// Names of the environment variables that fill a `MySqlBuilder`
///
/// Fields left `None` are not consulted.
#[derive(Debug, Clone, Default)]
pub struct MySqlEnv {
    /// Variable holding the instance name
    pub instance_name: Option<String>,
    /// Variable holding the protocol
    pub protocol: Option<String>,
    /// Variable holding `allowNativePasswords`
    pub allow_native_passwords: Option<String>,
    /// Variable holding the charset
    pub charset: Option<String>,
    /// Variable holding the collation
    pub collation: Option<String>,
    /// Variable holding the time zone location
    pub loc: Option<String>,
    /// Variable holding `maxAllowedPacket`
    pub max_allowed_packet: Option<String>,
    /// Variable holding `multiStatements`
    pub multi_statements: Option<String>,
    /// Variable holding `parseTime`
    pub parse_time: Option<String>,
    /// Variable holding `rejectReadOnly`
    pub reject_read_only: Option<String>,
    /// Variable holding the dial timeout
    pub timeout: Option<String>,
    /// Variable holding the read timeout
    pub read_timeout: Option<String>,
    /// Variable holding the write timeout
    pub write_timeout: Option<String>,
    /// Variable holding the TLS configuration name
    pub tls: Option<String>,
}

impl MySqlEnv {
    /// Overlay values found in the environment onto `builder`
    pub fn apply(&self, mut builder: MySqlBuilder) -> MySqlBuilder {
        let s = |name: &Option<String>| name.as_deref().and_then(env::string);
        let b = |name: &Option<String>| name.as_deref().and_then(env::boolean);

        if let Some(v) = s(&self.instance_name) {
            builder.instance_name = Some(v);
        }
        if let Some(v) = s(&self.protocol) {
            builder.protocol = Some(v);
        }
        if let Some(v) = b(&self.allow_native_passwords) {
            builder.allow_native_passwords = Some(v);
        }
        if let Some(v) = s(&self.charset) {
            builder.charset = Some(v);
        }
        if let Some(v) = s(&self.collation) {
            builder.collation = Some(v);
        }
        if let Some(v) = s(&self.loc) {
            builder.loc = Some(v);
        }
        if let Some(v) = self.max_allowed_packet.as_deref().and_then(env::integer::<u32>) {
            builder.max_allowed_packet = v;
        }
        if let Some(v) = b(&self.multi_statements) {
            builder.multi_statements = v;
        }
        if let Some(v) = b(&self.parse_time) {
            builder.parse_time = v;
        }
        if let Some(v) = b(&self.reject_read_only) {
            builder.reject_read_only = v;
        }
        if let Some(v) = s(&self.timeout) {
            builder.timeout = Some(v);
        }
        if let Some(v) = s(&self.read_timeout) {
            builder.read_timeout = Some(v);
        }
        if let Some(v) = s(&self.write_timeout) {
            builder.write_timeout = Some(v);
        }
        if let Some(v) = s(&self.tls) {
            builder.tls = Some(v);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_minimal() {
        let dsn = MySqlBuilder::new().build("app", "secret", "db.local", 3307, "orders");
        assert_eq!(dsn, "app:secret@tcp(db.local:3307)/orders");
    }

    #[test]
    fn test_build_defaults_host_and_port() {
        let dsn = MySqlBuilder::new().build("root", "", "", 0, "test");
        assert_eq!(dsn, "root:@tcp(127.0.0.1:3306)/test");
    }

    #[test]
    fn test_build_recommended_options() {
        let dsn = MySqlBuilder::recommended().build("u", "p", "h", 3306, "s");
        assert_eq!(
            dsn,
            "u:p@tcp(h:3306)/s?allowNativePasswords=true&charset=utf8mb4&loc=Local&parseTime=true"
        );
    }

    #[test]
    fn test_instance_name_replaces_address() {
        let dsn = MySqlBuilder::new()
            .with_protocol("unix")
            .with_instance_name("/cloudsql/project:region:db")
            .build("u", "p", "ignored", 1234, "s");
        assert_eq!(dsn, "u:p@unix(/cloudsql/project:region:db)/s");
    }

    #[test]
    fn test_system_variables_sorted_after_options() {
        let dsn = MySqlBuilder::new()
            .with_tls("skip-verify")
            .with_system_variable("sql_mode", "TRADITIONAL")
            .with_system_variable("autocommit", "1")
            .build("u", "p", "h", 3306, "s");
        assert!(dsn.ends_with("?tls=skip-verify&autocommit=1&sql_mode=TRADITIONAL"));
    }

    #[test]
    fn test_max_allowed_packet_and_timeouts() {
        let dsn = MySqlBuilder::new()
            .with_max_allowed_packet(4194304)
            .with_timeout("5s")
            .with_read_timeout("30s")
            .with_write_timeout("30s")
            .build("u", "p", "h", 3306, "s");
        assert!(dsn.ends_with("?maxAllowedPacket=4194304&readTimeout=30s&timeout=5s&writeTimeout=30s"));
    }

    #[test]
    fn test_env_overlay() {
        std::env::set_var("TXROUTE_TEST_MYSQL_CHARSET", "latin1");
        std::env::set_var("TXROUTE_TEST_MYSQL_PARSE_TIME", "true");
        std::env::set_var("TXROUTE_TEST_MYSQL_NATIVE", "false");
        let env = MySqlEnv {
            charset: Some("TXROUTE_TEST_MYSQL_CHARSET".into()),
            parse_time: Some("TXROUTE_TEST_MYSQL_PARSE_TIME".into()),
            allow_native_passwords: Some("TXROUTE_TEST_MYSQL_NATIVE".into()),
            loc: Some("TXROUTE_TEST_MYSQL_LOC_UNSET".into()),
            ..Default::default()
        };
        let builder = env.apply(MySqlBuilder::new().with_loc("UTC"));
        assert_eq!(builder.charset.as_deref(), Some("latin1"));
        assert!(builder.parse_time);
        assert_eq!(builder.allow_native_passwords, Some(false));
        assert_eq!(builder.loc.as_deref(), Some("UTC"));
    }
}
