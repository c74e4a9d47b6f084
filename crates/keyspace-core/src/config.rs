//! Store connection configuration
//!
//! Configuration is read from a YAML (default) or TOML file. A file may hold
//! one section per deployment environment:
//!
//! ```yaml
//! development:
//!   host: localhost
//!   port: 6379
//!   db: 0
//! production:
//!   host: cache.internal
//!   port: 6379
//!   db: 2
//!   password: s3cret
//! ```
//!
//! `KEYSPACE_REDIS_*` environment variables override file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::{Error, Result};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6379;

/// Environment variables honoured by [`StoreConfig::apply_env_overrides`]
pub const ENV_HOST: &str = "KEYSPACE_REDIS_HOST";
pub const ENV_PORT: &str = "KEYSPACE_REDIS_PORT";
pub const ENV_DB: &str = "KEYSPACE_REDIS_DB";
pub const ENV_PASSWORD: &str = "KEYSPACE_REDIS_PASSWORD";

/// Connection settings for the backing key-value store
///
/// # Example
/// ```
/// use keyspace_core::StoreConfig;
///
/// let config = StoreConfig::new()
///     .with_host("cache.internal")
///     .with_db(2)
///     .with_password("s3cret");
/// assert_eq!(config.url(), "redis://:s3cret@cache.internal:6379/2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    /// Logical database index
    pub db: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Timeout for establishing a connection, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
    /// Timeout for a single command round trip, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_timeout_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db: 0,
            password: None,
            connect_timeout_secs: None,
            response_timeout_secs: None,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout_secs = Some(timeout.as_secs());
        self
    }

    /// The password, if one is set and non-empty
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_secs.map(Duration::from_secs)
    }

    /// Connection URL, `redis://[:password@]host:port/db`
    pub fn url(&self) -> String {
        self.format_url(self.password())
    }

    /// Connection URL with the password masked, safe for logs
    pub fn redacted_url(&self) -> String {
        self.format_url(self.password().map(|_| "***"))
    }

    fn format_url(&self, password: Option<&str>) -> String {
        let auth = password.map(|p| format!(":{}@", p)).unwrap_or_default();
        format!("redis://{}{}:{}/{}", auth, self.host, self.port, self.db)
    }

    /// Load configuration from a YAML or TOML file
    ///
    /// When `environment` is given and the file has per-environment sections,
    /// only the section with that name is used. A flat document is the
    /// configuration for every environment.
    ///
    /// # Errors
    /// - `Error::ConfigNotFound` if the file doesn't exist
    /// - `Error::Config` if the file can't be parsed, or has sections but
    ///   none for `environment`
    pub fn from_file(path: impl AsRef<Path>, environment: Option<&str>) -> Result<Self> {
        let path = expand_home(path.as_ref())?;
        if !path.exists() {
            return Err(Error::ConfigNotFound);
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            error!("Failed to read config file {:?}: {}", path, e);
            Error::Io(e)
        })?;

        let format = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            ConfigFormat::Toml
        } else {
            ConfigFormat::Yaml
        };

        let config = Self::parse(&contents, format, environment)?;
        info!("Loaded store config from {:?}: {}", path, config.redacted_url());
        Ok(config)
    }

    /// Parse configuration text
    pub fn parse(contents: &str, format: ConfigFormat, environment: Option<&str>) -> Result<Self> {
        let document: serde_json::Value = match format {
            ConfigFormat::Toml => {
                let value: toml::Value = toml::from_str(contents)
                    .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
                serde_json::to_value(value)
                    .map_err(|e| Error::Config(format!("TOML conversion error: {}", e)))?
            }
            ConfigFormat::Yaml => serde_yaml::from_str(contents)
                .map_err(|e| Error::Config(format!("Invalid YAML: {}", e)))?,
        };

        // An empty YAML document means "all defaults"
        if document.is_null() {
            return Ok(Self::default());
        }

        let section = match environment {
            Some(env) => match document.get(env) {
                Some(section) => {
                    debug!("Using {:?} section of store config", env);
                    section.clone()
                }
                None if is_sectioned(&document) => {
                    return Err(Error::Config(format!("No '{}' section in store config", env)));
                }
                None => document,
            },
            None => document,
        };

        serde_json::from_value(section)
            .map_err(|e| Error::Config(format!("Invalid store config: {}", e)))
    }

    /// Apply `KEYSPACE_REDIS_*` overrides from the process environment
    pub fn with_env_overrides(mut self) -> Result<Self> {
        self.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(self)
    }

    /// Apply overrides using `lookup` to read variables
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup(ENV_HOST) {
            self.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = port
                .parse()
                .map_err(|e| Error::Config(format!("Invalid {}: {}", ENV_PORT, e)))?;
        }
        if let Some(db) = lookup(ENV_DB) {
            self.db = db
                .parse()
                .map_err(|e| Error::Config(format!("Invalid {}: {}", ENV_DB, e)))?;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.password = Some(password);
        }
        Ok(())
    }
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

/// Whether the document holds per-environment sections rather than settings
fn is_sectioned(document: &serde_json::Value) -> bool {
    document
        .as_object()
        .is_some_and(|map| map.values().any(serde_json::Value::is_object))
}

fn expand_home(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => Ok(dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?
            .join(rest)),
        Err(_) => Ok(path.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 6379);
        assert_eq!(config.db, 0);
        assert!(config.password.is_none());
        assert_eq!(config.url(), "redis://localhost:6379/0");
    }

    #[test]
    fn test_url_includes_password_only_when_non_empty() {
        let config = StoreConfig::new().with_password("s3cret");
        assert_eq!(config.url(), "redis://:s3cret@localhost:6379/0");
        assert_eq!(config.redacted_url(), "redis://:***@localhost:6379/0");

        let config = StoreConfig::new().with_password("");
        assert_eq!(config.password(), None);
        assert_eq!(config.url(), "redis://localhost:6379/0");
    }

    #[test]
    fn test_builder_pattern() {
        let config = StoreConfig::new()
            .with_host("cache")
            .with_port(6380)
            .with_db(3)
            .with_connect_timeout(Duration::from_secs(2));

        assert_eq!(config.url(), "redis://cache:6380/3");
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.response_timeout(), None);
    }

    #[test]
    fn test_parse_environment_section() {
        let yaml = r#"
development:
  host: localhost
  db: 1
production:
  host: cache.internal
  port: 6380
  db: 2
  password: s3cret
"#;
        let config = StoreConfig::parse(yaml, ConfigFormat::Yaml, Some("production")).unwrap();
        assert_eq!(config.host, "cache.internal");
        assert_eq!(config.port, 6380);
        assert_eq!(config.db, 2);
        assert_eq!(config.password(), Some("s3cret"));

        let config = StoreConfig::parse(yaml, ConfigFormat::Yaml, Some("development")).unwrap();
        assert_eq!(config.db, 1);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_flat_document() {
        let yaml = "host: redis\nport: 7000\n";
        let config = StoreConfig::parse(yaml, ConfigFormat::Yaml, Some("test")).unwrap();
        assert_eq!(config.host, "redis");
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn test_parse_missing_environment_section() {
        let yaml = "production:\n  host: cache.internal\n  port: 6380\n  db: 2\n  password: s3cret\n";
        let result = StoreConfig::parse(yaml, ConfigFormat::Yaml, Some("development"));
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("development")));

        let toml = "[production]\nhost = \"cache.internal\"\n";
        let result = StoreConfig::parse(toml, ConfigFormat::Toml, Some("staging"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_toml() {
        let toml = "[staging]\nhost = \"staging-cache\"\ndb = 4\n";
        let config = StoreConfig::parse(toml, ConfigFormat::Toml, Some("staging")).unwrap();
        assert_eq!(config.host, "staging-cache");
        assert_eq!(config.db, 4);
    }

    #[test]
    fn test_parse_invalid() {
        let result = StoreConfig::parse("port: not-a-number", ConfigFormat::Yaml, None);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "test:\n  host: file-host\n  db: 5").unwrap();

        let config = StoreConfig::from_file(file.path(), Some("test")).unwrap();
        assert_eq!(config.host, "file-host");
        assert_eq!(config.db, 5);
    }

    #[test]
    fn test_from_missing_file() {
        let result = StoreConfig::from_file("/nonexistent/keyspace.yml", None);
        assert!(matches!(result, Err(Error::ConfigNotFound)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_HOST, "env-host"),
            (ENV_PORT, "6390"),
            (ENV_PASSWORD, "pw"),
        ]
        .into_iter()
        .collect();

        let mut config = StoreConfig::default();
        config
            .apply_env_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.host, "env-host");
        assert_eq!(config.port, 6390);
        assert_eq!(config.db, 0);
        assert_eq!(config.password(), Some("pw"));
    }

    #[test]
    fn test_env_override_invalid_port() {
        let mut config = StoreConfig::default();
        let result = config.apply_env_overrides(|name| {
            (name == ENV_PORT).then(|| "sixty".to_string())
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
