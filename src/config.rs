//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ssh: SshConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// SSH tunnel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_ssh_enabled")]
    pub enabled: bool,

    #[serde(default = "default_ssh_host")]
    pub host: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default = "default_ssh_user")]
    pub user: String,

    /// ssh executable
    #[serde(default = "default_ssh_program")]
    pub program: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_ssh_enabled() -> bool {
    true
}

fn default_ssh_host() -> String {
    "daq01.ucn.triumf.ca".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_ssh_user() -> String {
    "ucn".to_string()
}

fn default_ssh_program() -> String {
    "ssh".to_string()
}

fn default_connect_timeout() -> u64 {
    15
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            enabled: default_ssh_enabled(),
            host: default_ssh_host(),
            port: default_ssh_port(),
            user: default_ssh_user(),
            program: default_ssh_program(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Which driver talks to the history store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// Facility MySQL server (needs the `mysql` feature)
    Mysql,
    /// Local SQLite copy
    Sqlite,
}

impl std::str::FromStr for DatabaseBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mysql" => Ok(DatabaseBackend::Mysql),
            "sqlite" => Ok(DatabaseBackend::Sqlite),
            other => Err(ConfigError::Invalid(format!("unknown backend: {}", other))),
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_backend")]
    pub backend: DatabaseBackend,

    /// Host as seen from the SSH server
    #[serde(default = "default_db_host")]
    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default = "default_db_user")]
    pub user: String,

    /// Database (schema) name
    #[serde(default = "default_db_name")]
    pub name: String,

    /// Database file for the sqlite backend
    pub path: Option<PathBuf>,
}

fn default_backend() -> DatabaseBackend {
    DatabaseBackend::Mysql
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    3306
}

fn default_db_user() -> String {
    "ucn_reader".to_string()
}

fn default_db_name() -> String {
    "ucn_history".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            name: default_db_name(),
            path: None,
        }
    }
}

/// Layout of the measurement tables
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    /// Substring marking a table as a measurement table
    #[serde(default = "default_marker")]
    pub measurement_marker: String,

    /// Column holding the integer epoch timestamp of each row
    #[serde(default = "default_time_column")]
    pub time_column: String,

    /// Output name of the epoch timestamp
    #[serde(default = "default_output_time_column")]
    pub output_time_column: String,

    /// Raw timing columns dropped from fetched data
    #[serde(default = "default_internal_time_columns")]
    pub internal_time_columns: Vec<String>,

    /// Facility timezone (IANA name)
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Read `01/02/2024` as 1 February instead of 2 January
    #[serde(default)]
    pub dayfirst: bool,
}

fn default_marker() -> String {
    "measured".to_string()
}

fn default_time_column() -> String {
    "_i_time".to_string()
}

fn default_output_time_column() -> String {
    "epoch_time".to_string()
}

fn default_internal_time_columns() -> Vec<String> {
    vec!["_t_time".to_string(), "_i_time".to_string()]
}

fn default_timezone() -> String {
    "America/Vancouver".to_string()
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            measurement_marker: default_marker(),
            time_column: default_time_column(),
            output_time_column: default_output_time_column(),
            internal_time_columns: default_internal_time_columns(),
            timezone: default_timezone(),
            dayfirst: false,
        }
    }
}

impl SchemaConfig {
    /// Parsed facility timezone
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::Invalid(format!("timezone {}: {}", self.timezone, e)))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Default config file locations, in search order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("ucnhistory").join("config.toml")),
            Some(PathBuf::from("/etc/ucnhistory/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Load from an explicit path, else default locations, else environment
    pub fn load_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_with_env(path);
        }

        for path in Self::default_paths() {
            if path.exists() {
                match Self::load_with_env(&path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schema.tz()?;
        if self.schema.time_column.is_empty() || self.schema.output_time_column.is_empty() {
            return Err(ConfigError::Invalid(
                "time column names must not be empty".to_string(),
            ));
        }
        if self.database.backend == DatabaseBackend::Sqlite && self.database.path.is_none() {
            return Err(ConfigError::Invalid(
                "sqlite backend requires database.path".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Database overrides
        if let Ok(backend) = std::env::var("UCNHISTORY_DB_BACKEND") {
            self.database.backend = backend.parse()?;
        }
        if let Ok(host) = std::env::var("UCNHISTORY_DB_HOST") {
            self.database.host = host;
        }
        if let Ok(port) = std::env::var("UCNHISTORY_DB_PORT") {
            if let Ok(p) = port.parse() {
                self.database.port = p;
            }
        }
        if let Ok(user) = std::env::var("UCNHISTORY_DB_USER") {
            self.database.user = user;
        }
        if let Ok(name) = std::env::var("UCNHISTORY_DB_NAME") {
            self.database.name = name;
        }
        if let Ok(path) = std::env::var("UCNHISTORY_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }

        // SSH overrides
        if let Ok(host) = std::env::var("UCNHISTORY_SSH_HOST") {
            self.ssh.host = host;
        }
        if let Ok(user) = std::env::var("UCNHISTORY_SSH_USER") {
            self.ssh.user = user;
        }
        if let Ok(enabled) = std::env::var("UCNHISTORY_SSH_ENABLED") {
            if let Ok(b) = enabled.parse() {
                self.ssh.enabled = b;
            }
        }

        // Schema overrides
        if let Ok(tz) = std::env::var("UCNHISTORY_TIMEZONE") {
            self.schema.timezone = tz;
        }

        // Logging overrides
        if let Ok(level) = std::env::var("UCNHISTORY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("UCNHISTORY_LOG_FORMAT") {
            self.logging.format = format;
        }

        self.validate()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# ucnhistory configuration
#
# Environment variables override these settings:
# - UCNHISTORY_DB_BACKEND, UCNHISTORY_DB_HOST, UCNHISTORY_DB_PORT
# - UCNHISTORY_DB_USER, UCNHISTORY_DB_NAME, UCNHISTORY_DB_PATH
# - UCNHISTORY_SSH_HOST, UCNHISTORY_SSH_USER, UCNHISTORY_SSH_ENABLED
# - UCNHISTORY_TIMEZONE
# - UCNHISTORY_LOG_LEVEL, UCNHISTORY_LOG_FORMAT
#
# The database password is read from UCNHISTORY_PASSWORD_<DATABASE>_<USER>
# or UCNHISTORY_DB_PASSWORD.

[ssh]
# Tunnel to the DAQ host before connecting
enabled = true
host = "daq01.ucn.triumf.ca"
port = 22
user = "ucn"

# ssh executable (key or agent authentication)
program = "ssh"

# Seconds to wait for the tunnel to come up
connect_timeout_secs = 15

[database]
# Backend: mysql (facility server) or sqlite (local copy)
backend = "mysql"

# Database host as seen from the SSH server
host = "localhost"
port = 3306
user = "ucn_reader"
name = "ucn_history"

# Database file for the sqlite backend
# path = "/data/ucn_history.db"

[schema]
# Only tables containing this marker are searched by variable name
measurement_marker = "measured"

# Epoch timestamp column and its name in exported data
time_column = "_i_time"
output_time_column = "epoch_time"

# Raw timing columns removed from exported data
internal_time_columns = ["_t_time", "_i_time"]

# Facility timezone for displayed times and naive date input
timezone = "America/Vancouver"

# Read 01/02/2024 as day/month instead of month/day
dayfirst = false

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty or json
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ssh.host, "daq01.ucn.triumf.ca");
        assert_eq!(config.database.backend, DatabaseBackend::Mysql);
        assert_eq!(config.database.name, "ucn_history");
        assert_eq!(config.schema.measurement_marker, "measured");
        assert_eq!(config.schema.tz().unwrap(), chrono_tz::America::Vancouver);
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.database.user, "ucn_reader");
        assert_eq!(config.schema.internal_time_columns, vec!["_t_time", "_i_time"]);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse(
            r#"
            [database]
            backend = "sqlite"
            path = "/tmp/history.db"

            [schema]
            timezone = "UTC"
            "#,
        )
        .unwrap();
        assert_eq!(config.database.backend, DatabaseBackend::Sqlite);
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.schema.tz().unwrap(), chrono_tz::UTC);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            Config::parse("[schema]\ntimezone = \"Mars/Olympus\""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::parse("[database]\nbackend = \"sqlite\""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::parse("[database\n"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("MySQL".parse::<DatabaseBackend>().unwrap(), DatabaseBackend::Mysql);
        assert!("oracle".parse::<DatabaseBackend>().is_err());
    }
}
