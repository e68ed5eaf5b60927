//! Process configuration read once at startup.
//!
//! # Responsibility
//! - Describe which asset backend to use and how to reach it.
//! - Load settings from `KNOTE_*` environment variables with defaults.
//!
//! # Invariants
//! - Configuration is immutable after load; components receive it by
//!   reference at construction time.
//! - Secrets are never included in `Debug` output.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_UPLOAD_DIR: &str = "/tmp/uploads/";
pub const DEFAULT_REMOTE_HOST: &str = "localhost";
pub const DEFAULT_REMOTE_PORT: u16 = 9000;
pub const DEFAULT_BUCKET: &str = "image-storage";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_DB_PATH: &str = "/tmp/knote/knote.sqlite3";
pub const DEFAULT_LOG_DIR: &str = "/tmp/knote/logs";

static BUCKET_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("valid bucket regex"));

/// Configuration load/validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Variable holds a value that cannot be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
    /// Bucket name violates S3 naming rules.
    InvalidBucketName(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue {
                key,
                value,
                expected,
            } => write!(f, "invalid value `{value}` for {key}; expected {expected}"),
            Self::InvalidBucketName(name) => write!(f, "invalid bucket name `{name}`"),
        }
    }
}

impl Error for ConfigError {}

/// Whether and how the remote backend connection is retried at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub retry_interval: Duration,
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// Connection settings for an S3-compatible object store.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteStoreConfig {
    pub host: String,
    pub port: u16,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    pub use_ssl: bool,
    pub reconnect: ReconnectPolicy,
}

impl RemoteStoreConfig {
    /// Base endpoint URL, e.g. `http://localhost:9000`.
    pub fn endpoint(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// Validates settings that would otherwise fail on every request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !BUCKET_NAME_RE.is_match(&self.bucket) || self.bucket.contains("..") {
            return Err(ConfigError::InvalidBucketName(self.bucket.clone()));
        }
        if self.reconnect.retry_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "KNOTE_MINIO_RETRY_INTERVAL_SECS",
                value: "0".to_string(),
                expected: "a positive number of seconds",
            });
        }
        Ok(())
    }
}

impl Default for RemoteStoreConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_REMOTE_HOST.to_string(),
            port: DEFAULT_REMOTE_PORT,
            access_key: String::new(),
            secret_key: String::new(),
            bucket: DEFAULT_BUCKET.to_string(),
            region: DEFAULT_REGION.to_string(),
            use_ssl: false,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl Debug for RemoteStoreConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("access_key", &redact(&self.access_key))
            .field("secret_key", &redact(&self.secret_key))
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("use_ssl", &self.use_ssl)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

/// Asset backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// Assets are written into a local directory.
    Local { upload_dir: PathBuf },
    /// Assets are written into an S3-compatible bucket.
    Remote(RemoteStoreConfig),
}

impl StoreConfig {
    pub fn local(upload_dir: impl Into<PathBuf>) -> Self {
        Self::Local {
            upload_dir: upload_dir.into(),
        }
    }

    /// Stable backend name used in logs and `KNOTE_STORAGE`.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Remote(_) => "remote",
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::local(DEFAULT_UPLOAD_DIR)
    }
}

/// Top-level configuration for the note service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to its
    /// value. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let store = match get("KNOTE_STORAGE").as_deref() {
            None | Some("local") => StoreConfig::local(
                get("KNOTE_UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()),
            ),
            Some("remote") | Some("minio") => {
                let defaults = RemoteStoreConfig::default();
                let remote = RemoteStoreConfig {
                    host: get("KNOTE_MINIO_HOST").unwrap_or(defaults.host),
                    port: parse_or("KNOTE_MINIO_PORT", get("KNOTE_MINIO_PORT"), defaults.port)?,
                    access_key: get("KNOTE_MINIO_ACCESS_KEY").unwrap_or_default(),
                    secret_key: get("KNOTE_MINIO_SECRET_KEY").unwrap_or_default(),
                    bucket: get("KNOTE_MINIO_BUCKET").unwrap_or(defaults.bucket),
                    region: get("KNOTE_MINIO_REGION").unwrap_or(defaults.region),
                    use_ssl: parse_bool("KNOTE_MINIO_USE_SSL", get("KNOTE_MINIO_USE_SSL"), false)?,
                    reconnect: ReconnectPolicy {
                        enabled: parse_bool(
                            "KNOTE_MINIO_RECONNECT_ENABLED",
                            get("KNOTE_MINIO_RECONNECT_ENABLED"),
                            true,
                        )?,
                        retry_interval: Duration::from_secs(parse_or(
                            "KNOTE_MINIO_RETRY_INTERVAL_SECS",
                            get("KNOTE_MINIO_RETRY_INTERVAL_SECS"),
                            DEFAULT_RETRY_INTERVAL.as_secs(),
                        )?),
                    },
                };
                remote.validate()?;
                StoreConfig::Remote(remote)
            }
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "KNOTE_STORAGE",
                    value: other.to_string(),
                    expected: "local|remote",
                })
            }
        };

        Ok(Self {
            db_path: PathBuf::from(
                get("KNOTE_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            ),
            log_dir: PathBuf::from(
                get("KNOTE_LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()),
            ),
            log_level: get("KNOTE_LOG_LEVEL")
                .unwrap_or_else(|| crate::logging::default_log_level().to_string()),
            store,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw,
            expected: "a number",
        }),
    }
}

fn parse_bool(key: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = value else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw,
            expected: "true|false",
        }),
    }
}
