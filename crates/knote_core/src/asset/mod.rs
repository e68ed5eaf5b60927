//! Asset storage for uploaded images.
//!
//! # Responsibility
//! - Define the backend contract shared by the local-directory and
//!   S3-compatible object storage implementations.
//! - Own the error taxonomy for asset initialization, writes and reads.
//!
//! # Invariants
//! - Backends only ever see identifiers accepted by
//!   `model::asset::is_valid_identifier`.
//! - Lower-level I/O and HTTP failures are wrapped into `StoreError`, never
//!   returned raw.

use crate::config::ConfigError;
use crate::model::asset::StoredAsset;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use uuid::Uuid;

pub mod local;
pub mod remote;
mod sigv4;
pub mod store;

pub type StoreResult<T> = Result<T, StoreError>;

/// Lifecycle of the connection between the asset store and its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    RetryWait,
    Ready,
    Failed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Connecting => "connecting",
            Self::RetryWait => "retry_wait",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for asset writes and reads.
#[derive(Debug)]
pub enum StoreError {
    /// The store has not reached `Ready`.
    NotReady(ConnectionState),
    /// The backend accepted the request but failed to persist or read it.
    IoFailure(std::io::Error),
    /// The backend could not be reached.
    Unavailable(String),
    /// No asset exists under the identifier.
    NotFound(String),
    /// Identifier could escape the storage namespace.
    InvalidIdentifier(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotReady(state) => write!(f, "asset store is not ready (state: {state})"),
            Self::IoFailure(err) => write!(f, "asset backend i/o failure: {err}"),
            Self::Unavailable(message) => write!(f, "asset backend unavailable: {message}"),
            Self::NotFound(identifier) => write!(f, "asset not found: {identifier}"),
            Self::InvalidIdentifier(identifier) => {
                write!(f, "invalid asset identifier: `{identifier}`")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::IoFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::IoFailure(value)
    }
}

/// Fatal asset store initialization error. The process must not serve
/// requests after receiving one.
#[derive(Debug)]
pub enum InitError {
    /// Store configuration is unusable.
    Config(ConfigError),
    /// Backend could not be prepared and no retry is allowed.
    Backend {
        backend: &'static str,
        attempts: u32,
        source: StoreError,
    },
}

impl Display for InitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid asset store configuration: {err}"),
            Self::Backend {
                backend,
                attempts,
                source,
            } => write!(
                f,
                "{backend} asset backend failed to initialize after {attempts} attempt(s): {source}"
            ),
        }
    }
}

impl Error for InitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Backend { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for InitError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// Storage mechanism behind `AssetStore`.
///
/// Implementations must be safe to share between concurrent requests; each
/// `put` is expected to be atomic on its own.
pub trait AssetBackend: Send + Sync {
    /// Stable backend name used in logs.
    fn name(&self) -> &'static str;
    /// URL path prefix under which stored assets are served, with trailing `/`.
    fn public_prefix(&self) -> &'static str;
    /// Establishes the backend session and prepares the storage namespace.
    /// Must be idempotent.
    fn connect(&mut self) -> StoreResult<()>;
    /// Writes `bytes` under `identifier`.
    fn put(&self, identifier: &str, bytes: &[u8], content_type: &str) -> StoreResult<()>;
    /// Reads the asset stored under `identifier`.
    fn get(&self, identifier: &str) -> StoreResult<StoredAsset>;
}

/// Blocking wait used between connection attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Source of the random part of asset identifiers.
pub trait TokenSource: Send + Sync {
    fn next_token(&self) -> String;
}

/// Random UUID v4 tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidTokenSource;

impl TokenSource for UuidTokenSource {
    fn next_token(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Best-effort content type from a file extension, used when the original
/// content type was not recorded.
pub fn content_type_for_identifier(identifier: &str) -> &'static str {
    let extension = identifier
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}
