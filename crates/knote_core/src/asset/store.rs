//! Asset store facade and backend connection state machine.
//!
//! # Responsibility
//! - Drive backend initialization: `Uninitialized -> Connecting -> Ready`,
//!   looping through `RetryWait` while reconnection is enabled, or ending in
//!   `Failed` when it is not.
//! - Generate asset identifiers and map them to public paths.
//!
//! # Invariants
//! - `store`/`fetch` only reach the backend in `Ready`.
//! - `Ready` is terminal; no health checks run after startup.
//! - The retry loop is unbounded; callers needing a deadline must impose it
//!   from outside.

use super::local::LocalAssetBackend;
use super::remote::RemoteAssetBackend;
use super::{
    AssetBackend, ConnectionState, InitError, Sleeper, StoreError, StoreResult, ThreadSleeper,
    TokenSource, UuidTokenSource,
};
use crate::config::{ReconnectPolicy, StoreConfig};
use crate::model::asset::{compose_identifier, is_valid_identifier, AssetReference, StoredAsset};
use log::{error, info, warn};
use std::time::Instant;

/// Durable storage for uploaded images, shared by concurrent requests.
pub struct AssetStore {
    backend: Box<dyn AssetBackend>,
    reconnect: ReconnectPolicy,
    sleeper: Box<dyn Sleeper>,
    tokens: Box<dyn TokenSource>,
    state: ConnectionState,
    attempts: u32,
}

impl AssetStore {
    /// Builds the configured backend and blocks until it is `Ready`.
    ///
    /// # Errors
    /// - `InitError::Config` for unusable remote settings.
    /// - `InitError::Backend` when the local directory cannot be prepared, or
    ///   the remote backend is unreachable with reconnection disabled.
    pub fn initialize(config: &StoreConfig) -> Result<Self, InitError> {
        let mut store = Self::from_config(config)?;
        store.connect()?;
        Ok(store)
    }

    /// Builds the configured backend without connecting.
    pub fn from_config(config: &StoreConfig) -> Result<Self, InitError> {
        match config {
            StoreConfig::Local { upload_dir } => Ok(Self::with_backend(
                LocalAssetBackend::new(upload_dir.clone()),
                ReconnectPolicy::disabled(),
            )),
            StoreConfig::Remote(remote) => {
                remote.validate()?;
                Ok(Self::with_backend(
                    RemoteAssetBackend::new(remote.clone()),
                    remote.reconnect,
                ))
            }
        }
    }

    /// Wraps an arbitrary backend. The store starts `Uninitialized`.
    pub fn with_backend(backend: impl AssetBackend + 'static, reconnect: ReconnectPolicy) -> Self {
        Self {
            backend: Box::new(backend),
            reconnect,
            sleeper: Box::new(ThreadSleeper),
            tokens: Box::new(UuidTokenSource),
            state: ConnectionState::Uninitialized,
            attempts: 0,
        }
    }

    /// Replaces the wait used between connection attempts.
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Replaces the source of identifier tokens.
    pub fn with_token_source(mut self, tokens: impl TokenSource + 'static) -> Self {
        self.tokens = Box::new(tokens);
        self
    }

    /// Runs the connection state machine until `Ready` or `Failed`.
    ///
    /// Calling this on a `Ready` store is a no-op. A `Failed` store starts a
    /// fresh round of attempts.
    pub fn connect(&mut self) -> Result<(), InitError> {
        if self.state == ConnectionState::Ready {
            return Ok(());
        }

        let backend = self.backend.name();
        let started_at = Instant::now();
        info!(
            "event=asset_store_connect module=asset status=start backend={} reconnect_enabled={} retry_interval_ms={}",
            backend,
            self.reconnect.enabled,
            self.reconnect.retry_interval.as_millis()
        );

        loop {
            self.state = ConnectionState::Connecting;
            self.attempts += 1;

            let err = match self.backend.connect() {
                Ok(()) => {
                    self.state = ConnectionState::Ready;
                    info!(
                        "event=asset_store_connect module=asset status=ok backend={} attempts={} duration_ms={}",
                        backend,
                        self.attempts,
                        started_at.elapsed().as_millis()
                    );
                    return Ok(());
                }
                Err(err) => err,
            };

            if !self.reconnect.enabled {
                self.state = ConnectionState::Failed;
                error!(
                    "event=asset_store_connect module=asset status=error backend={} attempts={} error_code=backend_init_failed error={}",
                    backend, self.attempts, err
                );
                return Err(InitError::Backend {
                    backend,
                    attempts: self.attempts,
                    source: err,
                });
            }

            self.state = ConnectionState::RetryWait;
            warn!(
                "event=asset_store_connect module=asset status=retry backend={} attempt={} retry_in_ms={} error={}",
                backend,
                self.attempts,
                self.reconnect.retry_interval.as_millis(),
                err
            );
            self.sleeper.sleep(self.reconnect.retry_interval);
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Total connection attempts made so far.
    pub fn connect_attempts(&self) -> u32 {
        self.attempts
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Stores an uploaded file under a freshly generated identifier.
    ///
    /// # Errors
    /// - `StoreError::NotReady` unless initialization reached `Ready`.
    /// - `StoreError::IoFailure`/`Unavailable` when the backend write fails.
    pub fn store(
        &self,
        bytes: &[u8],
        original_filename: &str,
        content_type: &str,
    ) -> StoreResult<AssetReference> {
        self.ensure_ready()?;

        let identifier = compose_identifier(&self.tokens.next_token(), original_filename);
        if !is_valid_identifier(&identifier) {
            return Err(StoreError::InvalidIdentifier(identifier));
        }

        let started_at = Instant::now();
        match self.backend.put(&identifier, bytes, content_type) {
            Ok(()) => {
                info!(
                    "event=asset_store_put module=asset status=ok backend={} identifier={} size_bytes={} duration_ms={}",
                    self.backend.name(),
                    identifier,
                    bytes.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(AssetReference {
                    identifier,
                    content_type: content_type.to_string(),
                    size_bytes: bytes.len() as u64,
                })
            }
            Err(err) => {
                error!(
                    "event=asset_store_put module=asset status=error backend={} identifier={} error={}",
                    self.backend.name(),
                    identifier,
                    err
                );
                Err(err)
            }
        }
    }

    /// Reads a stored asset back with its original content type.
    pub fn fetch(&self, identifier: &str) -> StoreResult<StoredAsset> {
        self.ensure_ready()?;
        if !is_valid_identifier(identifier) {
            return Err(StoreError::InvalidIdentifier(identifier.to_string()));
        }
        self.backend.get(identifier)
    }

    /// Path under which `identifier` is served: `/uploads/<id>` for the local
    /// backend, `/img/<id>` for the remote one.
    pub fn public_path_for(&self, identifier: &str) -> String {
        format!("{}{}", self.backend.public_prefix(), identifier)
    }

    /// Maps a request path produced by `public_path_for` back to its
    /// identifier. Returns `None` for paths owned by another backend.
    pub fn resolve_public_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        path.strip_prefix(self.backend.public_prefix())
            .filter(|identifier| !identifier.is_empty())
    }

    fn ensure_ready(&self) -> StoreResult<()> {
        if self.state == ConnectionState::Ready {
            Ok(())
        } else {
            Err(StoreError::NotReady(self.state))
        }
    }
}
