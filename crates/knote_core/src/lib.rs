//! Core domain logic for knote.
//!
//! Notes are rendered from markdown into sanitized HTML, stored append-only in
//! SQLite and listed newest first. Uploaded images go through an `AssetStore`
//! backed by a local directory or an S3-compatible bucket.

pub mod asset;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod render;
pub mod repo;
pub mod service;

pub use asset::local::LocalAssetBackend;
pub use asset::remote::RemoteAssetBackend;
pub use asset::store::AssetStore;
pub use asset::{
    AssetBackend, ConnectionState, InitError, Sleeper, StoreError, StoreResult, ThreadSleeper,
    TokenSource, UuidTokenSource,
};
pub use config::{AppConfig, ConfigError, ReconnectPolicy, RemoteStoreConfig, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::asset::{AssetReference, StoredAsset};
pub use model::note::{Note, NoteId};
pub use render::markup::render_markup;
pub use repo::note_repo::{NoteRepository, RepoError, RepoResult, SqliteNoteRepository};
pub use service::publish_service::{
    PublishAction, PublishError, PublishOutcome, PublishRequest, PublishService, RequestError,
    UploadedFile,
};

/// Minimal health-check API for startup probes.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
