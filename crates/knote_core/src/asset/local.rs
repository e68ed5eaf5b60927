//! Local filesystem asset backend.
//!
//! # Responsibility
//! - Keep uploaded assets as plain files inside one upload directory so they
//!   can be served from `/uploads/*`.
//! - Remember each asset's original content type in a sidecar file under
//!   `.meta/`.
//!
//! # Invariants
//! - Asset files appear atomically: bytes are written to a temporary name and
//!   renamed into place.
//! - The content-type sidecar is written before the asset file.

use super::{content_type_for_identifier, AssetBackend, StoreError, StoreResult};
use crate::model::asset::StoredAsset;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const META_DIR: &str = ".meta";
const WRITE_PROBE_FILE: &str = ".knote-write-probe";

/// Asset backend writing into a local directory.
#[derive(Debug, Clone)]
pub struct LocalAssetBackend {
    upload_dir: PathBuf,
}

impl LocalAssetBackend {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    fn asset_path(&self, identifier: &str) -> PathBuf {
        self.upload_dir.join(identifier)
    }

    fn meta_path(&self, identifier: &str) -> PathBuf {
        self.upload_dir.join(META_DIR).join(identifier)
    }

    fn with_dir_context(&self, err: std::io::Error) -> StoreError {
        StoreError::IoFailure(std::io::Error::new(
            err.kind(),
            format!("upload directory `{}`: {err}", self.upload_dir.display()),
        ))
    }
}

impl AssetBackend for LocalAssetBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn public_prefix(&self) -> &'static str {
        "/uploads/"
    }

    fn connect(&mut self) -> StoreResult<()> {
        fs::create_dir_all(self.upload_dir.join(META_DIR))
            .map_err(|err| self.with_dir_context(err))?;

        // Writability is checked with a real file.
        let probe = self.upload_dir.join(WRITE_PROBE_FILE);
        fs::write(&probe, b"").map_err(|err| self.with_dir_context(err))?;
        fs::remove_file(&probe).map_err(|err| self.with_dir_context(err))?;
        Ok(())
    }

    fn put(&self, identifier: &str, bytes: &[u8], content_type: &str) -> StoreResult<()> {
        fs::write(self.meta_path(identifier), content_type.as_bytes())?;

        let final_path = self.asset_path(identifier);
        let temp_path = self.upload_dir.join(format!(".{identifier}.part"));
        let result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&temp_path, &final_path)
        })();

        if let Err(err) = result {
            let _ = fs::remove_file(&temp_path);
            let _ = fs::remove_file(self.meta_path(identifier));
            return Err(err.into());
        }
        Ok(())
    }

    fn get(&self, identifier: &str) -> StoreResult<StoredAsset> {
        let bytes = match fs::read(self.asset_path(identifier)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(identifier.to_string()))
            }
            Err(err) => return Err(err.into()),
        };

        let content_type = match fs::read_to_string(self.meta_path(identifier)) {
            Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
            Ok(_) => content_type_for_identifier(identifier).to_string(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                content_type_for_identifier(identifier).to_string()
            }
            Err(err) => return Err(err.into()),
        };

        Ok(StoredAsset {
            bytes,
            content_type,
        })
    }
}
