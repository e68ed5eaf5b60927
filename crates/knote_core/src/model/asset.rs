//! Uploaded asset model and identifier construction.
//!
//! # Invariants
//! - Identifiers are `<token>` or `<token>.<extension>`, where the extension is
//!   everything after the first `.` of the uploaded filename.
//! - Identifiers never contain path separators.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EXTENSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid extension regex"));
static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*(\.[A-Za-z0-9][A-Za-z0-9._-]*)?$")
        .expect("valid identifier regex")
});

/// Reference to an asset persisted by the asset store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetReference {
    pub identifier: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// Asset payload returned by retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Returns the extension part of an uploaded filename.
///
/// The extension is the substring after the first `.`; `cat.tar.gz` yields
/// `tar.gz`. Returns `None` when there is no dot or when the remainder holds
/// characters that are unsafe in a storage key.
pub fn original_extension(filename: &str) -> Option<&str> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (_, extension) = name.split_once('.')?;
    if extension.contains("..") || !EXTENSION_RE.is_match(extension) {
        return None;
    }
    Some(extension)
}

/// Builds an asset identifier from a random token and the uploaded filename.
pub fn compose_identifier(token: &str, filename: &str) -> String {
    match original_extension(filename) {
        Some(extension) => format!("{token}.{extension}"),
        None => token.to_string(),
    }
}

/// Returns whether `identifier` is safe to use as a file name or object key.
pub fn is_valid_identifier(identifier: &str) -> bool {
    !identifier.contains("..") && IDENTIFIER_RE.is_match(identifier)
}

/// Markdown image syntax embedding `path`.
pub fn image_embed(path: &str) -> String {
    format!("![]({path})")
}
