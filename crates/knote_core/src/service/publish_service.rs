//! Publish/upload use-case service.
//!
//! # Responsibility
//! - Validate the shape of an inbound note form submission.
//! - Upload: store the asset and append an image embed to the description.
//! - Publish: render the description and persist it as a note.
//!
//! # Invariants
//! - Each request performs at most one side effect (one asset OR one note).
//! - Rejected requests never touch the asset store or note repository.
//! - The returned note list is always read after the side effect, newest
//!   first, and must not be re-sorted by callers.
//! - Once the side effect is committed the request succeeds; a failing
//!   follow-up listing only clears `notes_listed`.

use crate::asset::store::AssetStore;
use crate::asset::StoreError;
use crate::model::asset::{image_embed, AssetReference, StoredAsset};
use crate::model::note::Note;
use crate::render::markup::render_markup;
use crate::repo::note_repo::{NoteRepository, RepoError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// What the submitter asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishAction {
    Publish,
    Upload,
    None,
}

impl PublishAction {
    /// Decodes the two form flags. Setting both is rejected because the
    /// service handles a single action per request.
    pub fn from_flags(publish: bool, upload: bool) -> Result<Self, RequestError> {
        match (publish, upload) {
            (true, true) => Err(RequestError::ConflictingActions),
            (true, false) => Ok(Self::Publish),
            (false, true) => Ok(Self::Upload),
            (false, false) => Ok(Self::None),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Upload => "upload",
            Self::None => "none",
        }
    }
}

/// Uploaded file as decoded by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

/// One decoded note form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub action: PublishAction,
    pub description: String,
    pub file: Option<UploadedFile>,
}

impl PublishRequest {
    pub fn publish(description: impl Into<String>) -> Self {
        Self {
            action: PublishAction::Publish,
            description: description.into(),
            file: None,
        }
    }

    pub fn upload(description: impl Into<String>, file: UploadedFile) -> Self {
        Self {
            action: PublishAction::Upload,
            description: description.into(),
            file: Some(file),
        }
    }
}

/// State handed back to the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    /// All notes, most recent first.
    pub notes: Vec<Note>,
    /// `false` when the listing after a committed write failed; `notes` is
    /// then empty.
    pub notes_listed: bool,
    /// Description to show in the form: empty after a publish, extended with
    /// an image embed after an upload.
    pub description: String,
    pub created_note: Option<Note>,
    pub asset: Option<AssetReference>,
}

/// User-input error; the request had no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    NoActionSpecified,
    /// Upload requested without a named file.
    InvalidFile,
    ConflictingActions,
}

impl Display for RequestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoActionSpecified => write!(f, "either publish or upload must be requested"),
            Self::InvalidFile => write!(f, "upload requires a file with a name"),
            Self::ConflictingActions => write!(f, "publish and upload cannot be combined"),
        }
    }
}

impl Error for RequestError {}

/// Service error for publish/upload use-cases.
#[derive(Debug)]
pub enum PublishError {
    Request(RequestError),
    Asset(StoreError),
    Notes(RepoError),
}

impl Display for PublishError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(err) => write!(f, "rejected request: {err}"),
            Self::Asset(err) => write!(f, "{err}"),
            Self::Notes(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PublishError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Request(err) => Some(err),
            Self::Asset(err) => Some(err),
            Self::Notes(err) => Some(err),
        }
    }
}

impl From<RequestError> for PublishError {
    fn from(value: RequestError) -> Self {
        Self::Request(value)
    }
}

impl From<StoreError> for PublishError {
    fn from(value: StoreError) -> Self {
        Self::Asset(value)
    }
}

impl From<RepoError> for PublishError {
    fn from(value: RepoError) -> Self {
        Self::Notes(value)
    }
}

/// Publish pipeline over a note repository and an initialized asset store.
pub struct PublishService<R: NoteRepository> {
    notes: R,
    assets: AssetStore,
}

impl<R: NoteRepository> PublishService<R> {
    pub fn new(notes: R, assets: AssetStore) -> Self {
        Self { notes, assets }
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Lists all notes, most recent first.
    pub fn index(&self) -> Result<Vec<Note>, PublishError> {
        Ok(self.notes.list_all()?)
    }

    /// Handles one form submission.
    ///
    /// # Errors
    /// - `RequestError` for malformed submissions (nothing is stored).
    /// - `StoreError`/`RepoError` when the single side effect fails.
    pub fn handle(&self, request: PublishRequest) -> Result<PublishOutcome, PublishError> {
        let action = request.action;
        let result = match action {
            PublishAction::None => Err(RequestError::NoActionSpecified.into()),
            PublishAction::Upload => self.upload(request.description, request.file),
            PublishAction::Publish => self.publish(request.description),
        };

        match &result {
            Ok(outcome) => info!(
                "event=publish_request module=service status=ok action={} note_created={} asset_stored={}",
                action.as_str(),
                outcome.created_note.is_some(),
                outcome.asset.is_some()
            ),
            Err(err) => warn!(
                "event=publish_request module=service status=error action={} error={}",
                action.as_str(),
                err
            ),
        }
        result
    }

    /// Serves an asset by the path `public_path_for` produced.
    pub fn asset(&self, public_path: &str) -> Result<StoredAsset, PublishError> {
        let identifier = self
            .assets
            .resolve_public_path(public_path)
            .ok_or_else(|| StoreError::NotFound(public_path.to_string()))?;
        Ok(self.assets.fetch(identifier)?)
    }

    fn upload(
        &self,
        description: String,
        file: Option<UploadedFile>,
    ) -> Result<PublishOutcome, PublishError> {
        let file = file
            .filter(|file| !file.filename.trim().is_empty())
            .ok_or(RequestError::InvalidFile)?;

        let asset = self
            .assets
            .store(&file.bytes, file.filename.trim(), &file.content_type)?;
        let embed = image_embed(&self.assets.public_path_for(&asset.identifier));

        let (notes, notes_listed) = self.notes_after_write();
        Ok(PublishOutcome {
            notes,
            notes_listed,
            description: format!("{description} {embed}"),
            created_note: None,
            asset: Some(asset),
        })
    }

    fn publish(&self, description: String) -> Result<PublishOutcome, PublishError> {
        if description.trim().is_empty() {
            return Ok(PublishOutcome {
                notes: self.notes.list_all()?,
                notes_listed: true,
                description,
                created_note: None,
                asset: None,
            });
        }

        let note = self.notes.save(&render_markup(&description))?;
        let (notes, notes_listed) = self.notes_after_write();
        Ok(PublishOutcome {
            notes,
            notes_listed,
            description: String::new(),
            created_note: Some(note),
            asset: None,
        })
    }

    /// Lists notes after a committed write; failures are logged, not returned.
    fn notes_after_write(&self) -> (Vec<Note>, bool) {
        match self.notes.list_all() {
            Ok(notes) => (notes, true),
            Err(err) => {
                warn!(
                    "event=publish_listing module=service status=error error_code=list_after_write_failed error={}",
                    err
                );
                (Vec::new(), false)
            }
        }
    }
}
