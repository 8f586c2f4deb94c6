//! Storage for uploaded publication images and member avatars.
//!
//! Files live under the uploads directory in per-kind subdirectories and
//! are addressed by relative paths such as `publications/<uuid>.jpg`,
//! which is what the database columns store and the `/uploads/*` route
//! serves.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// 10 MB upload cap.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unsupported file extension: {0}")]
    InvalidExtension(String),
    #[error("file exceeds the {MAX_UPLOAD_BYTES} byte limit")]
    TooLarge,
    #[error("invalid media path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct MediaService {
    root: PathBuf,
}

impl MediaService {
    pub fn new() -> Self {
        Self::with_root(utils::assets::uploads_dir())
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store an article image. Returns the relative path for the
    /// `image_path` column.
    pub fn store_publication_image(
        &self,
        publication_id: Uuid,
        original_filename: &str,
        data: &[u8],
    ) -> Result<String, MediaError> {
        self.store("publications", publication_id, original_filename, data)
    }

    /// Store a member avatar. Returns the relative path for the
    /// `avatar_path` column.
    pub fn store_avatar(
        &self,
        member_id: Uuid,
        original_filename: &str,
        data: &[u8],
    ) -> Result<String, MediaError> {
        self.store("avatars", member_id, original_filename, data)
    }

    fn store(
        &self,
        kind: &str,
        owner_id: Uuid,
        original_filename: &str,
        data: &[u8],
    ) -> Result<String, MediaError> {
        if data.len() > MAX_UPLOAD_BYTES {
            return Err(MediaError::TooLarge);
        }
        let extension = validate_extension(original_filename)?;

        let dir = self.root.join(kind);
        std::fs::create_dir_all(&dir)?;

        // One file per owner: replacing an upload removes the old variant
        // even when the extension changed
        self.remove_existing(kind, owner_id)?;

        let filename = format!("{}.{extension}", owner_id.simple());
        std::fs::write(dir.join(&filename), data)?;

        let relative = format!("{kind}/{filename}");
        info!(path = %relative, bytes = data.len(), "Stored upload");
        Ok(relative)
    }

    /// Delete a stored file by its relative path. Missing files are not an
    /// error; permanent deletes are best-effort about media.
    pub fn delete(&self, relative_path: &str) -> Result<(), MediaError> {
        let resolved = self.resolve(relative_path)?;
        match std::fs::remove_file(&resolved) {
            Ok(()) => {
                info!(path = %relative_path, "Deleted upload");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Map a relative path to a file under the uploads root, rejecting
    /// traversal.
    pub fn resolve(&self, relative_path: &str) -> Result<PathBuf, MediaError> {
        let candidate = Path::new(relative_path);
        let safe = candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || relative_path.is_empty() {
            return Err(MediaError::InvalidPath);
        }
        Ok(self.root.join(candidate))
    }

    fn remove_existing(&self, kind: &str, owner_id: Uuid) -> Result<(), MediaError> {
        let stem = owner_id.simple().to_string();
        for ext in ALLOWED_EXTENSIONS {
            let path = self.root.join(kind).join(format!("{stem}.{ext}"));
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = ?e, "Failed to remove old upload");
                }
            }
        }
        Ok(())
    }
}

impl Default for MediaService {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_extension(filename: &str) -> Result<String, MediaError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(MediaError::InvalidExtension(extension))
    }
}
