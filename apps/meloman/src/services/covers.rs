//! Playlist cover storage on the local filesystem.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Extensions accepted for covers.
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Subdirectory of the uploads dir holding playlist covers.
const COVERS_SUBDIR: &str = "playlists";

#[derive(Debug, Error)]
pub enum CoverError {
    #[error("Unsupported image type, use one of: jpg, jpeg, png, gif, webp")]
    UnsupportedType,

    #[error("Image is too large (max {max} bytes)")]
    TooLarge { max: usize },

    #[error("Failed to store cover: {0}")]
    Io(#[from] std::io::Error),
}

/// Stores uploaded covers under `<root>/playlists/<uuid>.<ext>`.
#[derive(Debug, Clone)]
pub struct CoverStore {
    root: PathBuf,
    max_bytes: usize,
}

impl CoverStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    /// Directory served under `/uploads`.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validates and writes an uploaded image.
    ///
    /// Returns the path relative to the uploads root, as stored in
    /// `playlists.cover`.
    pub async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<String, CoverError> {
        let ext = image_extension(file_name).ok_or(CoverError::UnsupportedType)?;
        if bytes.len() > self.max_bytes {
            return Err(CoverError::TooLarge {
                max: self.max_bytes,
            });
        }

        let dir = self.root.join(COVERS_SUBDIR);
        tokio::fs::create_dir_all(&dir).await?;

        let name = format!("{}.{}", uuid::Uuid::new_v4(), ext);
        tokio::fs::write(dir.join(&name), bytes).await?;

        let relative = format!("{}/{}", COVERS_SUBDIR, name);
        tracing::debug!(cover = %relative, size = bytes.len(), "Stored playlist cover");
        Ok(relative)
    }

    /// Deletes a stored cover. Failures are logged, never returned.
    pub async fn remove(&self, relative: &str) {
        let Some(path) = self.resolve(relative) else {
            tracing::warn!(cover = %relative, "Refusing to delete cover outside uploads dir");
            return;
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(cover = %relative, "Removed playlist cover"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(cover = %relative, "Failed to remove cover: {}", e),
        }
    }

    /// Joins a stored relative path onto the root, rejecting anything that
    /// could leave it.
    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        (safe && !relative.as_os_str().is_empty()).then(|| self.root.join(relative))
    }
}

/// Lowercased extension of `file_name` if it names a supported image type.
fn image_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    let is_image = mime_guess::from_ext(&ext)
        .first()
        .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE);

    (ALLOWED_EXTENSIONS.contains(&ext.as_str()) && is_image).then_some(ext)
}
