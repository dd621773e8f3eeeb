//! Source folder scanning
//!
//! Finds the photos in a folder (non-recursively) and turns each into a
//! [`SourcePhoto`]: path, display name, detected extension and content hash.

use std::path::{Path, PathBuf};

use photolake_core::domain::{ContentHash, Photo};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument, trace};

use crate::hasher::hash_file;
use crate::Result;

/// Bytes read from the start of a file for format sniffing
const SNIFF_LEN: usize = 261;

/// A photo found in a source folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePhoto {
    /// Absolute path of the file
    pub path: PathBuf,
    /// File name without its extension
    pub name: String,
    /// Extension of the detected image format
    pub extension: String,
    pub hash: ContentHash,
}

impl SourcePhoto {
    /// Sniffs and hashes the file at `path`
    ///
    /// Returns `Ok(None)` when the file does not carry an image signature.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        let Some(extension) = sniff_extension(path).await? else {
            return Ok(None);
        };
        let hash = hash_file(path).await?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Some(Self {
            path: path.to_path_buf(),
            name,
            extension: extension.to_string(),
            hash,
        }))
    }

    /// A fresh photo record for this file, not yet uploaded
    #[must_use]
    pub fn to_photo(&self) -> Photo {
        Photo::new(self.name.clone(), self.extension.clone(), self.hash.clone())
    }
}

/// Lists the image files directly inside `dir`, sorted by path
///
/// Subdirectories are skipped and files are kept only when their leading
/// bytes carry a known image signature.
///
/// # Errors
/// Returns an error if the directory or one of its files cannot be read.
#[instrument(fields(dir = %dir.display()))]
pub async fn directory_photos(dir: &Path) -> Result<Vec<PathBuf>> {
    let dir = tokio::fs::canonicalize(dir).await?;
    let mut entries = tokio::fs::read_dir(&dir).await?;
    let mut paths = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            continue;
        }
        let path = entry.path();
        if sniff_extension(&path).await?.is_some() {
            paths.push(path);
        } else {
            trace!(path = %path.display(), "not an image, skipping");
        }
    }

    paths.sort();
    debug!(count = paths.len(), "photos found");
    Ok(paths)
}

/// Canonical extension of the image format found at the start of `path`
async fn sniff_extension(path: &Path) -> Result<Option<&'static str>> {
    let file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
    Ok(detect_extension(&head))
}

/// Canonical extension for an image signature, if `head` starts with one
#[must_use]
pub fn detect_extension(head: &[u8]) -> Option<&'static str> {
    image::guess_format(head)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
}
