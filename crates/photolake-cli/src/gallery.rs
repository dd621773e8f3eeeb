//! Manifest gallery renderer
//!
//! Publishes the reconciled state as JSON manifests next to the photos:
//! `<album-id>/index.json` per album and a root `index.json` listing every
//! album. A static front end reads these; no HTML is produced here.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use photolake_core::domain::{Album, PhotoSize, State};
use photolake_core::ports::{IGalleryRenderer, IStorageProvider, StorageError};
use serde::Serialize;
use tracing::debug;

/// Object name of a manifest inside its directory
pub const MANIFEST_NAME: &str = "index.json";

/// Public URL of an album's manifest
pub fn album_url(base_url: &str, album: &Album) -> String {
    format!("{base_url}/{}{MANIFEST_NAME}", album.artifact_prefix())
}

#[derive(Debug, Serialize)]
struct PhotoEntry {
    hash: String,
    name: String,
    sizes: BTreeMap<PhotoSize, String>,
}

#[derive(Debug, Serialize)]
struct AlbumManifest<'a> {
    id: String,
    name: &'a str,
    description: &'a str,
    updated: chrono::DateTime<chrono::Utc>,
    photos: Vec<PhotoEntry>,
}

#[derive(Debug, Serialize)]
struct IndexEntry<'a> {
    id: String,
    name: &'a str,
    photos: usize,
    url: String,
}

#[derive(Debug, Serialize)]
struct IndexManifest<'a> {
    albums: Vec<IndexEntry<'a>>,
}

/// Gallery renderer writing JSON manifests to the bound lake
pub struct ManifestGalleryRenderer {
    storage: Arc<dyn IStorageProvider>,
}

impl ManifestGalleryRenderer {
    pub fn new(storage: Arc<dyn IStorageProvider>) -> Self {
        Self { storage }
    }

    fn album_manifest<'a>(&self, state: &'a State, album: &'a Album) -> AlbumManifest<'a> {
        let base = self.storage.lake_base_url();
        let photos = state
            .album_photos(album)
            .map(|photo| PhotoEntry {
                hash: photo.hash.to_string(),
                name: photo.name.clone(),
                sizes: PhotoSize::ALL
                    .iter()
                    .map(|&size| (size, format!("{base}/{}", photo.raw_filename(size))))
                    .collect(),
            })
            .collect();
        AlbumManifest {
            id: album.id.to_string(),
            name: &album.name,
            description: &album.description,
            updated: album.updated,
            photos,
        }
    }

    async fn render_index(&self, state: &State) -> Result<()> {
        let base = self.storage.lake_base_url();
        let index = IndexManifest {
            albums: state
                .albums
                .iter()
                .map(|album| IndexEntry {
                    id: album.id.to_string(),
                    name: &album.name,
                    photos: album.photos.len(),
                    url: album_url(&base, album),
                })
                .collect(),
        };
        self.upload_json(MANIFEST_NAME, &index).await
    }

    async fn upload_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let body = serde_json::to_vec_pretty(value).context("Failed to serialize manifest")?;
        self.storage
            .upload_file(name, &body)
            .await
            .with_context(|| format!("Failed to upload {name}"))?;
        debug!(name, bytes = body.len(), "manifest published");
        Ok(())
    }
}

#[async_trait::async_trait]
impl IGalleryRenderer for ManifestGalleryRenderer {
    async fn render(&self, state: &State, album: &Album) -> Result<()> {
        let manifest = self.album_manifest(state, album);
        let name = format!("{}{MANIFEST_NAME}", album.artifact_prefix());
        self.upload_json(&name, &manifest).await?;
        self.render_index(state).await
    }

    async fn remove_album(&self, state: &State, album: &Album) -> Result<()> {
        let name = format!("{}{MANIFEST_NAME}", album.artifact_prefix());
        match self.storage.remove_file(&name).await {
            Ok(()) | Err(StorageError::NotExist(_)) => {}
            Err(e) => return Err(e).with_context(|| format!("Failed to remove {name}")),
        }
        self.render_index(state).await
    }
}
