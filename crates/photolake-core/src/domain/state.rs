//! The state document
//!
//! [`State`] is the root aggregate persisted locally and in the lake: a
//! hash-keyed store of photo records plus the ordered list of albums that
//! reference them.
//!
//! ## Update style
//!
//! Every transition consumes the current value and returns the next one.
//! Transitions never lock and never perform I/O, so callers that share a
//! `State` between tasks hold their own lock for exactly one transition call.
//!
//! ## Invariants
//!
//! - An album never lists the same hash twice.
//! - After a completed sync every hash referenced by an album exists in
//!   `photos`; dangling references can only exist mid-pipeline.
//! - A photo leaves `photos` only when no album references it
//!   (see [`State::remove_photo_safe`]).

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::album::Album;
use super::errors::DomainError;
use super::newtypes::{AlbumId, ContentHash, LakeName, StateId};
use super::photo::Photo;

/// Root aggregate of a workspace
///
/// The default value is the empty document: nil id, no lake, no content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    /// Document identifier, re-stamped on every remote save
    pub id: StateId,
    /// Remote container bound to this workspace
    pub lake_name: LakeName,
    /// Canonical deduplicated photo store, keyed by content hash
    #[serde(default)]
    pub photos: BTreeMap<ContentHash, Photo>,
    /// Albums in display order
    #[serde(default)]
    pub albums: Vec<Album>,
}

impl State {
    /// Mint a fresh document with a new id and a new lake name
    #[must_use]
    pub fn new(lake_prefix: &str) -> Self {
        Self {
            id: StateId::new(),
            lake_name: LakeName::generate(lake_prefix),
            photos: BTreeMap::new(),
            albums: Vec::new(),
        }
    }

    /// Returns true for a document that was never provisioned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.is_nil()
    }

    /// Checks the structural rules a loaded document must satisfy
    ///
    /// Serde already validates every identifier; this covers the rules that
    /// span fields: a provisioned document names its lake, photo records
    /// are keyed by their own hash, album ids are unique, and no album
    /// lists a hash twice. Dangling album references are tolerated.
    ///
    /// # Errors
    /// Returns `DomainError::InconsistentState` describing the first
    /// violation found.
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.is_empty() && self.lake_name.is_empty() {
            return Err(DomainError::InconsistentState(format!(
                "state {} has no lake name",
                self.id
            )));
        }
        if let Some((key, photo)) = self.photos.iter().find(|(key, photo)| **key != photo.hash) {
            return Err(DomainError::InconsistentState(format!(
                "photo keyed {key} carries hash {}",
                photo.hash
            )));
        }
        let mut album_ids = HashSet::new();
        for album in &self.albums {
            if !album_ids.insert(album.id) {
                return Err(DomainError::InconsistentState(format!(
                    "album {} appears twice",
                    album.id
                )));
            }
            let mut seen = HashSet::new();
            if let Some(hash) = album.photos.iter().find(|hash| !seen.insert(*hash)) {
                return Err(DomainError::InconsistentState(format!(
                    "album {} lists {hash} twice",
                    album.id
                )));
            }
        }
        Ok(())
    }

    /// Returns the document with a freshly generated identifier
    #[must_use]
    pub fn restamp(mut self) -> Self {
        self.id = StateId::new();
        self
    }

    // ------------------------------------------------------------------
    // Albums
    // ------------------------------------------------------------------

    /// Appends an album at the end of the display order
    #[must_use]
    pub fn add_album(mut self, album: Album) -> Self {
        self.albums.push(album);
        self
    }

    /// Drops an album record; photos it referenced are left untouched
    #[must_use]
    pub fn remove_album(mut self, album_id: &AlbumId) -> Self {
        self.albums.retain(|album| album.id != *album_id);
        self
    }

    /// Finds an album by name or by identifier
    #[must_use]
    pub fn get_album(&self, name_or_id: &str) -> Option<&Album> {
        self.albums.iter().find(|album| album.matches(name_or_id))
    }

    /// Finds an album by identifier
    #[must_use]
    pub fn album(&self, album_id: &AlbumId) -> Option<&Album> {
        self.albums.iter().find(|album| album.id == *album_id)
    }

    /// Renames an album and/or replaces its description
    #[must_use]
    pub fn update_album_details(
        mut self,
        album_id: &AlbumId,
        name: Option<String>,
        description: Option<String>,
    ) -> Self {
        if let Some(album) = self.album_mut(album_id) {
            if let Some(name) = name {
                album.name = name;
            }
            if let Some(description) = description {
                album.description = description;
            }
            album.updated = Utc::now();
        }
        self
    }

    fn album_mut(&mut self, album_id: &AlbumId) -> Option<&mut Album> {
        self.albums.iter_mut().find(|album| album.id == *album_id)
    }

    // ------------------------------------------------------------------
    // Album membership
    // ------------------------------------------------------------------

    /// Appends `hash` to an album; a no-op if the album already lists it
    #[must_use]
    pub fn add_photo_to_album(mut self, album_id: &AlbumId, hash: &ContentHash) -> Self {
        if let Some(album) = self.album_mut(album_id) {
            if !album.contains(hash) {
                album.photos.push(hash.clone());
                album.updated = Utc::now();
            }
        }
        self
    }

    /// Removes one occurrence of `hash` from an album
    #[must_use]
    pub fn remove_photo_from_album(mut self, album_id: &AlbumId, hash: &ContentHash) -> Self {
        if let Some(album) = self.album_mut(album_id) {
            if let Some(idx) = album.photos.iter().position(|h| h == hash) {
                album.photos.remove(idx);
                album.updated = Utc::now();
            }
        }
        self
    }

    // ------------------------------------------------------------------
    // Photo store
    // ------------------------------------------------------------------

    /// Inserts or replaces the record stored under the photo's hash
    #[must_use]
    pub fn persist_photo(mut self, photo: Photo) -> Self {
        self.photos.insert(photo.hash.clone(), photo);
        self
    }

    /// Looks up a photo record by content hash
    #[must_use]
    pub fn get_photo(&self, hash: &ContentHash) -> Option<&Photo> {
        self.photos.get(hash)
    }

    /// Number of album memberships of `hash` across all albums
    #[must_use]
    pub fn occurrences(&self, hash: &ContentHash) -> usize {
        self.albums
            .iter()
            .map(|album| album.photos.iter().filter(|h| *h == hash).count())
            .sum()
    }

    /// Deletes a photo from the global store only when no album references it
    #[must_use]
    pub fn remove_photo_safe(mut self, hash: &ContentHash) -> Self {
        if self.occurrences(hash) == 0 {
            self.photos.remove(hash);
        }
        self
    }

    /// Photo records of an album in display order, skipping dangling hashes
    pub fn album_photos<'a>(&'a self, album: &'a Album) -> impl Iterator<Item = &'a Photo> + 'a {
        album.photos.iter().filter_map(|hash| self.photos.get(hash))
    }

    /// Album references whose hash has no record in the photo store
    #[must_use]
    pub fn dangling_references(&self) -> Vec<(AlbumId, ContentHash)> {
        self.albums
            .iter()
            .flat_map(|album| {
                album
                    .photos
                    .iter()
                    .filter(|hash| !self.photos.contains_key(*hash))
                    .map(|hash| (album.id, hash.clone()))
            })
            .collect()
    }
}
