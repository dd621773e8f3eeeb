//! Album entity
//!
//! An album is an ordered list of content hashes. It references photos in
//! the state's global store and never owns photo data itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{AlbumId, ContentHash};

/// A named, ordered collection of photos
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    /// Immutable identifier, generated once
    pub id: AlbumId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Member hashes in display order; never contains duplicates
    #[serde(default)]
    pub photos: Vec<ContentHash>,
}

impl Album {
    /// Create an empty album with a fresh identifier
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AlbumId::new(),
            name: name.into(),
            description: String::new(),
            created: now,
            updated: now,
            photos: Vec::new(),
        }
    }

    /// Builder-style description setter
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns true if the album lists `hash`
    #[must_use]
    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.photos.contains(hash)
    }

    /// Returns true when the album holds no photos
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    /// Prefix under which gallery artifacts for this album are stored
    #[must_use]
    pub fn artifact_prefix(&self) -> String {
        format!("{}/", self.id)
    }

    /// Matches either the album name or its identifier
    #[must_use]
    pub fn matches(&self, name_or_id: &str) -> bool {
        self.name == name_or_id || self.id.to_string() == name_or_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_album_is_empty() {
        let album = Album::new("Holidays").with_description("Summer 2024");
        assert!(album.is_empty());
        assert_eq!(album.name, "Holidays");
        assert_eq!(album.description, "Summer 2024");
        assert_eq!(album.created, album.updated);
    }

    #[test]
    fn matches_by_name_or_id() {
        let album = Album::new("Holidays");
        assert!(album.matches("Holidays"));
        assert!(album.matches(&album.id.to_string()));
        assert!(!album.matches("holidays"));
    }

    #[test]
    fn artifact_prefix_uses_id() {
        let album = Album::new("Holidays");
        assert_eq!(album.artifact_prefix(), format!("{}/", album.id));
    }
}
