//! Photo records and size variants
//!
//! A [`Photo`] is the canonical, deduplicated record for one piece of content.
//! Each photo is stored remotely once per [`PhotoSize`]; only the original
//! variant is tracked in the state document, the derived sizes are pure
//! storage artifacts keyed off the same hash.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::ContentHash;

/// File extension used for every derived (re-encoded) size variant
pub const DERIVED_EXTENSION: &str = "jpg";

/// A photograph stored in the lake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    /// Original filename with the extension stripped
    pub name: String,
    /// Extension of the detected image format (e.g. `jpg`, `png`)
    pub extension: String,
    /// Content identifier
    pub hash: ContentHash,
    /// Public URL of the original-size artifact, set once it is uploaded
    #[serde(default)]
    pub url: Option<String>,
}

impl Photo {
    /// Create a photo record that has not been uploaded yet
    pub fn new(name: impl Into<String>, extension: impl Into<String>, hash: ContentHash) -> Self {
        Self {
            name: name.into(),
            extension: extension.into(),
            hash,
            url: None,
        }
    }

    /// Returns a copy of this record carrying the given public URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Object name of a size variant inside the lake
    ///
    /// The original keeps its own extension (`<hash>.<ext>`); derived sizes
    /// are always JPEG (`<hash>-<size>.jpg`).
    #[must_use]
    pub fn raw_filename(&self, size: PhotoSize) -> String {
        match size {
            PhotoSize::Original => format!("{}.{}", self.hash, self.extension),
            _ => format!("{}-{}.{}", self.hash, size, DERIVED_EXTENSION),
        }
    }

    /// Local filename used when downloading the original (`<name>.<ext>`)
    #[must_use]
    pub fn download_filename(&self) -> String {
        format!("{}.{}", self.name, self.extension)
    }
}

// ============================================================================
// Size variants
// ============================================================================

/// How an image is scaled into its target box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FitMode {
    /// Scale down to fit inside the box, preserving aspect ratio
    Fit,
    /// Scale and center-crop so the box is completely filled
    Fill,
}

/// Target dimensions for a derived size variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResizeSpec {
    pub width: u32,
    pub height: u32,
    pub fit: FitMode,
}

/// The fixed set of size variants produced for every photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhotoSize {
    Original,
    Thumbnail,
    ThumbnailCropped,
    Small,
    Medium,
    Large,
}

impl PhotoSize {
    /// Every variant, original first
    pub const ALL: [PhotoSize; 6] = [
        PhotoSize::Original,
        PhotoSize::Thumbnail,
        PhotoSize::ThumbnailCropped,
        PhotoSize::Small,
        PhotoSize::Medium,
        PhotoSize::Large,
    ];

    /// Resize target for this variant; `None` for the original
    #[must_use]
    pub const fn resize_spec(self) -> Option<ResizeSpec> {
        let (width, height, fit) = match self {
            PhotoSize::Original => return None,
            PhotoSize::Thumbnail => (250, 250, FitMode::Fit),
            PhotoSize::ThumbnailCropped => (250, 250, FitMode::Fill),
            PhotoSize::Small => (650, 650, FitMode::Fit),
            PhotoSize::Medium => (1400, 1400, FitMode::Fit),
            PhotoSize::Large => (3500, 3500, FitMode::Fit),
        };
        Some(ResizeSpec { width, height, fit })
    }

    /// Returns true for the original (untranscoded) variant
    #[must_use]
    pub const fn is_original(self) -> bool {
        matches!(self, PhotoSize::Original)
    }

    /// Variant name as used in artifact names
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PhotoSize::Original => "original",
            PhotoSize::Thumbnail => "thumbnail",
            PhotoSize::ThumbnailCropped => "thumbnail-cropped",
            PhotoSize::Small => "small",
            PhotoSize::Medium => "medium",
            PhotoSize::Large => "large",
        }
    }
}

impl Display for PhotoSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhotoSize {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhotoSize::ALL
            .into_iter()
            .find(|size| size.as_str() == s)
            .ok_or_else(|| DomainError::UnknownSize(s.to_string()))
    }
}
