//! Sync differ
//!
//! Compares the photos found in a source folder with the current membership
//! of one album and decides what the pipeline has to do:
//!
//! | folder hash | global store | in album | outcome |
//! |---|---|---|---|
//! | present | absent | - | create (one job per size) |
//! | present | present | no | attach, no storage work |
//! | present | present | yes | nothing |
//! | absent | present, only this album | yes | remove (one job per size) |
//! | absent | shared or dangling | yes | detach, no storage work |
//!
//! Planning works on a snapshot of the state and never mutates it.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use photolake_core::domain::{Album, ContentHash, Photo, PhotoSize, State};
use tracing::{debug, instrument};

use crate::scanner::SourcePhoto;
use crate::Result;

/// Upload of one size variant of a new photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationJob {
    /// File the variant is produced from
    pub source: PathBuf,
    pub photo: Photo,
    pub size: PhotoSize,
}

/// Deletion of one size variant of a photo leaving the lake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalJob {
    pub photo: Photo,
    pub size: PhotoSize,
}

impl RemovalJob {
    /// One job per size variant of `photo`, original first
    pub fn for_all_sizes(photo: &Photo) -> impl Iterator<Item = RemovalJob> + '_ {
        PhotoSize::ALL.into_iter().map(move |size| RemovalJob {
            photo: photo.clone(),
            size,
        })
    }
}

/// Everything a sync run has to do for one album
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub creations: Vec<CreationJob>,
    pub removals: Vec<RemovalJob>,
    /// Stored photos joining the album without any upload
    pub attachments: Vec<Photo>,
    /// Album references dropped without deleting anything from storage
    pub detachments: Vec<ContentHash>,
}

impl SyncPlan {
    /// True when the run would not change the album
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creations.is_empty()
            && self.removals.is_empty()
            && self.attachments.is_empty()
            && self.detachments.is_empty()
    }

    /// Photos that will be uploaded, one entry per photo
    pub fn uploads(&self) -> impl Iterator<Item = &Photo> {
        self.creations
            .iter()
            .filter(|job| job.size.is_original())
            .map(|job| &job.photo)
    }

    /// Photos whose stored variants will be deleted, one entry per photo
    pub fn deletions(&self) -> impl Iterator<Item = &Photo> {
        self.removals
            .iter()
            .filter(|job| job.size.is_original())
            .map(|job| &job.photo)
    }

    /// Number of photos joining the album
    #[must_use]
    pub fn added(&self) -> usize {
        self.uploads().count() + self.attachments.len()
    }

    /// Number of photos leaving the album
    #[must_use]
    pub fn removed(&self) -> usize {
        self.deletions().count() + self.detachments.len()
    }
}

impl fmt::Display for SyncPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} removed, {} added", self.removed(), self.added())
    }
}

/// Hashes `files` and plans the sync of `album` against them
///
/// Files without an image signature are ignored.
///
/// # Errors
/// Returns the first read or hashing error; no partial plan is produced.
#[instrument(skip_all, fields(album = %album.name, files = files.len()))]
pub async fn compute_sync_plan(
    files: &[PathBuf],
    state: &State,
    album: &Album,
) -> Result<SyncPlan> {
    let mut sources = Vec::with_capacity(files.len());
    for path in files {
        if let Some(source) = SourcePhoto::load(path).await? {
            sources.push(source);
        }
    }
    let plan = plan(&sources, state, album);
    debug!(
        creations = plan.creations.len(),
        removals = plan.removals.len(),
        attachments = plan.attachments.len(),
        detachments = plan.detachments.len(),
        "sync plan computed"
    );
    Ok(plan)
}

/// Plans the sync of `album` against already-hashed source photos
#[must_use]
pub fn plan(sources: &[SourcePhoto], state: &State, album: &Album) -> SyncPlan {
    let mut plan = SyncPlan::default();
    let mut folder = HashSet::new();

    for source in sources {
        if !folder.insert(source.hash.clone()) {
            continue;
        }
        match state.get_photo(&source.hash) {
            // The stored record wins; name and extension are not refreshed.
            Some(existing) => {
                if !album.contains(&existing.hash) {
                    plan.attachments.push(existing.clone());
                }
            }
            None => {
                let photo = source.to_photo();
                plan.creations
                    .extend(PhotoSize::ALL.into_iter().map(|size| CreationJob {
                        source: source.path.clone(),
                        photo: photo.clone(),
                        size,
                    }));
            }
        }
    }

    for hash in album.photos.iter().filter(|hash| !folder.contains(*hash)) {
        match state.get_photo(hash) {
            Some(photo) if state.occurrences(hash) <= 1 => {
                plan.removals.extend(RemovalJob::for_all_sizes(photo));
            }
            _ => plan.detachments.push(hash.clone()),
        }
    }

    plan
}
