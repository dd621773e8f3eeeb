//! Pipeline executor
//!
//! Runs the jobs of a [`SyncPlan`], an album removal, or an album download
//! over a [`WorkerPool`].
//!
//! ## Creation jobs
//!
//! Each (photo, size) pair walks a small state machine inside one worker
//! slot:
//!
//! ```text
//! Pending --resize--> Resized --upload--> Uploaded --cleanup--> Cleaned --> Done
//! ```
//!
//! The original size skips transcoding and uploads the source file itself.
//! Cancellation is checked before every transition; a job stops at the
//! first boundary after the token fires and reports itself as cancelled.
//! Scratch directories are removed on drop either way.
//!
//! ## Shared state
//!
//! Workers share one [`State`] behind a mutex. The lock is taken only to
//! apply a single transition after an original-size upload or deletion and
//! is never held across an await point.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use photolake_core::config::PipelineConfig;
use photolake_core::domain::{AlbumId, ContentHash, Photo, PhotoSize, State};
use photolake_core::ports::{IImageTranscoder, IStorageProvider};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::differ::{CreationJob, RemovalJob, SyncPlan};
use crate::pool::{PoolReport, WorkerPool};
use crate::retry::RetryPolicy;
use crate::{Result, SyncError};

// ============================================================================
// Job outcomes
// ============================================================================

/// What a failed job was doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Create,
    Remove,
    Download,
}

/// Stage at which a job stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStage {
    Resize,
    Upload,
    Cleanup,
    Delete,
    Fetch,
    Write,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobKind::Create => "create",
            JobKind::Remove => "remove",
            JobKind::Download => "download",
        })
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStage::Resize => "resize",
            JobStage::Upload => "upload",
            JobStage::Cleanup => "cleanup",
            JobStage::Delete => "delete",
            JobStage::Fetch => "fetch",
            JobStage::Write => "write",
        })
    }
}

/// A single job that did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub kind: JobKind,
    pub hash: ContentHash,
    pub size: PhotoSize,
    pub stage: JobStage,
    pub message: String,
    /// The job stopped because the run was cancelled, not because of an error
    pub cancelled: bool,
}

impl JobFailure {
    fn error(
        kind: JobKind,
        photo: &Photo,
        size: PhotoSize,
        stage: JobStage,
        err: impl fmt::Display,
    ) -> Self {
        let failure = Self {
            kind,
            hash: photo.hash.clone(),
            size,
            stage,
            message: err.to_string(),
            cancelled: false,
        };
        warn!(
            kind = %failure.kind,
            hash = %failure.hash,
            size = %failure.size,
            stage = %failure.stage,
            error = %failure.message,
            "job failed"
        );
        failure
    }

    fn cancelled(kind: JobKind, photo: &Photo, size: PhotoSize, stage: JobStage) -> Self {
        debug!(%kind, hash = %photo.hash, %size, %stage, "job cancelled");
        Self {
            kind,
            hash: photo.hash.clone(),
            size,
            stage,
            message: "cancelled".to_string(),
            cancelled: true,
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}) stopped at {}: {}",
            self.kind, self.hash, self.size, self.stage, self.message
        )
    }
}

/// Aggregated outcome of a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Jobs that ran every stage
    pub completed: usize,
    pub failures: Vec<JobFailure>,
    /// Jobs never launched because the run was cancelled
    pub skipped: usize,
    /// Jobs whose worker panicked
    pub panicked: usize,
}

impl RunReport {
    /// Number of jobs the run was asked to execute
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed + self.unsuccessful()
    }

    /// Jobs that did not complete for any reason
    #[must_use]
    pub fn unsuccessful(&self) -> usize {
        self.failures.len() + self.skipped + self.panicked
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.unsuccessful() == 0
    }

    /// Escalates any unsuccessful job into `SyncError::AggregateFailure`
    ///
    /// # Errors
    /// Returns `AggregateFailure` unless every job completed.
    pub fn ensure_success(&self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(SyncError::AggregateFailure {
                failed: self.unsuccessful(),
                total: self.total(),
            })
        }
    }

    fn absorb(&mut self, pool: PoolReport<std::result::Result<(), JobFailure>>) {
        for outcome in pool.outputs {
            match outcome {
                Ok(()) => self.completed += 1,
                Err(failure) => self.failures.push(failure),
            }
        }
        self.skipped += pool.skipped;
        self.panicked += pool.panicked;
    }
}

/// Result of an album removal run
///
/// The state is returned whether or not the album could be dropped, so the
/// caller can persist the photos that were removed.
#[derive(Debug)]
pub struct AlbumRemoval {
    pub state: State,
    pub report: RunReport,
    album_removed: bool,
}

impl AlbumRemoval {
    /// True when every photo was removed and the album record was dropped
    #[must_use]
    pub fn album_removed(&self) -> bool {
        self.album_removed
    }

    /// # Errors
    /// Returns `AggregateFailure` when the album had to be kept.
    pub fn check(&self) -> Result<()> {
        if self.album_removed {
            Ok(())
        } else {
            Err(SyncError::AggregateFailure {
                failed: self.report.unsuccessful().max(1),
                total: self.report.total().max(1),
            })
        }
    }
}

// ============================================================================
// Shared state
// ============================================================================

/// The state document shared by the workers of one run
struct SharedState {
    state: Mutex<State>,
    album_id: AlbumId,
}

impl SharedState {
    fn new(state: State, album_id: AlbumId) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            album_id,
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies one transition under the lock
    fn apply(&self, transition: impl FnOnce(State, &AlbumId) -> State) {
        let mut guard = self.lock();
        let current = std::mem::take(&mut *guard);
        *guard = transition(current, &self.album_id);
    }

    /// Moves the state out once every worker has finished
    fn take(&self) -> State {
        std::mem::take(&mut *self.lock())
    }
}

// ============================================================================
// Creation state machine
// ============================================================================

/// File handed to the upload stage
enum Artifact {
    /// The source file itself (original size)
    Source(PathBuf),
    /// A transcoded file inside its own scratch directory
    Scratch { dir: TempDir, path: PathBuf },
}

impl Artifact {
    fn path(&self) -> &Path {
        match self {
            Artifact::Source(path) | Artifact::Scratch { path, .. } => path,
        }
    }

    fn cleanup(self) -> std::io::Result<()> {
        match self {
            Artifact::Source(_) => Ok(()),
            Artifact::Scratch { dir, .. } => dir.close(),
        }
    }
}

enum CreationStep {
    Pending,
    Resized(Artifact),
    Uploaded(Artifact),
    Cleaned,
}

impl CreationStep {
    /// Stage that moves the job out of this step
    fn next_stage(&self) -> Option<JobStage> {
        match self {
            CreationStep::Pending => Some(JobStage::Resize),
            CreationStep::Resized(_) => Some(JobStage::Upload),
            CreationStep::Uploaded(_) => Some(JobStage::Cleanup),
            CreationStep::Cleaned => None,
        }
    }
}

// ============================================================================
// Job runner
// ============================================================================

/// Per-run handle cloned into every job
#[derive(Clone)]
struct JobRunner {
    storage: Arc<dyn IStorageProvider>,
    transcoder: Arc<dyn IImageTranscoder>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl JobRunner {
    fn checkpoint(
        &self,
        kind: JobKind,
        photo: &Photo,
        size: PhotoSize,
        stage: JobStage,
    ) -> std::result::Result<(), JobFailure> {
        if self.cancel.is_cancelled() {
            Err(JobFailure::cancelled(kind, photo, size, stage))
        } else {
            Ok(())
        }
    }

    async fn create(
        &self,
        shared: &SharedState,
        job: CreationJob,
    ) -> std::result::Result<(), JobFailure> {
        let CreationJob { source, photo, size } = job;
        let fail = |stage, err: &dyn fmt::Display| {
            JobFailure::error(JobKind::Create, &photo, size, stage, err)
        };
        let mut step = CreationStep::Pending;

        while let Some(stage) = step.next_stage() {
            self.checkpoint(JobKind::Create, &photo, size, stage)?;
            step = match step {
                CreationStep::Pending => {
                    let artifact = self
                        .resize(&source, &photo, size)
                        .await
                        .map_err(|e| fail(stage, &e))?;
                    CreationStep::Resized(artifact)
                }
                CreationStep::Resized(artifact) => {
                    let url = self
                        .upload(&artifact, &photo, size)
                        .await
                        .map_err(|e| fail(stage, &e))?;
                    if size.is_original() {
                        let record = photo.clone().with_url(url);
                        shared.apply(|state, album_id| {
                            state
                                .persist_photo(record)
                                .add_photo_to_album(album_id, &photo.hash)
                        });
                        info!(hash = %photo.hash, name = %photo.name, "photo added");
                    }
                    CreationStep::Uploaded(artifact)
                }
                CreationStep::Uploaded(artifact) => {
                    artifact.cleanup().map_err(|e| fail(stage, &e))?;
                    CreationStep::Cleaned
                }
                CreationStep::Cleaned => CreationStep::Cleaned,
            };
        }
        Ok(())
    }

    async fn resize(
        &self,
        source: &Path,
        photo: &Photo,
        size: PhotoSize,
    ) -> anyhow::Result<Artifact> {
        let Some(spec) = size.resize_spec() else {
            return Ok(Artifact::Source(source.to_path_buf()));
        };
        let dir = tempfile::Builder::new().prefix("photolake-").tempdir()?;
        let path = dir.path().join(photo.raw_filename(size));
        debug!(hash = %photo.hash, %size, "resizing");
        self.transcoder.transcode(source, &path, spec).await?;
        Ok(Artifact::Scratch { dir, path })
    }

    async fn upload(
        &self,
        artifact: &Artifact,
        photo: &Photo,
        size: PhotoSize,
    ) -> anyhow::Result<String> {
        let data = tokio::fs::read(artifact.path()).await?;
        let name = photo.raw_filename(size);
        let (storage, name_ref, bytes) = (&self.storage, name.as_str(), data.as_slice());
        let url = self
            .retry
            .run("upload_file", &self.cancel, move || {
                storage.upload_file(name_ref, bytes)
            })
            .await?;
        debug!(%name, bytes = data.len(), "uploaded");
        Ok(url)
    }

    async fn remove(
        &self,
        shared: &SharedState,
        job: RemovalJob,
    ) -> std::result::Result<(), JobFailure> {
        let RemovalJob { photo, size } = job;
        self.checkpoint(JobKind::Remove, &photo, size, JobStage::Delete)?;

        let name = photo.raw_filename(size);
        let (storage, name_ref) = (&self.storage, name.as_str());
        match self
            .retry
            .run("remove_file", &self.cancel, move || storage.remove_file(name_ref))
            .await
        {
            Ok(()) => debug!(%name, "deleted"),
            Err(err) if err.is_not_exist() => debug!(%name, "already absent"),
            Err(err) => {
                let stage = JobStage::Delete;
                return Err(JobFailure::error(JobKind::Remove, &photo, size, stage, err));
            }
        }

        if size.is_original() {
            shared.apply(|state, album_id| {
                state
                    .remove_photo_from_album(album_id, &photo.hash)
                    .remove_photo_safe(&photo.hash)
            });
            info!(hash = %photo.hash, name = %photo.name, "photo removed");
        }
        Ok(())
    }

    async fn download(&self, job: DownloadJob) -> std::result::Result<(), JobFailure> {
        let DownloadJob { photo, target } = job;
        let size = PhotoSize::Original;
        self.checkpoint(JobKind::Download, &photo, size, JobStage::Fetch)?;

        let name = photo.raw_filename(size);
        let (storage, name_ref) = (&self.storage, name.as_str());
        let data = self
            .retry
            .run("download_file", &self.cancel, move || {
                storage.download_file(name_ref)
            })
            .await
            .map_err(|e| {
                JobFailure::error(JobKind::Download, &photo, size, JobStage::Fetch, e)
            })?;

        self.checkpoint(JobKind::Download, &photo, size, JobStage::Write)?;
        tokio::fs::write(&target, &data)
            .await
            .map_err(|e| JobFailure::error(JobKind::Download, &photo, size, JobStage::Write, e))?;
        debug!(path = %target.display(), bytes = data.len(), "downloaded");
        Ok(())
    }
}

/// Fetch of one original into the destination directory
#[derive(Debug, Clone)]
struct DownloadJob {
    photo: Photo,
    target: PathBuf,
}

/// One job per stored photo of the album, with collision-free file names
fn download_jobs<'a>(
    photos: impl Iterator<Item = &'a Photo>,
    destination: &Path,
) -> Vec<DownloadJob> {
    let mut taken = HashSet::new();
    photos
        .map(|photo| {
            let mut file_name = photo.download_filename();
            if !taken.insert(file_name.clone()) {
                file_name = format!("{}-{}.{}", photo.name, photo.hash, photo.extension);
                taken.insert(file_name.clone());
            }
            DownloadJob {
                photo: photo.clone(),
                target: destination.join(file_name),
            }
        })
        .collect()
}

// ============================================================================
// Executor
// ============================================================================

/// Executes sync, removal and download runs against the storage provider
#[derive(Clone)]
pub struct PipelineExecutor {
    runner: JobRunner,
    concurrency: usize,
    transfer_concurrency: usize,
}

impl PipelineExecutor {
    /// Creates an executor with the default pipeline settings
    pub fn new(storage: Arc<dyn IStorageProvider>, transcoder: Arc<dyn IImageTranscoder>) -> Self {
        Self::from_config(storage, transcoder, &PipelineConfig::default())
    }

    /// Creates an executor sized and tuned from `config`
    pub fn from_config(
        storage: Arc<dyn IStorageProvider>,
        transcoder: Arc<dyn IImageTranscoder>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            runner: JobRunner {
                storage,
                transcoder,
                retry: RetryPolicy::from_config(config),
                cancel: CancellationToken::new(),
            },
            concurrency: config.effective_concurrency(),
            transfer_concurrency: config.transfer_concurrency,
        }
    }

    /// Worker pool size for sync runs
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Worker pool size for removal and download runs
    #[must_use]
    pub fn with_transfer_concurrency(mut self, concurrency: usize) -> Self {
        self.transfer_concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.runner.retry = retry;
        self
    }

    /// Uses `token` to stop runs early
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.runner.cancel = token;
        self
    }

    /// Token observed by every job of this executor
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.runner.cancel
    }

    /// Executes `plan` against `album_id` and returns the updated state
    ///
    /// Attachments and detachments are applied without storage work.
    /// Creation jobs run first, then removal jobs, each over a pool sized
    /// by the sync concurrency. Job failures never abort the run; they are
    /// collected in the report and already-applied additions are kept.
    ///
    /// # Errors
    /// Returns `SyncError::AlbumNotFound` if the album is not in `state`.
    #[instrument(
        skip_all,
        fields(
            album = %album_id,
            creations = plan.creations.len(),
            removals = plan.removals.len()
        )
    )]
    pub async fn run_sync(
        &self,
        state: State,
        album_id: &AlbumId,
        plan: SyncPlan,
    ) -> Result<(State, RunReport)> {
        if state.album(album_id).is_none() {
            return Err(SyncError::AlbumNotFound(album_id.to_string()));
        }
        let SyncPlan {
            creations,
            removals,
            attachments,
            detachments,
        } = plan;

        let state = attachments.iter().fold(state, |state, photo| {
            debug!(hash = %photo.hash, "attaching stored photo");
            state.add_photo_to_album(album_id, &photo.hash)
        });

        let shared = SharedState::new(state, *album_id);
        let pool = WorkerPool::new(self.concurrency, self.runner.cancel.clone());
        let mut report = RunReport::default();

        let outcome = pool
            .run(creations, |job| {
                let runner = self.runner.clone();
                let shared = Arc::clone(&shared);
                async move { runner.create(&shared, job).await }
            })
            .await;
        report.absorb(outcome);

        let outcome = pool
            .run(removals, |job| {
                let runner = self.runner.clone();
                let shared = Arc::clone(&shared);
                async move { runner.remove(&shared, job).await }
            })
            .await;
        report.absorb(outcome);

        let state = detachments.iter().fold(shared.take(), |state, hash| {
            debug!(%hash, "detaching photo");
            state
                .remove_photo_from_album(album_id, hash)
                .remove_photo_safe(hash)
        });

        info!(
            completed = report.completed,
            failed = report.failures.len(),
            skipped = report.skipped,
            "sync run finished"
        );
        Ok((state, report))
    }

    /// Removes every photo of an album, then the album itself
    ///
    /// Photos still referenced by another album are only detached. The
    /// album record is dropped only when every job succeeded and it ended
    /// up empty; otherwise it is kept and [`AlbumRemoval::check`] reports an
    /// aggregate failure.
    ///
    /// # Errors
    /// Returns `SyncError::AlbumNotFound` if the album is not in `state`.
    #[instrument(skip_all, fields(album = %album_id))]
    pub async fn remove_album(&self, state: State, album_id: &AlbumId) -> Result<AlbumRemoval> {
        let album = state
            .album(album_id)
            .cloned()
            .ok_or_else(|| SyncError::AlbumNotFound(album_id.to_string()))?;

        let mut removals = Vec::new();
        let mut detachments = Vec::new();
        for hash in &album.photos {
            match state.get_photo(hash) {
                Some(photo) if state.occurrences(hash) <= 1 => {
                    removals.extend(RemovalJob::for_all_sizes(photo));
                }
                _ => detachments.push(hash.clone()),
            }
        }
        let state = detachments.iter().fold(state, |state, hash| {
            state
                .remove_photo_from_album(album_id, hash)
                .remove_photo_safe(hash)
        });

        let shared = SharedState::new(state, *album_id);
        let pool = WorkerPool::new(self.transfer_concurrency, self.runner.cancel.clone());
        let mut report = RunReport::default();
        let outcome = pool
            .run(removals, |job| {
                let runner = self.runner.clone();
                let shared = Arc::clone(&shared);
                async move { runner.remove(&shared, job).await }
            })
            .await;
        report.absorb(outcome);

        let state = shared.take();
        let emptied = report.is_success() && state.album(album_id).is_some_and(|a| a.is_empty());
        let state = if emptied {
            info!(name = %album.name, "album removed");
            state.remove_album(album_id)
        } else {
            warn!(
                name = %album.name,
                failed = report.unsuccessful(),
                "album kept, some photos could not be removed"
            );
            state
        };

        Ok(AlbumRemoval {
            state,
            report,
            album_removed: emptied,
        })
    }

    /// Downloads the original of every photo in an album into `destination`
    ///
    /// Files are written as `<name>.<ext>`; a name already taken by another
    /// photo of the album gets the hash appended.
    ///
    /// # Errors
    /// Returns `SyncError::AlbumNotFound` for an unknown album and
    /// `SyncError::DirectoryExists` if `destination` already exists.
    #[instrument(skip_all, fields(album = %album_id, destination = %destination.display()))]
    pub async fn download_album(
        &self,
        state: &State,
        album_id: &AlbumId,
        destination: &Path,
    ) -> Result<RunReport> {
        let album = state
            .album(album_id)
            .ok_or_else(|| SyncError::AlbumNotFound(album_id.to_string()))?;
        if tokio::fs::try_exists(destination).await? {
            return Err(SyncError::DirectoryExists(destination.to_path_buf()));
        }
        tokio::fs::create_dir_all(destination).await?;

        let jobs = download_jobs(state.album_photos(album), destination);
        let pool = WorkerPool::new(self.transfer_concurrency, self.runner.cancel.clone());
        let mut report = RunReport::default();
        let outcome = pool
            .run(jobs, |job| {
                let runner = self.runner.clone();
                async move { runner.download(job).await }
            })
            .await;
        report.absorb(outcome);

        info!(
            downloaded = report.completed,
            failed = report.failures.len(),
            "download finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(name: &str, hash: &str) -> Photo {
        Photo::new(name, "jpg", ContentHash::new(hash).unwrap())
    }

    #[test]
    fn report_counts_every_outcome() {
        let mut report = RunReport::default();
        report.absorb(PoolReport {
            outputs: vec![
                Ok(()),
                Ok(()),
                Err(JobFailure::cancelled(
                    JobKind::Create,
                    &photo("a", "h1"),
                    PhotoSize::Small,
                    JobStage::Upload,
                )),
            ],
            panicked: 1,
            skipped: 2,
        });

        assert_eq!(report.completed, 2);
        assert_eq!(report.unsuccessful(), 4);
        assert_eq!(report.total(), 6);
        assert!(!report.is_success());
        assert!(matches!(
            report.ensure_success(),
            Err(SyncError::AggregateFailure { failed: 4, total: 6 })
        ));
    }

    #[test]
    fn empty_report_is_a_success() {
        let report = RunReport::default();
        assert!(report.is_success());
        assert!(report.ensure_success().is_ok());
    }

    #[test]
    fn failure_display_names_job_and_stage() {
        let failure = JobFailure::error(
            JobKind::Remove,
            &photo("a", "h1"),
            PhotoSize::Thumbnail,
            JobStage::Delete,
            "permission denied",
        );
        assert_eq!(
            failure.to_string(),
            "remove h1 (thumbnail) stopped at delete: permission denied"
        );
        assert!(!failure.cancelled);
    }

    #[test]
    fn download_names_avoid_collisions() {
        let photos = [photo("img", "h1"), photo("img", "h2"), photo("other", "h3")];
        let jobs = download_jobs(photos.iter(), Path::new("/out"));
        let targets: Vec<_> = jobs.iter().map(|j| j.target.clone()).collect();
        assert_eq!(
            targets,
            vec![
                PathBuf::from("/out/img.jpg"),
                PathBuf::from("/out/img-h2.jpg"),
                PathBuf::from("/out/other.jpg"),
            ]
        );
    }

    #[test]
    fn shared_state_applies_transitions_in_place() {
        let album = photolake_core::domain::Album::new("a");
        let id = album.id;
        let shared = SharedState::new(State::new("photolake").add_album(album), id);

        shared.apply(|state, album_id| {
            state
                .persist_photo(photo("a", "h1"))
                .add_photo_to_album(album_id, &ContentHash::new("h1").unwrap())
        });

        let state = shared.take();
        assert_eq!(state.album(&id).unwrap().photos.len(), 1);
        assert!(shared.take().is_empty());
    }
}
