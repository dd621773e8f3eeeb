//! Shared fixtures for photolake-sync integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use photolake_core::domain::{Album, AlbumId, LakeName, ResizeSpec, State};
use photolake_core::ports::{IImageTranscoder, IStorageProvider, StorageError};
use photolake_sync::{PipelineExecutor, RetryPolicy};
use tokio_util::sync::CancellationToken;

// ============================================================================
// In-memory storage provider
// ============================================================================

/// Storage provider keeping every lake in memory, with failure injection
#[derive(Default)]
pub struct MemoryStorage {
    lakes: Mutex<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
    bound: Mutex<Option<String>>,
    failing_uploads: Mutex<HashSet<String>>,
    failing_removals: Mutex<HashSet<String>>,
    flaky_uploads: AtomicUsize,
    offline: AtomicBool,
    upload_calls: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates an empty lake without binding to it
    pub fn add_lake(&self, name: &str) {
        self.lakes.lock().unwrap().entry(name.to_string()).or_default();
    }

    /// Stores an object directly in a lake
    pub fn put(&self, lake: &str, name: &str, data: &[u8]) {
        self.lakes
            .lock()
            .unwrap()
            .entry(lake.to_string())
            .or_default()
            .insert(name.to_string(), data.to_vec());
    }

    pub fn bound_lake(&self) -> Option<String> {
        self.bound.lock().unwrap().clone()
    }

    pub fn lake_names(&self) -> Vec<String> {
        self.lakes.lock().unwrap().keys().cloned().collect()
    }

    /// Object names in the bound lake, sorted
    pub fn objects(&self) -> Vec<String> {
        let Some(lake) = self.bound_lake() else {
            return Vec::new();
        };
        self.lakes
            .lock()
            .unwrap()
            .get(&lake)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object(&self, name: &str) -> Option<Vec<u8>> {
        let lake = self.bound_lake()?;
        self.lakes.lock().unwrap().get(&lake)?.get(name).cloned()
    }

    pub fn fail_upload_of(&self, name: &str) {
        self.failing_uploads.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_removal_of(&self, name: &str) {
        self.failing_removals.lock().unwrap().insert(name.to_string());
    }

    /// The next `count` uploads fail with a connection error
    pub fn flaky_uploads(&self, count: usize) {
        self.flaky_uploads.store(count, Ordering::SeqCst);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StorageError::BadConnection("offline".into()))
        } else {
            Ok(())
        }
    }

    fn with_bound<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, Vec<u8>>) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let lake = self
            .bound_lake()
            .ok_or_else(|| StorageError::Other(anyhow::anyhow!("no lake bound")))?;
        let mut lakes = self.lakes.lock().unwrap();
        let objects = lakes
            .get_mut(&lake)
            .ok_or_else(|| StorageError::NotExist(lake.clone()))?;
        f(objects)
    }
}

#[async_trait::async_trait]
impl IStorageProvider for MemoryStorage {
    async fn find_lake_name(&self, prefix: &str) -> Result<LakeName, StorageError> {
        self.check_online()?;
        let lakes = self.lakes.lock().unwrap();
        let name = lakes
            .keys()
            .find(|name| LakeName::matches_prefix(prefix, name))
            .ok_or_else(|| StorageError::NotExist(format!("lake with prefix {prefix}")))?;
        LakeName::parse(prefix, name.clone()).map_err(|e| StorageError::Other(e.into()))
    }

    fn bind_lake(&self, lake: &LakeName) {
        *self.bound.lock().unwrap() = Some(lake.as_str().to_string());
    }

    async fn create_lake(&self, lake: &LakeName) -> Result<(), StorageError> {
        self.check_online()?;
        self.add_lake(lake.as_str());
        self.bind_lake(lake);
        Ok(())
    }

    async fn upload_file(&self, name: &str, data: &[u8]) -> Result<String, StorageError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        if self
            .flaky_uploads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StorageError::BadConnection("connection reset".into()));
        }
        if self.failing_uploads.lock().unwrap().contains(name) {
            return Err(StorageError::Other(anyhow::anyhow!("upload rejected: {name}")));
        }
        let url = format!("{}/{name}", self.lake_base_url());
        self.with_bound(|objects| {
            objects.insert(name.to_string(), data.to_vec());
            Ok(url)
        })
    }

    async fn download_file(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.check_online()?;
        self.with_bound(|objects| {
            objects
                .get(name)
                .cloned()
                .ok_or_else(|| StorageError::NotExist(name.to_string()))
        })
    }

    async fn remove_file(&self, name: &str) -> Result<(), StorageError> {
        self.check_online()?;
        if self.failing_removals.lock().unwrap().contains(name) {
            return Err(StorageError::Other(anyhow::anyhow!("removal rejected: {name}")));
        }
        self.with_bound(|objects| {
            objects
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| StorageError::NotExist(name.to_string()))
        })
    }

    fn lake_base_url(&self) -> String {
        format!("mem://{}", self.bound_lake().unwrap_or_default())
    }
}

// ============================================================================
// Transcoder
// ============================================================================

/// Transcoder that copies the source unchanged and records each call
#[derive(Default)]
pub struct CopyTranscoder {
    pub calls: Mutex<Vec<ResizeSpec>>,
    cancel_on_call: Mutex<Option<CancellationToken>>,
}

impl CopyTranscoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Cancels `token` from inside the next transcode call
    pub fn cancel_on_call(&self, token: CancellationToken) {
        *self.cancel_on_call.lock().unwrap() = Some(token);
    }
}

#[async_trait::async_trait]
impl IImageTranscoder for CopyTranscoder {
    async fn transcode(
        &self,
        source: &Path,
        destination: &Path,
        spec: ResizeSpec,
    ) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(spec);
        if let Some(token) = self.cancel_on_call.lock().unwrap().take() {
            token.cancel();
        }
        tokio::fs::copy(source, destination).await?;
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Bytes that sniff as JPEG; distinct seeds give distinct hashes
pub fn fake_jpeg(seed: u8) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.extend((0..256u16).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)));
    data
}

pub fn write_photo(dir: &Path, name: &str, seed: u8) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, fake_jpeg(seed)).unwrap();
    path
}

/// A bound, provisioned state holding one empty album
pub fn workspace(storage: &MemoryStorage, album_name: &str) -> (State, AlbumId) {
    let album = Album::new(album_name);
    let id = album.id;
    let state = State::new("photolake").add_album(album);
    storage.add_lake(state.lake_name.as_str());
    storage.bind_lake(&state.lake_name);
    (state, id)
}

pub fn executor(
    storage: &Arc<MemoryStorage>,
    transcoder: &Arc<CopyTranscoder>,
) -> PipelineExecutor {
    let storage: Arc<dyn IStorageProvider> = storage.clone();
    let transcoder: Arc<dyn IImageTranscoder> = transcoder.clone();
    PipelineExecutor::new(storage, transcoder)
        .with_concurrency(4)
        .with_transfer_concurrency(4)
        .with_retry_policy(RetryPolicy::none())
}
