//! State persistence and provisioning
//!
//! The state document lives in two places: a JSON file in the working
//! directory and an object of the same name inside the lake.
//!
//! Provisioning resolves, in order:
//!
//! 1. **Local** - a local file with a non-nil id is authoritative.
//! 2. **Remote** - otherwise an existing lake is looked up by prefix, its
//!    document is downloaded and written locally.
//! 3. **New** - otherwise a fresh document and lake are created and saved
//!    to both places.
//!
//! Saving always writes the local file first, then uploads a copy whose id
//! has been re-stamped. A failed upload is reported but the local file keeps
//! the new content; the next run treats it as authoritative.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use photolake_core::config::WorkspaceConfig;
use photolake_core::domain::State;
use photolake_core::ports::IStorageProvider;
use tracing::{debug, info, instrument, warn};

use crate::{Result, SyncError};

/// Object name used in the lake when the local path has no file name
const DEFAULT_REMOTE_NAME: &str = ".photolake.state";

/// Where a provisioned state document came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSource {
    Local,
    Remote,
    New,
}

impl std::fmt::Display for StateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StateSource::Local => "local",
            StateSource::Remote => "remote",
            StateSource::New => "new",
        })
    }
}

/// Loads and saves the state document of one workspace
pub struct StateStore {
    storage: Arc<dyn IStorageProvider>,
    local_path: PathBuf,
    remote_name: String,
    lake_prefix: String,
}

impl StateStore {
    pub fn new(
        storage: Arc<dyn IStorageProvider>,
        local_path: impl Into<PathBuf>,
        lake_prefix: impl Into<String>,
    ) -> Self {
        let local_path = local_path.into();
        let remote_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_REMOTE_NAME.to_string());
        Self {
            storage,
            local_path,
            remote_name,
            lake_prefix: lake_prefix.into(),
        }
    }

    pub fn from_config(storage: Arc<dyn IStorageProvider>, config: &WorkspaceConfig) -> Self {
        Self::new(storage, config.state_file.clone(), config.lake_prefix.clone())
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Name of the state object inside the lake
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    /// Reads the local document
    ///
    /// Returns `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    /// Returns `SyncError::CorruptState` if the file cannot be parsed.
    pub async fn load_local(&self) -> Result<Option<State>> {
        match tokio::fs::read(&self.local_path).await {
            Ok(bytes) => parse_state(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Downloads the document from the currently bound lake
    ///
    /// Returns `Ok(None)` when the lake holds no document.
    ///
    /// # Errors
    /// Returns `SyncError::BadConnection` when the provider is unreachable
    /// and `SyncError::CorruptState` if the document cannot be parsed.
    pub async fn fetch_remote(&self) -> Result<Option<State>> {
        match self.storage.download_file(&self.remote_name).await {
            Ok(bytes) => parse_state(&bytes).map(Some),
            Err(e) if e.is_not_exist() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolves the state document for this workspace
    ///
    /// The storage provider is left bound to the document's lake.
    ///
    /// # Errors
    /// Propagates connection, storage, I/O and parse failures.
    #[instrument(skip(self), fields(path = %self.local_path.display()))]
    pub async fn provision(&self) -> Result<(State, StateSource)> {
        if let Some(local) = self.load_local().await? {
            if !local.is_empty() {
                info!(lake = %local.lake_name, "using local state");
                self.storage.bind_lake(&local.lake_name);
                return Ok((local, StateSource::Local));
            }
            debug!("local state has no id, ignoring it");
        }

        if let Some(remote) = self.find_remote().await? {
            info!(lake = %remote.lake_name, "refreshed from remote state");
            self.save_local(&remote).await?;
            return Ok((remote, StateSource::Remote));
        }

        let state = State::new(&self.lake_prefix);
        info!(lake = %state.lake_name, "no local or remote state, provisioning a new workspace");
        self.storage.create_lake(&state.lake_name).await?;
        self.save(&state).await?;
        Ok((state, StateSource::New))
    }

    async fn find_remote(&self) -> Result<Option<State>> {
        let lake = match self.storage.find_lake_name(&self.lake_prefix).await {
            Ok(lake) => lake,
            Err(e) if e.is_not_exist() => {
                debug!(prefix = %self.lake_prefix, "no existing lake");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        self.storage.bind_lake(&lake);
        Ok(self.fetch_remote().await?.filter(|state| !state.is_empty()))
    }

    /// Writes the document locally, then a re-stamped copy remotely
    ///
    /// # Errors
    /// Fails if either write fails; a remote failure leaves the local file
    /// updated.
    #[instrument(skip_all, fields(id = %state.id))]
    pub async fn save(&self, state: &State) -> Result<()> {
        self.save_local(state).await?;
        if let Err(e) = self.save_remote(state).await {
            warn!(error = %e, "state saved locally but not remotely");
            return Err(e);
        }
        Ok(())
    }

    /// Atomically replaces the local document
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be written.
    pub async fn save_local(&self, state: &State) -> Result<()> {
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| SyncError::CorruptState(e.to_string()))?;
        write_atomic(&self.local_path, &json).await?;
        debug!(path = %self.local_path.display(), bytes = json.len(), "local state written");
        Ok(())
    }

    /// Uploads a re-stamped copy of `state` and returns it
    ///
    /// # Errors
    /// Returns the provider failure.
    pub async fn save_remote(&self, state: &State) -> Result<State> {
        let stamped = state.clone().restamp();
        let json = serde_json::to_vec(&stamped)
            .map_err(|e| SyncError::CorruptState(e.to_string()))?;
        self.storage.upload_file(&self.remote_name, &json).await?;
        debug!(id = %stamped.id, "remote state uploaded");
        Ok(stamped)
    }
}

fn parse_state(bytes: &[u8]) -> Result<State> {
    let state: State =
        serde_json::from_slice(bytes).map_err(|e| SyncError::CorruptState(e.to_string()))?;
    state
        .validate()
        .map_err(|e| SyncError::CorruptState(e.to_string()))?;
    Ok(state)
}

/// Writes `data` next to `target` and renames it into place
async fn write_atomic(target: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = {
        let mut p = target.as_os_str().to_owned();
        p.push(".tmp");
        PathBuf::from(p)
    };
    tokio::fs::write(&tmp_path, data).await?;
    tokio::fs::rename(&tmp_path, target).await
}
