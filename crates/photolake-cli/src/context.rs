//! Wiring of configuration, adapters and the engine for one command run

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use photolake_core::config::Config;
use photolake_core::domain::State;
use photolake_core::ports::{IGalleryRenderer, IImageTranscoder, IStorageProvider};
use photolake_imaging::ImageTranscoder;
use photolake_storage::DirectoryLakeProvider;
use photolake_sync::{PipelineExecutor, StateStore};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::gallery::ManifestGalleryRenderer;

/// Loads the configuration file (or defaults), applies environment
/// overrides and rejects invalid settings
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()),
    };
    config.apply_env_overrides();

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("Invalid configuration:\n  {}", details.join("\n  "));
    }
    Ok(config)
}

/// Everything a command needs to talk to the lake
pub struct AppContext {
    pub storage: Arc<dyn IStorageProvider>,
    pub store: StateStore,
    pub executor: PipelineExecutor,
    pub renderer: Arc<dyn IGalleryRenderer>,
}

impl AppContext {
    pub fn new(config: &Config, cancel: CancellationToken) -> Result<Self> {
        let storage: Arc<dyn IStorageProvider> = Arc::new(
            DirectoryLakeProvider::from_config(&config.storage)
                .context("Failed to set up lake storage")?,
        );
        let transcoder: Arc<dyn IImageTranscoder> = Arc::new(ImageTranscoder::new());
        let store = StateStore::from_config(storage.clone(), &config.workspace);
        let executor = PipelineExecutor::from_config(storage.clone(), transcoder, &config.pipeline)
            .with_cancellation(cancel);
        let renderer: Arc<dyn IGalleryRenderer> =
            Arc::new(ManifestGalleryRenderer::new(storage.clone()));

        Ok(Self {
            storage,
            store,
            executor,
            renderer,
        })
    }

    /// Resolves the workspace state and binds the storage provider to its lake
    pub async fn provision(&self) -> Result<State> {
        let (state, source) = self
            .store
            .provision()
            .await
            .context("Failed to provision workspace state")?;
        info!(%source, lake = %state.lake_name, "Workspace ready");
        Ok(state)
    }

    pub async fn save(&self, state: &State) -> Result<()> {
        self.store
            .save(state)
            .await
            .context("Failed to save workspace state")
    }
}
