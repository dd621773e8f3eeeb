//! DirectoryLakeProvider - IStorageProvider backed by a local directory tree
//!
//! Each lake is a subdirectory of a configured root; objects are files
//! inside it. Object names may contain `/` to address nested paths
//! (gallery artifacts live under `<album-id>/`).
//!
//! ## Design Notes
//!
//! - The bound lake is kept behind a `std::sync::RwLock` because
//!   `IStorageProvider::bind_lake` takes `&self` and is synchronous.
//! - Writes go to a sibling temp file and are renamed into place.
//! - Public URLs are `file://` URLs of the object unless a public base URL
//!   (e.g. the web server exposing the root) is configured.

use std::path::{Component, Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::{anyhow, Context};
use photolake_core::config::StorageConfig;
use photolake_core::domain::LakeName;
use photolake_core::ports::{IStorageProvider, StorageError};
use tracing::{debug, instrument};
use url::Url;

/// Storage provider keeping lakes as directories
#[derive(Debug)]
pub struct DirectoryLakeProvider {
    root: PathBuf,
    public_base_url: Option<Url>,
    lake: RwLock<Option<LakeName>>,
}

impl DirectoryLakeProvider {
    /// Creates a provider rooted at `root`
    ///
    /// A relative root is resolved against the current directory.
    ///
    /// # Errors
    /// Fails if the current directory cannot be determined.
    pub fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()
                .context("Failed to resolve current directory")?
                .join(root)
        };
        Ok(Self {
            root,
            public_base_url: None,
            lake: RwLock::new(None),
        })
    }

    /// Serves object URLs from `base` instead of `file://` paths
    ///
    /// # Errors
    /// Fails if `base` is not a valid absolute URL.
    pub fn with_public_base_url(mut self, base: &str) -> anyhow::Result<Self> {
        let mut url = Url::parse(base).with_context(|| format!("Invalid public base URL: {base}"))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.public_base_url = Some(url);
        Ok(self)
    }

    /// Builds a provider from the `storage` configuration section
    ///
    /// # Errors
    /// Fails on an invalid public base URL.
    pub fn from_config(config: &StorageConfig) -> anyhow::Result<Self> {
        let provider = Self::new(config.lake_root.clone())?;
        match &config.public_base_url {
            Some(base) => provider.with_public_base_url(base),
            None => Ok(provider),
        }
    }

    /// Currently bound lake, if any
    pub fn bound_lake(&self) -> Option<LakeName> {
        self.lake
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lake_dir(&self) -> Result<(LakeName, PathBuf), StorageError> {
        let lake = self
            .bound_lake()
            .ok_or_else(|| StorageError::Other(anyhow!("No lake bound to storage provider")))?;
        let dir = self.lake_path(&lake)?;
        Ok((lake, dir))
    }

    /// Directory of `lake`, which must be exactly one normal path component
    fn lake_path(&self, lake: &LakeName) -> Result<PathBuf, StorageError> {
        let mut components = Path::new(lake.as_str()).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(lake.as_str())),
            _ => Err(StorageError::Other(anyhow!("Invalid lake name: '{lake}'"))),
        }
    }

    /// Path of an object inside the bound lake
    fn object_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(name);
        let valid = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::Other(anyhow!("Invalid object name: {name}")));
        }
        let (_, dir) = self.lake_dir()?;
        Ok(dir.join(relative))
    }

    fn object_url(&self, lake: &LakeName, name: &str) -> Result<String, StorageError> {
        let url = match &self.public_base_url {
            Some(base) => base
                .join(&format!("{lake}/{name}"))
                .map_err(|e| StorageError::Other(e.into()))?,
            None => Url::from_file_path(self.root.join(lake.as_str()).join(name))
                .map_err(|()| StorageError::Other(anyhow!("Cannot build file URL for {name}")))?,
        };
        Ok(url.into())
    }
}

/// Maps `NotFound` to the benign `NotExist` case
fn map_io(err: std::io::Error, what: &str) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotExist(what.to_string())
    } else {
        let context = format!("Storage I/O failed for {what}");
        StorageError::Other(anyhow::Error::new(err).context(context))
    }
}

#[async_trait::async_trait]
impl IStorageProvider for DirectoryLakeProvider {
    #[instrument(skip(self))]
    async fn find_lake_name(&self, prefix: &str) -> Result<LakeName, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| map_io(e, &format!("lake root {}", self.root.display())))?;
        let mut candidates = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| map_io(e, "lake root"))? {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_dir && LakeName::matches_prefix(prefix, &name) {
                candidates.push(name);
            }
        }
        candidates.sort();
        let name = candidates
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::NotExist(format!("lake with prefix '{prefix}'")))?;
        debug!(lake = %name, "found lake");
        LakeName::parse(prefix, name).map_err(|e| StorageError::Other(e.into()))
    }

    fn bind_lake(&self, lake: &LakeName) {
        debug!(%lake, "binding lake");
        *self.lake.write().unwrap_or_else(PoisonError::into_inner) = Some(lake.clone());
    }

    #[instrument(skip(self))]
    async fn create_lake(&self, lake: &LakeName) -> Result<(), StorageError> {
        let dir = self.lake_path(lake)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| map_io(e, &format!("lake {lake}")))?;
        self.bind_lake(lake);
        Ok(())
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn upload_file(&self, name: &str, data: &[u8]) -> Result<String, StorageError> {
        let (lake, _) = self.lake_dir()?;
        let target = self.object_path(name)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io(e, name))?;
        }
        let tmp_path = {
            let mut p = target.as_os_str().to_owned();
            p.push(".tmp");
            PathBuf::from(p)
        };
        tokio::fs::write(&tmp_path, data)
            .await
            .map_err(|e| map_io(e, name))?;
        tokio::fs::rename(&tmp_path, &target)
            .await
            .map_err(|e| map_io(e, name))?;
        self.object_url(&lake, name)
    }

    #[instrument(skip(self))]
    async fn download_file(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(name)?;
        tokio::fs::read(&path).await.map_err(|e| map_io(e, name))
    }

    #[instrument(skip(self))]
    async fn remove_file(&self, name: &str) -> Result<(), StorageError> {
        let path = self.object_path(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| map_io(e, name))
    }

    fn lake_base_url(&self) -> String {
        let Some(lake) = self.bound_lake() else {
            return String::new();
        };
        match &self.public_base_url {
            Some(base) => base
                .join(lake.as_str())
                .map(String::from)
                .unwrap_or_else(|_| base.to_string()),
            None => Url::from_file_path(self.root.join(lake.as_str()))
                .map(String::from)
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(dir: &Path) -> DirectoryLakeProvider {
        DirectoryLakeProvider::new(dir).unwrap()
    }

    #[tokio::test]
    async fn find_lake_on_missing_root_is_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir.path().join("missing"));
        let err = provider.find_lake_name("photolake").await.unwrap_err();
        assert!(err.is_not_exist());
    }

    #[tokio::test]
    async fn create_then_find_lake() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());
        std::fs::create_dir(dir.path().join("unrelated-lake")).unwrap();
        std::fs::write(dir.path().join("photolake-file"), b"not a dir").unwrap();

        let lake = LakeName::generate("photolake");
        provider.create_lake(&lake).await.unwrap();
        assert_eq!(provider.bound_lake(), Some(lake.clone()));

        let found = provider.find_lake_name("photolake").await.unwrap();
        assert_eq!(found, lake);
    }

    #[tokio::test]
    async fn upload_download_remove_object() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());
        let lake = LakeName::generate("photolake");
        provider.create_lake(&lake).await.unwrap();

        let url = provider.upload_file("abc.jpg", b"pixels").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(&format!("{lake}/abc.jpg")));
        assert_eq!(provider.download_file("abc.jpg").await.unwrap(), b"pixels");

        provider.remove_file("abc.jpg").await.unwrap();
        assert!(provider.download_file("abc.jpg").await.unwrap_err().is_not_exist());
        assert!(provider.remove_file("abc.jpg").await.unwrap_err().is_not_exist());
    }

    #[tokio::test]
    async fn nested_object_names_create_directories() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());
        let lake = LakeName::generate("photolake");
        provider.create_lake(&lake).await.unwrap();

        provider.upload_file("album-1/index.json", b"{}").await.unwrap();
        assert!(dir
            .path()
            .join(lake.as_str())
            .join("album-1")
            .join("index.json")
            .exists());
    }

    #[tokio::test]
    async fn rejects_escaping_object_names() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());
        provider
            .create_lake(&LakeName::generate("photolake"))
            .await
            .unwrap();

        for name in ["../escape.jpg", "/etc/passwd", "", "a/../../b"] {
            let err = provider.upload_file(name, b"x").await.unwrap_err();
            assert!(!err.is_not_exist(), "{name} should be rejected");
        }
    }

    #[tokio::test]
    async fn empty_lake_name_never_maps_to_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());
        assert!(provider.create_lake(&LakeName::default()).await.is_err());

        provider.bind_lake(&LakeName::default());
        assert!(provider.upload_file("a.jpg", b"x").await.is_err());
        assert!(!dir.path().join("a.jpg").exists());
    }

    #[tokio::test]
    async fn object_operations_require_a_bound_lake() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());
        assert!(provider.upload_file("a.jpg", b"x").await.is_err());
        assert_eq!(provider.lake_base_url(), "");
    }

    #[tokio::test]
    async fn public_base_url_replaces_file_urls() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path())
            .with_public_base_url("https://photos.example.com/lakes")
            .unwrap();
        let lake = LakeName::parse("photolake", "photolake-1").unwrap();
        provider.create_lake(&lake).await.unwrap();

        let url = provider.upload_file("abc.jpg", b"x").await.unwrap();
        assert_eq!(url, "https://photos.example.com/lakes/photolake-1/abc.jpg");
        assert_eq!(
            provider.lake_base_url(),
            "https://photos.example.com/lakes/photolake-1"
        );
    }

    #[test]
    fn invalid_public_base_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(provider(dir.path()).with_public_base_url("not a url").is_err());
    }
}
