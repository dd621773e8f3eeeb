//! Configuration module for Photolake.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable that overrides `pipeline.concurrency`.
pub const CONCURRENCY_ENV: &str = "PHOTOLAKE_CONCURRENCY";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Photolake.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub workspace: WorkspaceConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Where the workspace keeps its state document and how its lake is named.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Local state document, relative to the working directory unless absolute.
    pub state_file: PathBuf,
    /// Lakes are named `<lake_prefix>-<uuid>`.
    pub lake_prefix: String,
}

/// Job pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound for the sync worker pool. The effective cap is the
    /// smaller of this value and the logical CPU count.
    pub concurrency: Option<usize>,
    /// Worker pool size for download and album-removal runs.
    pub transfer_concurrency: usize,
    /// Retries for a storage call that failed with a connection error.
    pub max_retries: u32,
    /// Base delay of the exponential backoff between retries (ms).
    pub retry_base_delay_ms: u64,
}

/// Directory-lake storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory under which each lake is a subdirectory.
    pub lake_root: PathBuf,
    /// Public base URL the lake root is served from. `file://` URLs are
    /// produced when unset.
    pub public_base_url: Option<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/photolake/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("photolake")
            .join("config.yaml")
    }

    /// Apply `PHOTOLAKE_CONCURRENCY` on top of the loaded values.
    ///
    /// Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_concurrency_override(std::env::var(CONCURRENCY_ENV).ok().as_deref());
    }

    fn apply_concurrency_override(&mut self, value: Option<&str>) {
        if let Some(n) = value.and_then(|v| v.trim().parse::<usize>().ok()) {
            self.pipeline.concurrency = Some(n);
        }
    }
}

impl PipelineConfig {
    /// Worker pool size for sync runs: `min(cpus, concurrency)`, at least 1.
    pub fn effective_concurrency(&self) -> usize {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::cap(cpus, self.concurrency)
    }

    fn cap(cpus: usize, requested: Option<usize>) -> usize {
        requested.map_or(cpus, |n| n.min(cpus)).max(1)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from(".photolake.state"),
            lake_prefix: "photolake".to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            transfer_concurrency: 20,
            max_retries: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            lake_root: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("photolake")
                .join("lakes"),
            public_base_url: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"pipeline.max_retries"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- workspace ---
        if self.workspace.state_file.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "workspace.state_file".into(),
                message: "must not be empty".into(),
            });
        }
        let prefix = &self.workspace.lake_prefix;
        if prefix.is_empty()
            || !prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            errors.push(ValidationError {
                field: "workspace.lake_prefix".into(),
                message: format!(
                    "invalid prefix '{prefix}'; use lowercase letters, digits and '-'"
                ),
            });
        }

        // --- pipeline ---
        if self.pipeline.concurrency == Some(0) {
            errors.push(ValidationError {
                field: "pipeline.concurrency".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.pipeline.transfer_concurrency == 0 {
            errors.push(ValidationError {
                field: "pipeline.transfer_concurrency".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- storage ---
        if let Some(url) = &self.storage.public_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(ValidationError {
                    field: "storage.public_base_url".into(),
                    message: format!("must be an http(s) URL, got '{url}'"),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use photolake_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .lake_root(PathBuf::from("/srv/lakes"))
///     .concurrency(4)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- workspace ---

    pub fn state_file(mut self, path: PathBuf) -> Self {
        self.config.workspace.state_file = path;
        self
    }

    pub fn lake_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.workspace.lake_prefix = prefix.into();
        self
    }

    // --- pipeline ---

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.pipeline.concurrency = Some(n);
        self
    }

    pub fn transfer_concurrency(mut self, n: usize) -> Self {
        self.config.pipeline.transfer_concurrency = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.pipeline.max_retries = n;
        self
    }

    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.pipeline.retry_base_delay_ms = ms;
        self
    }

    // --- storage ---

    pub fn lake_root(mut self, root: PathBuf) -> Self {
        self.config.storage.lake_root = root;
        self
    }

    pub fn public_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.storage.public_base_url = Some(url.into());
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
