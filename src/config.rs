use crate::error::IndexerError;
use serde::{Deserialize, Serialize};
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    time::Duration,
};

/// Directory under the root that holds every fetched resource.
pub const ATTACHMENTS_DIR: &str = "attachments";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub watch: bool,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Upper bound on a single request. `None` waits forever.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Treat non-2xx responses as failures instead of storing their body.
    #[serde(default)]
    pub require_success: bool,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_extensions() -> Vec<String> {
    vec!["md".to_string()]
}

impl FetchConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl IndexerConfig {
    /// Default configuration rooted at `root`. The root must exist; it is stored in canonical
    /// form.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, IndexerError> {
        let root = root
            .as_ref()
            .canonicalize()
            .map_err(|e| IndexerError::from(e).at(root.as_ref()))?;
        Ok(IndexerConfig {
            root,
            watch: false,
            extensions: default_extensions(),
            fetch: FetchConfig::default(),
        })
    }

    /// Read a TOML config file. A relative `root` is resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IndexerError> {
        let path = path.as_ref();
        tracing::debug!("Reading config from {:?}", path);
        let content = read_to_string(path).map_err(|e| IndexerError::from(e).at(path))?;
        let mut config: IndexerConfig = toml::from_str(&content)?;
        if config.root.is_relative() {
            if let Some(parent) = path.parent() {
                config.root = parent.join(&config.root);
            }
        }
        config.root = config
            .root
            .canonicalize()
            .map_err(|e| IndexerError::from(e).at(&config.root))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), IndexerError> {
        if self.extensions.is_empty() {
            return Err(IndexerError::Config(
                "extensions must name at least one document type".to_string(),
            ));
        }
        if let Some(ext) = self.extensions.iter().find(|e| e.is_empty() || e.starts_with('.')) {
            return Err(IndexerError::Config(format!(
                "extension '{ext}' must be non-empty and given without a leading dot"
            )));
        }
        if self.fetch.timeout_secs == Some(0) {
            return Err(IndexerError::Config(
                "fetch.timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_root(mut self, root: impl AsRef<Path>) -> Result<Self, IndexerError> {
        self.root = IndexerConfig::new(root)?.root;
        Ok(self)
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn attachment_root(&self) -> PathBuf {
        self.root.join(ATTACHMENTS_DIR)
    }

    /// Whether the path's extension marks it as a document to rewrite.
    pub fn is_document(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e == ext))
            .unwrap_or(false)
    }
}
