use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{
    error::{Error, Result},
    walker::normalize_extension,
};

pub const CONFIG_ENV_VAR: &str = "RECOLLECT_CONFIG";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Extensions indexed when nothing else is configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "txt"];
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_IMAGE_WEIGHT: f32 = 1.5;

/// Parameters of one index build.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Lowercase extensions without the leading dot.
    pub allowed_extensions: Vec<String>,
    /// Read existing caches and write new ones.
    pub use_cache: bool,
    /// Uncached-document count above which a directory gets its own cache.
    /// `None` keeps a single cache at the root.
    pub subcache_threshold: Option<usize>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: DEFAULT_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            use_cache: true,
            subcache_threshold: None,
        }
    }
}

impl IndexConfig {
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_subcache_threshold(mut self, threshold: Option<usize>) -> Self {
        self.subcache_threshold = threshold;
        self
    }

    /// Re-normalize extensions that came from an outside source.
    fn normalized(self) -> Self {
        let extensions = self.allowed_extensions.clone();
        self.with_extensions(extensions)
    }
}

/// Parameters of one search.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Maximum number of results.
    pub top_k: usize,
    /// Multiplier applied to image similarities, whose scale differs from
    /// text similarities.
    pub image_weight: f32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            image_weight: DEFAULT_IMAGE_WEIGHT,
        }
    }
}

/// Settings file contents. Every field is optional.
///
/// ```json
/// {
///   "index": {
///     "allowed_extensions": ["txt", "png"],
///     "subcache_threshold": 200
///   },
///   "search": { "top_k": 10 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub index: IndexConfig,
    pub search: SearchParams,
}

impl Settings {
    /// Load settings from, in order of priority:
    /// 1. An explicit path (from --config), which must exist
    /// 2. The RECOLLECT_CONFIG environment variable
    /// 3. The XDG config directory (~/.config/recollect/config.json)
    ///
    /// Falls back to defaults when no file is found at 2 or 3.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let candidate = match std::env::var_os(CONFIG_ENV_VAR) {
            Some(val) => Some(PathBuf::from(val)),
            None => xdg::BaseDirectories::with_prefix("recollect")
                .get_config_home()
                .map(|home| home.join(CONFIG_FILE_NAME)),
        };

        match candidate {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let settings: Settings = serde_json::from_str(&raw).map_err(|e| {
            Error::Config(format!("cannot parse {}: {e}", path.display()))
        })?;

        Ok(Self {
            index: settings.index.normalized(),
            search: settings.search,
        })
    }
}
