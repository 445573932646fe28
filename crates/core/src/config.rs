use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NotefoldError, Result};

pub const DEFAULT_GROUP_COUNT: usize = 5;
pub const DEFAULT_MIN_DOCUMENTS: usize = 3;
pub const DEFAULT_MAX_VOCABULARY: usize = 10_000;
pub const DEFAULT_TOP_KEYWORDS: usize = 3;
pub const DEFAULT_MAX_FOLDER_NAME_LEN: usize = 200;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_PATTERNS: &str = "*.md";
pub const PENDING_DIR_NAME: &str = "pending";

const ENV_PREFIX: &str = "NOTEFOLD_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub source_dir: PathBuf,
    pub destination_root: PathBuf,
    #[serde(default)]
    pub pending_root: Option<PathBuf>,
    #[serde(default)]
    pub archive_root: Option<PathBuf>,
    #[serde(default = "default_patterns")]
    pub patterns: String,
    #[serde(default)]
    pub requested_group_count: Option<usize>,
    #[serde(default = "default_group_count")]
    pub default_group_count: usize,
    #[serde(default = "default_min_documents")]
    pub min_documents_for_clustering: usize,
    #[serde(default = "default_max_vocabulary")]
    pub max_vocabulary_size: usize,
    #[serde(default = "default_true")]
    pub name_groups_by_keywords: bool,
    #[serde(default = "default_top_keywords")]
    pub top_keywords: usize,
    #[serde(default = "default_max_folder_name_len")]
    pub max_folder_name_len: usize,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub kmeans: KMeansSettings,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct KMeansSettings {
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// `None` picks the init count automatically.
    #[serde(default)]
    pub n_init: Option<usize>,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for KMeansSettings {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            n_init: None,
            max_iter: default_max_iter(),
            tolerance: default_tolerance(),
        }
    }
}

impl Settings {
    pub fn new(source_dir: impl Into<PathBuf>, destination_root: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            destination_root: destination_root.into(),
            pending_root: None,
            archive_root: None,
            patterns: default_patterns(),
            requested_group_count: None,
            default_group_count: DEFAULT_GROUP_COUNT,
            min_documents_for_clustering: DEFAULT_MIN_DOCUMENTS,
            max_vocabulary_size: DEFAULT_MAX_VOCABULARY,
            name_groups_by_keywords: true,
            top_keywords: DEFAULT_TOP_KEYWORDS,
            max_folder_name_len: DEFAULT_MAX_FOLDER_NAME_LEN,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            log_file: None,
            kmeans: KMeansSettings::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            NotefoldError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        let mut settings = Self::from_yaml_str(&raw)?;
        settings.apply_overrides(|key| env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Applies `NOTEFOLD_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(dir) = var("SOURCE_DIR") {
            self.source_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("DESTINATION_ROOT") {
            self.destination_root = PathBuf::from(dir);
        }
        if let Some(dir) = var("ARCHIVE_ROOT") {
            self.archive_root = Some(PathBuf::from(dir));
        }
        if let Some(raw) = var("GROUP_COUNT") {
            let count = raw.parse::<usize>().map_err(|_| {
                NotefoldError::Config(format!("{ENV_PREFIX}GROUP_COUNT is not a number: {raw}"))
            })?;
            self.requested_group_count = Some(count);
        }
        if let Some(raw) = var("POLL_INTERVAL_SECS") {
            self.poll_interval_secs = raw.parse::<u64>().map_err(|_| {
                NotefoldError::Config(format!(
                    "{ENV_PREFIX}POLL_INTERVAL_SECS is not a number: {raw}"
                ))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("requested_group_count", self.requested_group_count.unwrap_or(1)),
            ("default_group_count", self.default_group_count),
            ("min_documents_for_clustering", self.min_documents_for_clustering),
            ("max_vocabulary_size", self.max_vocabulary_size),
            ("top_keywords", self.top_keywords),
            ("max_folder_name_len", self.max_folder_name_len),
            ("kmeans.max_iter", self.kmeans.max_iter),
            ("kmeans.n_init", self.kmeans.n_init.unwrap_or(1)),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(NotefoldError::Config(format!("{name} must be positive")));
            }
        }
        if self.poll_interval_secs == 0 {
            return Err(NotefoldError::Config(
                "poll_interval_secs must be positive".to_string(),
            ));
        }
        if !self.kmeans.tolerance.is_finite() || self.kmeans.tolerance < 0.0 {
            return Err(NotefoldError::Config(
                "kmeans.tolerance must be a non-negative number".to_string(),
            ));
        }
        if self.patterns.split(',').all(|p| p.trim().is_empty()) {
            return Err(NotefoldError::Config("patterns must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn pending_dir(&self) -> PathBuf {
        self.pending_root
            .clone()
            .unwrap_or_else(|| self.destination_root.join(PENDING_DIR_NAME))
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.source_dir)?;
        fs::create_dir_all(&self.destination_root)?;
        if let Some(archive) = &self.archive_root {
            fs::create_dir_all(archive)?;
        }
        Ok(())
    }
}

fn default_patterns() -> String {
    DEFAULT_PATTERNS.to_string()
}

fn default_group_count() -> usize {
    DEFAULT_GROUP_COUNT
}

fn default_min_documents() -> usize {
    DEFAULT_MIN_DOCUMENTS
}

fn default_max_vocabulary() -> usize {
    DEFAULT_MAX_VOCABULARY
}

fn default_true() -> bool {
    true
}

fn default_top_keywords() -> usize {
    DEFAULT_TOP_KEYWORDS
}

fn default_max_folder_name_len() -> usize {
    DEFAULT_MAX_FOLDER_NAME_LEN
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_seed() -> u64 {
    42
}

fn default_max_iter() -> usize {
    300
}

fn default_tolerance() -> f64 {
    1e-4
}
