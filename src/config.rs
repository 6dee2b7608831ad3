//! Run layout configuration.
//!
//! Two generations of these helpers disagreed on naming details. Rather than
//! keeping both, every difference is a switch on [`RunConfig`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::utils::error::{Result, TrainKitError};

/// Default root under which every run gets its log directory
pub const DEFAULT_ROOT_DIR: &str = "log/";

/// Where runs are written and how their artifacts are named
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Parent directory of all log directories
    pub root_dir: PathBuf,
    /// Append `_lr{lr}` to log directory names when a learning rate is given
    pub embed_learning_rate_in_path: bool,
    /// Name best checkpoints `best_{metric}_{score}.pth` when a score is given
    pub embed_score_in_best_name: bool,
    /// Refuse to load a checkpoint without restoring optimizer state as well
    pub optimizer_required_on_load: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(DEFAULT_ROOT_DIR),
            embed_learning_rate_in_path: true,
            embed_score_in_best_name: true,
            optimizer_required_on_load: false,
        }
    }
}

impl RunConfig {
    /// Default naming rules under a custom root
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    /// The older layout: no learning rate in directory names, scores in best
    /// checkpoint names, optimizer state always restored.
    pub fn legacy() -> Self {
        Self {
            root_dir: PathBuf::from(DEFAULT_ROOT_DIR),
            embed_learning_rate_in_path: false,
            embed_score_in_best_name: true,
            optimizer_required_on_load: true,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(TrainKitError::Config(
                "root_dir must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Read and validate a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let config: RunConfig = load_toml_config(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Deserialize any config type from a TOML file
pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = fs::read_to_string(path)
        .map_err(|e| TrainKitError::Config(format!("Failed to read config {}: {e}", path.display())))?;

    toml::from_str(&content)
        .map_err(|e| TrainKitError::Config(format!("Failed to parse config {}: {e}", path.display())))
}
