//! Timestamped log directories for training runs.
//!
//! A run label such as `baseline_lstm` becomes
//! `log/baseline_lstm_Y2020_M2_D27_h16_m5` (plus `_lr0.0003` when the
//! learning rate is embedded). Two runs with the same label started in the
//! same minute share a directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Local, Timelike};
use tracing::debug;

use crate::config::RunConfig;
use crate::training::token::NameToken;
use crate::utils::error::Result;

/// Builds and creates log directories under a fixed root
#[derive(Debug, Clone)]
pub struct LogDirBuilder {
    root_dir: PathBuf,
    embed_learning_rate: bool,
}

impl LogDirBuilder {
    /// Builder rooted at `root_dir` that embeds learning rates when given
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            embed_learning_rate: true,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            root_dir: config.root_dir.clone(),
            embed_learning_rate: config.embed_learning_rate_in_path,
        }
    }

    /// Configure whether `_lr{lr}` is appended to directory names
    pub fn embed_learning_rate(mut self, embed: bool) -> Self {
        self.embed_learning_rate = embed;
        self
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Create the log directory for `label` stamped with the current local time.
    ///
    /// An empty label disables logging: the empty path is returned and
    /// nothing is created.
    pub fn create(&self, label: &str, learning_rate: Option<NameToken>) -> Result<PathBuf> {
        self.create_at(label, learning_rate, &Local::now())
    }

    /// Same as [`create`](Self::create) with an explicit timestamp
    pub fn create_at<T>(
        &self,
        label: &str,
        learning_rate: Option<NameToken>,
        at: &T,
    ) -> Result<PathBuf>
    where
        T: Datelike + Timelike,
    {
        if label.is_empty() {
            return Ok(PathBuf::new());
        }

        let learning_rate = learning_rate.filter(|_| self.embed_learning_rate);
        let dir = self
            .root_dir
            .join(format!("{}_{}", label, timestamp_token(at, learning_rate.as_ref())));

        fs::create_dir_all(&dir)?;
        debug!("Log directory ready: {:?}", dir);

        Ok(dir)
    }
}

/// `Y{year}_M{month}_D{day}_h{hour}_m{minute}[_lr{lr}]`, numbers unpadded
pub fn timestamp_token<T>(at: &T, learning_rate: Option<&NameToken>) -> String
where
    T: Datelike + Timelike,
{
    let mut token = format!(
        "Y{}_M{}_D{}_h{}_m{}",
        at.year(),
        at.month(),
        at.day(),
        at.hour(),
        at.minute()
    );

    if let Some(lr) = learning_rate {
        token.push_str(&format!("_lr{}", lr));
    }

    token
}

/// Create a unique log directory under `root_dir` using default naming rules
pub fn create_unique_log_dir(
    label: &str,
    learning_rate: Option<NameToken>,
    root_dir: &Path,
) -> Result<PathBuf> {
    LogDirBuilder::new(root_dir).create(label, learning_rate)
}
