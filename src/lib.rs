//! # trainkit
//!
//! Helpers around a Burn training loop that the loop itself should not have
//! to care about.
//!
//! ## Features
//!
//! - **Log directories** named after the run label, the local time and
//!   optionally the learning rate
//! - **Checkpoints** holding epoch, loss, model and optimizer records, with
//!   per-epoch and best-metric naming
//! - **Diagnostic charts**: prediction accuracy over open/close distance as
//!   SVG or PNG
//!
//! ## Modules
//!
//! - `config`: naming rules and root directory (`RunConfig`)
//! - `training`: log directories and checkpoints
//! - `utils`: charts, logging, and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trainkit::{CheckpointStore, LogDirBuilder, RunConfig};
//!
//! let config = RunConfig::default();
//! let log_dir = LogDirBuilder::from_config(&config).create("baseline_lstm", Some("3e-4".into()))?;
//! let store = CheckpointStore::from_config(&config);
//!
//! for epoch in 0..epochs {
//!     // ... train ...
//!     store.save(&log_dir, &model, &optimizer, epoch, loss, "3e-4", None, None)?;
//! }
//! ```

pub mod config;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::RunConfig;
pub use training::checkpoint::{Checkpoint, CheckpointName, CheckpointStore};
pub use training::log_dir::{create_unique_log_dir, LogDirBuilder};
pub use training::token::NameToken;
pub use utils::charts::{plot_long_distance_prediction_accuracy, PlotData, ScatterChart};
pub use utils::error::{Result, TrainKitError};
