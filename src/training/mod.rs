//! Training run helpers
//!
//! This module provides:
//! - Timestamped log directories for each run
//! - Checkpoint saving, loading and discovery
//! - Number spelling for learning rates and scores in names
//!
//! ## Layout
//!
//! ```text
//! log/
//! └── baseline_lstm_Y2020_M2_D27_h16_m5_lr0.0003/
//!     └── checkpoints/
//!         ├── lr0.0003_epoch1.pth
//!         ├── lr0.0003_epoch2.pth
//!         └── best_accuracy_0.87.pth
//! ```

pub mod checkpoint;
pub mod log_dir;
pub mod token;

pub use checkpoint::{checkpoint_dir, Checkpoint, CheckpointName, CheckpointStore};
pub use log_dir::{create_unique_log_dir, timestamp_token, LogDirBuilder};
pub use token::{format_float, NameToken};
