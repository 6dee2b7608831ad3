//! Model checkpointing and state management.
//!
//! This module provides:
//! - Per-epoch and best-metric checkpoint files under `<log_dir>/checkpoints/`
//! - Restoring model (and optionally optimizer) state into existing modules
//! - Filename parsing and listing for resuming runs
//!
//! A checkpoint is a single JSON document holding the epoch, the loss and the
//! Burn records of the model and optimizer. Records are encoded with
//! [`NamedMpkBytesRecorder`] at full precision and stored base64-encoded.
//! Writes are plain overwrites: a crash mid-write can leave a truncated file.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use burn::module::{AutodiffModule, Module, ModuleVisitor, ParamId};
use burn::optim::Optimizer;
use burn::record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{Bool, Int, Tensor};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::training::token::NameToken;
use crate::utils::error::{Result, TrainKitError};

/// Subdirectory of a log directory holding checkpoint files
pub const CHECKPOINT_DIR: &str = "checkpoints";

/// Extension of checkpoint files
pub const CHECKPOINT_EXTENSION: &str = "pth";

type StateRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

/// On-disk checkpoint contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch: usize,
    /// Encoded model record
    #[serde(with = "base64_state")]
    pub model_state_dict: Vec<u8>,
    /// Encoded optimizer record
    #[serde(with = "base64_state")]
    pub optimizer_state_dict: Vec<u8>,
    /// Non-finite losses are written as `null` and read back as NaN
    #[serde(deserialize_with = "nan_from_null")]
    pub loss: f64,
}

impl Checkpoint {
    /// Write to `path`, replacing any existing file
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a checkpoint without decoding its records
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TrainKitError::PathNotFound(path.to_path_buf()));
        }

        let reader = BufReader::new(File::open(path)?);
        let checkpoint = serde_json::from_reader(reader)?;
        Ok(checkpoint)
    }
}

mod base64_state {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

fn nan_from_null<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Checkpoint file naming convention
#[derive(Debug, Clone, PartialEq)]
pub enum CheckpointName {
    /// `lr{learning_rate}_epoch{epoch}.pth`
    Regular {
        learning_rate: NameToken,
        epoch: usize,
    },
    /// `best_{metric}.pth` or `best_{metric}_{score}.pth`
    Best {
        metric: String,
        score: Option<NameToken>,
    },
}

impl CheckpointName {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self, CHECKPOINT_EXTENSION)
    }

    pub fn is_best(&self) -> bool {
        matches!(self, CheckpointName::Best { .. })
    }

    /// Parse a checkpoint file name.
    ///
    /// Learning rates and scores must be numeric. A trailing `_<number>` on a
    /// best checkpoint is read as its score, so a metric whose own name ends
    /// in a number (`best_top_5.pth`) reads back as metric `top` with score 5.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(&format!(".{}", CHECKPOINT_EXTENSION))?;

        if let Some(rest) = stem.strip_prefix("best_") {
            if rest.is_empty() {
                return None;
            }
            if let Some((metric, score)) = rest.rsplit_once('_') {
                let score = NameToken::from(score);
                if score.value().is_some() && !metric.is_empty() {
                    return Some(CheckpointName::Best {
                        metric: metric.to_string(),
                        score: Some(score),
                    });
                }
            }
            return Some(CheckpointName::Best {
                metric: rest.to_string(),
                score: None,
            });
        }

        let rest = stem.strip_prefix("lr")?;
        let (learning_rate, epoch) = rest.rsplit_once("_epoch")?;
        let learning_rate = NameToken::from(learning_rate);
        learning_rate.value()?;
        Some(CheckpointName::Regular {
            learning_rate,
            epoch: epoch.parse().ok()?,
        })
    }
}

impl fmt::Display for CheckpointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointName::Regular {
                learning_rate,
                epoch,
            } => write!(f, "lr{}_epoch{}", learning_rate, epoch),
            CheckpointName::Best {
                metric,
                score: Some(score),
            } => write!(f, "best_{}_{}", metric, score),
            CheckpointName::Best {
                metric,
                score: None,
            } => write!(f, "best_{}", metric),
        }
    }
}

/// `<log_dir>/checkpoints`
pub fn checkpoint_dir(log_dir: &Path) -> PathBuf {
    log_dir.join(CHECKPOINT_DIR)
}

/// Saves and restores training snapshots
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    embed_score_in_best_name: bool,
    optimizer_required_on_load: bool,
}

impl Default for CheckpointStore {
    fn default() -> Self {
        Self::from_config(&RunConfig::default())
    }
}

impl CheckpointStore {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            embed_score_in_best_name: config.embed_score_in_best_name,
            optimizer_required_on_load: config.optimizer_required_on_load,
        }
    }

    /// Configure whether scores are part of best checkpoint names
    pub fn embed_score_in_best_name(mut self, embed: bool) -> Self {
        self.embed_score_in_best_name = embed;
        self
    }

    /// Configure whether loading without an optimizer is an error
    pub fn optimizer_required_on_load(mut self, required: bool) -> Self {
        self.optimizer_required_on_load = required;
        self
    }

    /// Name a checkpoint.
    ///
    /// A non-empty `best` metric selects a best checkpoint; otherwise the
    /// regular per-epoch name is used. Floats are spelled as in
    /// [`format_float`](crate::training::token::format_float).
    pub fn checkpoint_name(
        &self,
        epoch: usize,
        learning_rate: impl Into<NameToken>,
        best: Option<&str>,
        score: Option<NameToken>,
    ) -> CheckpointName {
        match best.filter(|metric| !metric.is_empty()) {
            Some(metric) => CheckpointName::Best {
                metric: metric.to_string(),
                score: score.filter(|_| self.embed_score_in_best_name),
            },
            None => CheckpointName::Regular {
                learning_rate: learning_rate.into(),
                epoch,
            },
        }
    }

    /// Save a training snapshot under `<log_dir>/checkpoints/`.
    ///
    /// Any file already at the selected name is overwritten. Returns the
    /// written path.
    #[allow(clippy::too_many_arguments)]
    pub fn save<B, M, O>(
        &self,
        log_dir: &Path,
        model: &M,
        optimizer: &O,
        epoch: usize,
        loss: f64,
        learning_rate: impl Into<NameToken>,
        best: Option<&str>,
        score: Option<NameToken>,
    ) -> Result<PathBuf>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let dir = checkpoint_dir(log_dir);
        fs::create_dir_all(&dir)?;

        let name = self.checkpoint_name(epoch, learning_rate, best, score);
        let path = dir.join(name.file_name());

        let recorder = StateRecorder::default();
        let model_state_dict = Recorder::<B>::record(&recorder, model.clone().into_record(), ())?;
        let optimizer_state_dict = Recorder::<B>::record(&recorder, optimizer.to_record(), ())?;

        let checkpoint = Checkpoint {
            epoch,
            model_state_dict,
            optimizer_state_dict,
            loss,
        };
        checkpoint.write(&path)?;

        if !name.is_best() {
            info!("Saving checkpoint to {}", name);
        }

        Ok(path)
    }

    /// Restore `model` and, when given, `optimizer` from a checkpoint file.
    ///
    /// Tensors are placed on `device` and the model is moved there. Both are
    /// updated in place; the returned reference is `model` itself.
    pub fn load<'m, B, M, O>(
        &self,
        checkpoint_path: &Path,
        model: &'m mut M,
        device: &B::Device,
        optimizer: Option<&mut O>,
    ) -> Result<&'m mut M>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B> + Clone,
    {
        let checkpoint = Checkpoint::read(checkpoint_path)?;
        let recorder = StateRecorder::default();

        match optimizer {
            Some(optimizer) => {
                let optimizer_record: O::Record = Recorder::<B>::load(
                    &recorder,
                    checkpoint.optimizer_state_dict,
                    device,
                )?;
                restore_model::<B, M>(&recorder, model, checkpoint.model_state_dict, device)?;
                *optimizer = optimizer.clone().load_record(optimizer_record);
            }
            None => {
                self.ensure_optimizer_optional(checkpoint_path)?;
                restore_model::<B, M>(&recorder, model, checkpoint.model_state_dict, device)?;
            }
        }

        debug!(
            "Restored epoch {} (loss {}) from {:?}",
            checkpoint.epoch, checkpoint.loss, checkpoint_path
        );
        Ok(model)
    }

    /// Restore only the model, on any backend.
    ///
    /// Fails when the store requires optimizer state on load.
    pub fn load_model<'m, B, M>(
        &self,
        checkpoint_path: &Path,
        model: &'m mut M,
        device: &B::Device,
    ) -> Result<&'m mut M>
    where
        B: Backend,
        M: Module<B>,
    {
        let checkpoint = Checkpoint::read(checkpoint_path)?;
        self.ensure_optimizer_optional(checkpoint_path)?;

        let recorder = StateRecorder::default();
        restore_model::<B, M>(&recorder, model, checkpoint.model_state_dict, device)?;

        debug!("Restored model weights from {:?}", checkpoint_path);
        Ok(model)
    }

    /// Known checkpoint files of a run: regular ones by epoch, then best ones
    /// by name. A missing checkpoint directory yields an empty list.
    pub fn list(&self, log_dir: &Path) -> Result<Vec<(PathBuf, CheckpointName)>> {
        let dir = checkpoint_dir(log_dir);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut checkpoints = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let parsed = path
                .file_name()
                .and_then(|s| s.to_str())
                .and_then(CheckpointName::parse);
            if let Some(name) = parsed {
                checkpoints.push((path, name));
            }
        }

        checkpoints.sort_by(|(a_path, a), (b_path, b)| match (a, b) {
            (
                CheckpointName::Regular { epoch: ea, .. },
                CheckpointName::Regular { epoch: eb, .. },
            ) => ea.cmp(eb).then_with(|| a_path.cmp(b_path)),
            (CheckpointName::Regular { .. }, CheckpointName::Best { .. }) => {
                std::cmp::Ordering::Less
            }
            (CheckpointName::Best { .. }, CheckpointName::Regular { .. }) => {
                std::cmp::Ordering::Greater
            }
            _ => a_path.cmp(b_path),
        });

        Ok(checkpoints)
    }

    /// Regular checkpoint with the highest epoch, for resuming
    pub fn latest(&self, log_dir: &Path) -> Result<Option<PathBuf>> {
        Ok(self
            .list(log_dir)?
            .into_iter()
            .filter(|(_, name)| !name.is_best())
            .last()
            .map(|(path, _)| path))
    }

    fn ensure_optimizer_optional(&self, checkpoint_path: &Path) -> Result<()> {
        if self.optimizer_required_on_load {
            return Err(TrainKitError::InvalidInput(format!(
                "optimizer state must be restored together with {:?}",
                checkpoint_path
            )));
        }
        Ok(())
    }
}

fn restore_model<B, M>(
    recorder: &StateRecorder,
    model: &mut M,
    state: Vec<u8>,
    device: &B::Device,
) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let record: M::Record = Recorder::<B>::load(recorder, state, device)?;

    let restored = model.clone().load_record(record);
    check_shapes(&param_shapes(model), &param_shapes(&restored))?;

    *model = restored.to_device(device);
    Ok(())
}

/// Collects parameter shapes in visiting order
#[derive(Default)]
struct ParamShapes(Vec<Vec<usize>>);

impl<B: Backend> ModuleVisitor<B> for ParamShapes {
    fn visit_float<const D: usize>(&mut self, _id: &ParamId, tensor: &Tensor<B, D>) {
        self.0.push(tensor.dims().to_vec());
    }

    fn visit_int<const D: usize>(&mut self, _id: &ParamId, tensor: &Tensor<B, D, Int>) {
        self.0.push(tensor.dims().to_vec());
    }

    fn visit_bool<const D: usize>(&mut self, _id: &ParamId, tensor: &Tensor<B, D, Bool>) {
        self.0.push(tensor.dims().to_vec());
    }
}

fn param_shapes<B: Backend, M: Module<B>>(model: &M) -> Vec<Vec<usize>> {
    let mut shapes = ParamShapes::default();
    model.visit(&mut shapes);
    shapes.0
}

/// Parameters are compared in visiting order; a missing one has the empty shape
fn check_shapes(expected: &[Vec<usize>], found: &[Vec<usize>]) -> Result<()> {
    for index in 0..expected.len().max(found.len()) {
        let want = expected.get(index).cloned().unwrap_or_default();
        let got = found.get(index).cloned().unwrap_or_default();
        if want != got {
            return Err(TrainKitError::ShapeMismatch {
                parameter: index,
                expected: want,
                found: got,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn::nn::{Linear, LinearConfig};
    use burn::optim::{AdamConfig, GradientsParams};
    use burn::tensor::Tensor;
    use burn_ndarray::NdArray;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    type InnerBackend = NdArray;
    type TestBackend = Autodiff<InnerBackend>;

    #[derive(Module, Debug)]
    struct TinyNet<B: Backend> {
        linear: Linear<B>,
    }

    impl<B: Backend> TinyNet<B> {
        fn new(d_output: usize, device: &B::Device) -> Self {
            Self::with_input(4, d_output, device)
        }

        fn with_input(d_input: usize, d_output: usize, device: &B::Device) -> Self {
            Self {
                linear: LinearConfig::new(d_input, d_output).init(device),
            }
        }

        fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
            self.linear.forward(input)
        }

        fn weights(&self) -> Vec<f32> {
            self.linear.weight.val().into_data().to_vec::<f32>().unwrap()
        }
    }

    #[derive(Module, Debug)]
    struct OtherNet<B: Backend> {
        encoder: Linear<B>,
    }

    fn train_step<O>(
        model: TinyNet<TestBackend>,
        optimizer: &mut O,
        device: &<TestBackend as Backend>::Device,
    ) -> TinyNet<TestBackend>
    where
        O: Optimizer<TinyNet<TestBackend>, TestBackend>,
    {
        let input = Tensor::<TestBackend, 2>::from_floats([[1.0, -2.0, 0.5, 3.0]], device);
        let loss = model.forward(input).powf_scalar(2.0).mean();
        let grads = GradientsParams::from_grads(loss.backward(), &model);
        optimizer.step(1e-2, model, grads)
    }

    fn file_count(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    /// `None` typed after an existing optimizer
    fn no_optimizer<'a, O>(_: &O) -> Option<&'a mut O> {
        None
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_checkpoint_names() {
        let store = CheckpointStore::default();

        assert_eq!(
            store.checkpoint_name(5, 0.0003, None, None).file_name(),
            "lr0.0003_epoch5.pth"
        );
        assert_eq!(
            store
                .checkpoint_name(5, 0.0003, Some("accuracy"), Some(0.87.into()))
                .file_name(),
            "best_accuracy_0.87.pth"
        );
        assert_eq!(
            store
                .checkpoint_name(5, 0.0003, Some("accuracy"), None)
                .file_name(),
            "best_accuracy.pth"
        );
        // An empty metric name falls back to the regular name
        assert_eq!(
            store.checkpoint_name(2, 0.1, Some(""), Some(0.5.into())).file_name(),
            "lr0.1_epoch2.pth"
        );
    }

    #[test]
    fn test_checkpoint_name_number_spelling() {
        let store = CheckpointStore::default();

        assert_eq!(
            store.checkpoint_name(5, 1.0, None, None).file_name(),
            "lr1.0_epoch5.pth"
        );
        assert_eq!(
            store.checkpoint_name(5, 1e-5, None, None).file_name(),
            "lr1e-05_epoch5.pth"
        );
        assert_eq!(
            store.checkpoint_name(5, "3e-4", None, None).file_name(),
            "lr3e-4_epoch5.pth"
        );
        assert_eq!(
            store
                .checkpoint_name(5, 1e-5, Some("accuracy"), Some(1.0.into()))
                .file_name(),
            "best_accuracy_1.0.pth"
        );

        let parsed = CheckpointName::parse("lr1e-05_epoch5.pth").unwrap();
        assert_eq!(parsed.file_name(), "lr1e-05_epoch5.pth");
    }

    #[test]
    fn test_score_omitted_when_not_embedded() {
        let store = CheckpointStore::default().embed_score_in_best_name(false);
        assert_eq!(
            store
                .checkpoint_name(1, 0.01, Some("f1"), Some(0.91.into()))
                .file_name(),
            "best_f1.pth"
        );
    }

    #[test]
    fn test_parse_checkpoint_names() {
        assert_eq!(
            CheckpointName::parse("lr0.0003_epoch5.pth"),
            Some(CheckpointName::Regular {
                learning_rate: "0.0003".into(),
                epoch: 5
            })
        );
        assert_eq!(
            CheckpointName::parse("best_accuracy_0.87.pth"),
            Some(CheckpointName::Best {
                metric: "accuracy".to_string(),
                score: Some("0.87".into())
            })
        );
        assert_eq!(
            CheckpointName::parse("best_val_loss.pth"),
            Some(CheckpointName::Best {
                metric: "val_loss".to_string(),
                score: None
            })
        );
        assert_eq!(CheckpointName::parse("lr0.1_epoch5.json"), None);
        assert_eq!(CheckpointName::parse("lrabc_epoch5.pth"), None);
        assert_eq!(CheckpointName::parse("best_.pth"), None);
        assert_eq!(CheckpointName::parse("model.pth"), None);
    }

    #[test]
    fn test_save_load_round_trip() {
        let device = Default::default();
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::default();

        let mut optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        let model = TinyNet::<TestBackend>::new(2, &device);
        let model = train_step(model, &mut optimizer, &device);

        let path = store
            .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 5, 0.25, 0.0003, None, None)
            .unwrap();
        assert_eq!(
            path,
            temp_dir.path().join("checkpoints").join("lr0.0003_epoch5.pth")
        );

        let mut fresh_model = TinyNet::<TestBackend>::new(2, &device);
        let mut fresh_optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        assert_ne!(fresh_model.weights(), model.weights());
        assert!(fresh_optimizer.to_record().is_empty());

        let restored = store
            .load::<TestBackend, _, _>(&path, &mut fresh_model, &device, Some(&mut fresh_optimizer))
            .unwrap();
        assert_eq!(restored.weights(), model.weights());
        assert_eq!(fresh_model.weights(), model.weights());

        // Adam moments and step count came back: the next step is identical
        let continued = train_step(model, &mut optimizer, &device);
        let resumed = train_step(fresh_model, &mut fresh_optimizer, &device);
        assert_eq!(resumed.weights(), continued.weights());
    }

    #[test]
    fn test_load_without_optimizer() {
        let device = Default::default();
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::default();

        let mut optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        let model = TinyNet::<TestBackend>::new(2, &device);
        let model = train_step(model, &mut optimizer, &device);
        let path = store
            .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 1, 0.5, 0.01, None, None)
            .unwrap();

        let unused = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        let mut target = TinyNet::<TestBackend>::new(2, &device);
        store
            .load::<TestBackend, _, _>(&path, &mut target, &device, no_optimizer(&unused))
            .unwrap();
        assert_eq!(target.weights(), model.weights());

        // A fresh optimizer does not reproduce the continued run
        let mut fresh_optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        let continued = train_step(model, &mut optimizer, &device);
        let restarted = train_step(target, &mut fresh_optimizer, &device);
        assert_ne!(restarted.weights(), continued.weights());
    }

    #[test]
    fn test_legacy_load_requires_optimizer() {
        let device = Default::default();
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::from_config(&RunConfig::legacy());
        let optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        let model = TinyNet::<TestBackend>::new(2, &device);

        let path = store
            .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 1, 0.5, 0.1, None, None)
            .unwrap();

        let mut target = TinyNet::<TestBackend>::new(2, &device);
        let before = target.weights();
        assert!(matches!(
            store.load::<TestBackend, _, _>(&path, &mut target, &device, no_optimizer(&optimizer)),
            Err(TrainKitError::InvalidInput(_))
        ));
        assert_eq!(target.weights(), before);

        let mut restored_optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        store
            .load::<TestBackend, _, _>(&path, &mut target, &device, Some(&mut restored_optimizer))
            .unwrap();
        assert_eq!(target.weights(), model.weights());
    }

    #[test]
    fn test_notice_only_for_regular_saves() {
        let device = Default::default();
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::default();
        let optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        let model = TinyNet::<TestBackend>::new(2, &device);

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            store
                .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 3, 0.5, 0.01, None, None)
                .unwrap();
            store
                .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 3, 0.5, 0.01, Some("accuracy"), Some(0.9.into()))
                .unwrap();
        });

        let output = logs.contents();
        assert!(output.contains("Saving checkpoint to lr0.01_epoch3"));
        assert!(!output.contains("best_accuracy"));
    }

    #[test]
    fn test_checkpoint_contents() {
        let device = Default::default();
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::default();
        let optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        let model = TinyNet::<TestBackend>::new(2, &device);

        let path = store
            .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 7, 1.5, 0.01, Some("accuracy"), Some(0.87.into()))
            .unwrap();
        assert!(path.ends_with("best_accuracy_0.87.pth"));

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        for key in ["epoch", "model_state_dict", "optimizer_state_dict", "loss"] {
            assert!(raw.get(key).is_some(), "missing key {key}");
        }

        let checkpoint = Checkpoint::read(&path).unwrap();
        assert_eq!(checkpoint.epoch, 7);
        assert_eq!(checkpoint.loss, 1.5);
        assert!(!checkpoint.model_state_dict.is_empty());
    }

    #[test]
    fn test_save_overwrites_same_name() {
        let device = Default::default();
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::default();
        let optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        let model = TinyNet::<TestBackend>::new(2, &device);

        store
            .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 3, 0.9, 0.001, None, None)
            .unwrap();
        let path = store
            .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 3, 0.4, 0.001, None, None)
            .unwrap();

        assert_eq!(file_count(&checkpoint_dir(temp_dir.path())), 1);
        assert_eq!(Checkpoint::read(&path).unwrap().loss, 0.4);

        store
            .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 4, 0.3, 0.001, Some("acc"), Some(0.9.into()))
            .unwrap();
        store
            .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 6, 0.2, 0.001, Some("acc"), Some(0.9.into()))
            .unwrap();
        assert_eq!(file_count(&checkpoint_dir(temp_dir.path())), 2);
    }

    #[test]
    fn test_non_finite_loss_survives() {
        let device = Default::default();
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::default();
        let optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        let model = TinyNet::<TestBackend>::new(2, &device);

        let path = store
            .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 1, f64::NAN, 0.1, None, None)
            .unwrap();

        assert!(Checkpoint::read(&path).unwrap().loss.is_nan());
    }

    #[test]
    fn test_load_missing_path() {
        let device = Default::default();
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::default();
        let mut model = TinyNet::<TestBackend>::new(2, &device);
        let mut optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        let missing = temp_dir.path().join("checkpoints").join("lr0.1_epoch1.pth");

        assert!(matches!(
            store.load::<TestBackend, _, _>(&missing, &mut model, &device, Some(&mut optimizer)),
            Err(TrainKitError::PathNotFound(_))
        ));
        assert!(matches!(
            store.load_model::<TestBackend, _>(&missing, &mut model, &device),
            Err(TrainKitError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_load_model_on_inference_backend() {
        let device = Default::default();
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::default();
        let optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        let model = TinyNet::<TestBackend>::new(2, &device);

        let path = store
            .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 2, 0.5, 0.1, Some("accuracy"), None)
            .unwrap();

        let mut inference_model = TinyNet::<InnerBackend>::new(2, &device);
        store
            .load_model::<InnerBackend, _>(&path, &mut inference_model, &device)
            .unwrap();
        assert_eq!(inference_model.weights(), model.weights());
    }

    #[test]
    fn test_optimizer_required_on_load() {
        let device = Default::default();
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::from_config(&RunConfig::legacy());
        let optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        let model = TinyNet::<TestBackend>::new(2, &device);

        let path = store
            .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 1, 0.5, 0.1, None, None)
            .unwrap();

        let mut target = TinyNet::<TestBackend>::new(2, &device);
        let original = target.weights();
        assert!(matches!(
            store.load_model::<TestBackend, _>(&path, &mut target, &device),
            Err(TrainKitError::InvalidInput(_))
        ));
        assert_eq!(target.weights(), original);
    }

    #[test]
    fn test_shape_mismatch() {
        let device = Default::default();
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::default();
        let optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        let model = TinyNet::<TestBackend>::new(2, &device);

        let path = store
            .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 1, 0.5, 0.1, None, None)
            .unwrap();

        let mut wider = TinyNet::<InnerBackend>::new(3, &device);
        let result = store.load_model::<InnerBackend, _>(&path, &mut wider, &device);
        match result {
            Err(TrainKitError::ShapeMismatch {
                parameter,
                expected,
                found,
            }) => {
                assert_eq!(parameter, 0);
                assert_eq!(expected, vec![4, 3]);
                assert_eq!(found, vec![4, 2]);
            }
            other => panic!("expected a shape mismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_shape_mismatch_with_equal_parameter_count() {
        let device = Default::default();
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::default();
        let optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();

        // 4x6 + 6 and 5x5 + 5 both hold 30 parameters
        let model = TinyNet::<TestBackend>::with_input(4, 6, &device);
        let path = store
            .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 1, 0.5, 0.1, None, None)
            .unwrap();

        let mut square = TinyNet::<InnerBackend>::with_input(5, 5, &device);
        assert_eq!(square.num_params(), model.num_params());
        let before = square.weights();

        let result = store.load_model::<InnerBackend, _>(&path, &mut square, &device);
        match result {
            Err(TrainKitError::ShapeMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, vec![5, 5]);
                assert_eq!(found, vec![4, 6]);
            }
            other => panic!("expected a shape mismatch, got {:?}", other.map(|_| ())),
        }
        assert_eq!(square.weights(), before);
    }

    #[test]
    fn test_check_shapes_missing_parameter() {
        let result = check_shapes(&[vec![2, 2], vec![2]], &[vec![2, 2]]);
        assert!(matches!(
            result,
            Err(TrainKitError::ShapeMismatch { parameter: 1, .. })
        ));
        assert!(check_shapes(&[vec![3]], &[vec![3]]).is_ok());
    }

    #[test]
    fn test_incompatible_structure() {
        let device = Default::default();
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::default();
        let optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        let model = TinyNet::<TestBackend>::new(2, &device);

        let path = store
            .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 1, 0.5, 0.1, None, None)
            .unwrap();

        let mut other = OtherNet::<InnerBackend> {
            encoder: LinearConfig::new(4, 2).init(&device),
        };
        let result = store.load_model::<InnerBackend, _>(&path, &mut other, &device);
        assert!(matches!(result, Err(TrainKitError::Record(_))));
    }

    #[test]
    fn test_list_and_latest() {
        let device = Default::default();
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::default();
        let optimizer = AdamConfig::new().init::<TestBackend, TinyNet<TestBackend>>();
        let model = TinyNet::<TestBackend>::new(2, &device);

        assert!(store.list(temp_dir.path()).unwrap().is_empty());
        assert_eq!(store.latest(temp_dir.path()).unwrap(), None);

        for epoch in [10, 2, 1] {
            store
                .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, epoch, 0.5, 0.001, None, None)
                .unwrap();
        }
        store
            .save::<TestBackend, _, _>(temp_dir.path(), &model, &optimizer, 2, 0.5, 0.001, Some("accuracy"), Some(0.8.into()))
            .unwrap();
        fs::write(checkpoint_dir(temp_dir.path()).join("notes.txt"), "ignored").unwrap();

        let listed = store.list(temp_dir.path()).unwrap();
        let names: Vec<String> = listed.iter().map(|(_, name)| name.file_name()).collect();
        assert_eq!(
            names,
            vec![
                "lr0.001_epoch1.pth",
                "lr0.001_epoch2.pth",
                "lr0.001_epoch10.pth",
                "best_accuracy_0.8.pth",
            ]
        );

        let latest = store.latest(temp_dir.path()).unwrap().unwrap();
        assert!(latest.ends_with("lr0.001_epoch10.pth"));
    }
}
