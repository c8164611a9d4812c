// External imports
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

// Internal imports
use super::step_3_segrnn_model_arch::{SegRnn, SegRnnConfig};
use super::step_4_train_model::TrainingResults;
use crate::build_info;
use crate::constants::CHECKPOINT_META_EXTENSION;
use crate::util::error::{ForecastError, Result};

type CheckpointRecorder = BinFileRecorder<FullPrecisionSettings>;

/// # Checkpoint Metadata
///
/// Saved next to the parameter blob so a checkpoint can be matched against
/// the architecture it is loaded into, and rebuilt without knowing it upfront.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CheckpointMetadata {
    /// Crate version that wrote the checkpoint
    pub version: String,

    /// Unix timestamp when the checkpoint was saved
    pub timestamp: u64,

    /// Architecture of the saved parameters
    pub model: SegRnnConfig,

    /// Number of epochs recorded by the run that produced it
    pub epochs_trained: usize,

    /// Last test loss of that run, if any
    pub final_test_loss: Option<f64>,
}

impl CheckpointMetadata {
    pub fn new(model: &SegRnnConfig, results: Option<&TrainingResults>) -> Self {
        Self {
            version: build_info::PKG_VERSION.to_string(),
            timestamp: Utc::now().timestamp().max(0) as u64,
            model: model.clone(),
            epochs_trained: results.map_or(0, |r| r.epochs()),
            final_test_loss: results.and_then(|r| r.test_loss.last().copied()),
        }
    }
}

/// Outcome of trying to resume from a checkpoint
#[derive(Debug, Clone, PartialEq)]
pub enum CheckpointStatus {
    /// Parameters were restored from disk
    Loaded,
    /// No checkpoint at the path; the model keeps its random initialization
    Missing,
    /// A checkpoint exists but does not fit the model; random initialization is kept
    Mismatch(String),
}

/// Path of the parameter blob for a checkpoint base path
pub fn checkpoint_bin_path(path: &Path) -> PathBuf {
    path.with_extension("bin")
}

/// Path of the metadata file for a checkpoint base path
pub fn checkpoint_meta_path(path: &Path) -> PathBuf {
    path.with_extension(CHECKPOINT_META_EXTENSION)
}

/// Save the model parameters and metadata
///
/// Writes `<path>.bin` (burn binary record, full precision) and
/// `<path>.meta.json`. Missing parent directories are created.
///
/// # Returns
///
/// The path of the parameter blob
pub fn save_checkpoint<B: Backend>(
    model: &SegRnn<B>,
    config: &SegRnnConfig,
    results: Option<&TrainingResults>,
    path: &Path,
) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let bin_path = checkpoint_bin_path(path);
    model
        .clone()
        .save_file(bin_path.clone(), &CheckpointRecorder::new())
        .map_err(|e| {
            ForecastError::Checkpoint(format!("Failed to save {}: {:?}", bin_path.display(), e))
        })?;

    let metadata = CheckpointMetadata::new(config, results);
    fs::write(
        checkpoint_meta_path(path),
        serde_json::to_string_pretty(&metadata)?,
    )?;

    info!("Model parameters saved to {}", bin_path.display());
    Ok(bin_path)
}

/// Read the metadata written by [`save_checkpoint`]
pub fn read_metadata(path: &Path) -> Result<CheckpointMetadata> {
    let json = fs::read_to_string(checkpoint_meta_path(path))?;
    Ok(serde_json::from_str(&json)?)
}

fn load_into<B: Backend>(model: SegRnn<B>, path: &Path, device: &B::Device) -> Result<SegRnn<B>> {
    let expected = model.param_shapes();
    let bin_path = checkpoint_bin_path(path);
    // Some backends assert on shape while copying a record in; treat that as a mismatch too
    let loaded = panic::catch_unwind(AssertUnwindSafe(|| {
        model.load_file(bin_path.clone(), &CheckpointRecorder::new(), device)
    }))
    .map_err(|_| ForecastError::Checkpoint(format!("Failed to apply {}", bin_path.display())))?
    .map_err(|e| {
        ForecastError::Checkpoint(format!("Failed to read {}: {:?}", bin_path.display(), e))
    })?;

    let found = loaded.param_shapes();
    if found != expected {
        return Err(ForecastError::Checkpoint(format!(
            "Parameter shapes {:?} do not match expected {:?}",
            found, expected
        )));
    }
    Ok(loaded)
}

/// Build a model from `config` and restore saved parameters when they fit
///
/// A missing checkpoint, metadata describing another architecture, or a blob
/// that cannot be decoded into this model leaves the random initialization in
/// place. Only an invalid `config` is an error.
pub fn load_checkpoint_or_init<B: Backend>(
    config: &SegRnnConfig,
    path: &Path,
    device: &B::Device,
) -> Result<(SegRnn<B>, CheckpointStatus)> {
    let model = config.init::<B>(device)?;

    if !checkpoint_bin_path(path).exists() {
        info!(
            "No checkpoint at {}, starting from random initialization",
            checkpoint_bin_path(path).display()
        );
        return Ok((model, CheckpointStatus::Missing));
    }

    match read_metadata(path) {
        Ok(metadata) if !metadata.model.same_architecture(config) => {
            let reason = format!(
                "checkpoint architecture {:?} differs from {:?}",
                metadata.model, config
            );
            warn!("Saved model state mismatches current model: {}", reason);
            return Ok((model, CheckpointStatus::Mismatch(reason)));
        }
        Ok(metadata) => debug!(
            "Checkpoint written by version {} after {} epochs",
            metadata.version, metadata.epochs_trained
        ),
        Err(e) => debug!("Checkpoint metadata unavailable ({}), checking shapes only", e),
    }

    match load_into(model.clone(), path, device) {
        Ok(loaded) => {
            info!(
                "Model parameters loaded from {}",
                checkpoint_bin_path(path).display()
            );
            Ok((loaded, CheckpointStatus::Loaded))
        }
        Err(e) => {
            warn!("Saved model state mismatches current model: {}", e);
            Ok((model, CheckpointStatus::Mismatch(e.to_string())))
        }
    }
}

/// Load a checkpoint strictly, rebuilding the architecture from its metadata
pub fn load_checkpoint<B: Backend>(
    path: &Path,
    device: &B::Device,
) -> Result<(SegRnn<B>, CheckpointMetadata)> {
    let metadata = read_metadata(path)?;
    let model = load_into(metadata.model.init::<B>(device)?, path, device)?;
    Ok((model, metadata))
}
