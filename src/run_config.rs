// External imports
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// Internal imports
use crate::constants::{CHECKPOINT_PATH, TEST_DATA_DIR, TRAIN_DATA_DIR, VALIDATION_SPLIT_RATIO};
use crate::segrnn::step_3_segrnn_model_arch::SegRnnConfig;
use crate::segrnn::step_4_train_model::TrainingConfig;
use crate::util::error::{ForecastError, Result};

/// Everything one training run needs, loadable from a JSON file
///
/// Missing fields fall back to their defaults, so a config file only has to
/// name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory of training CSV files
    pub train_dir: PathBuf,
    /// Directory of test CSV files; when absent the training series are split
    pub test_dir: Option<PathBuf>,
    /// Trailing share of each series held out when `test_dir` is absent
    pub validation_split: f64,
    /// Checkpoint base path; `.bin` and `.meta.json` are appended
    pub checkpoint_path: PathBuf,
    /// Where to write an experiment record, if anywhere
    pub experiment_dir: Option<PathBuf>,
    /// Model architecture; `enc_in` 0 means "take it from the data"
    pub model: SegRnnConfig,
    pub training: TrainingConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            train_dir: PathBuf::from(TRAIN_DATA_DIR),
            test_dir: Some(PathBuf::from(TEST_DATA_DIR)),
            validation_split: VALIDATION_SPLIT_RATIO,
            checkpoint_path: PathBuf::from(CHECKPOINT_PATH),
            experiment_dir: None,
            model: SegRnnConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Model config with `enc_in` resolved against the loaded data
    pub fn resolve_model(&self, data_channels: usize) -> Result<SegRnnConfig> {
        let mut model = self.model.clone();
        if model.enc_in == 0 {
            model.enc_in = data_channels;
        } else if model.enc_in != data_channels {
            return Err(ForecastError::config(format!(
                "Configured enc_in {} but the data has {} channels",
                model.enc_in, data_channels
            )));
        }
        model.validate()?;
        Ok(model)
    }
}
