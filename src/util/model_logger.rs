use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::segrnn::step_3_segrnn_model_arch::SegRnnConfig;
use crate::segrnn::step_4_train_model::{TrainingConfig, TrainingResults};
use crate::util::error::Result;

/// One training run: hyperparameters plus where the run ended up
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExperimentRecord {
    pub timestamp: String,
    pub model: SegRnnConfig,
    pub learning_rate: f64,
    pub weight_decay: f32,
    pub batch_size: usize,
    pub epochs_run: usize,
    pub final_learning_rate: Option<f64>,
    pub final_train_loss: Option<f64>,
    pub final_test_loss: Option<f64>,
    pub final_train_acc: Option<f64>,
    pub final_test_acc: Option<f64>,
    pub training_time_seconds: Option<f64>,
    pub notes: String,
}

impl ExperimentRecord {
    pub fn new(model: &SegRnnConfig, training: &TrainingConfig) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            model: model.clone(),
            learning_rate: training.learning_rate,
            weight_decay: training.weight_decay,
            batch_size: training.batch_size,
            epochs_run: 0,
            final_learning_rate: None,
            final_train_loss: None,
            final_test_loss: None,
            final_train_acc: None,
            final_test_acc: None,
            training_time_seconds: None,
            notes: String::new(),
        }
    }

    pub fn set_results(&mut self, results: &TrainingResults) {
        self.epochs_run = results.epochs();
        self.final_learning_rate = results.learning_rate.last().copied();
        self.final_train_loss = results.train_loss.last().copied();
        self.final_test_loss = results.test_loss.last().copied();
        self.final_train_acc = results.train_acc.last().copied();
        self.final_test_acc = results.test_acc.last().copied();
    }

    pub fn set_training_time(&mut self, seconds: f64) {
        self.training_time_seconds = Some(seconds);
    }

    pub fn add_note(&mut self, note: &str) {
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes.push_str(note);
    }

    /// Write the record as pretty JSON into `experiment_dir`
    pub fn save(&self, experiment_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(experiment_dir)?;

        let filename = format!(
            "segrnn_s{}_p{}_w{}_d{}_{}_experiment.json",
            self.model.seq_len,
            self.model.pred_len,
            self.model.seg_len,
            self.model.d_model,
            Local::now().format("%Y%m%d_%H%M%S"),
        );
        let file_path = experiment_dir.join(filename);

        let json = serde_json::to_string_pretty(&self)?;
        fs::write(&file_path, json)?;

        Ok(file_path)
    }
}
