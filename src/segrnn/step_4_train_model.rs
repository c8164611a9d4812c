// External imports
use burn::module::AutodiffModule;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::ElementConversion;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Instant;

// Internal imports
use super::step_1_window_dataset::{window_loader, WindowDataset, WindowLoader};
use super::step_3_segrnn_model_arch::SegRnn;
use crate::constants::{
    ACCURACY_TOLERANCE, BATCH_SIZE, EARLY_STOP_LOSS, EPOCHS, LEARNING_RATE, LOG_EVERY_EPOCHS,
    NUM_WORKERS, PLATEAU_COOLDOWN, PLATEAU_FACTOR, PLATEAU_MIN_LR, PLATEAU_PATIENCE,
    PLATEAU_THRESHOLD, WEIGHT_DECAY,
};
use crate::util::error::{ForecastError, Result};
use crate::util::lr_scheduler::ReduceLrOnPlateau;
use crate::util::metrics::{accuracy, mse};

/// Struct for configuring SegRNN training
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    /// L2 penalty applied by Adam
    pub weight_decay: f32,
    pub batch_size: usize,
    pub epochs: usize,
    /// Training stops once the test loss drops below this value
    pub early_stop_loss: f64,
    /// Epochs between info-level progress lines
    pub log_every: usize,
    /// Absolute error counted as a correct prediction
    pub accuracy_tolerance: f64,
    pub plateau_patience: usize,
    pub plateau_factor: f64,
    /// Relative improvement the test loss must make to reset the plateau count
    pub plateau_threshold: f64,
    /// Epochs after a reduction before bad epochs count again
    pub plateau_cooldown: usize,
    /// Floor for the learning rate
    pub plateau_min_lr: f64,
    /// Seed for shuffling training windows; random when absent
    pub shuffle_seed: Option<u64>,
    /// Data loader worker threads
    pub num_workers: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: LEARNING_RATE,
            weight_decay: WEIGHT_DECAY,
            batch_size: BATCH_SIZE,
            epochs: EPOCHS,
            early_stop_loss: EARLY_STOP_LOSS,
            log_every: LOG_EVERY_EPOCHS,
            accuracy_tolerance: ACCURACY_TOLERANCE,
            plateau_patience: PLATEAU_PATIENCE,
            plateau_factor: PLATEAU_FACTOR,
            plateau_threshold: PLATEAU_THRESHOLD,
            plateau_cooldown: PLATEAU_COOLDOWN,
            plateau_min_lr: PLATEAU_MIN_LR,
            shuffle_seed: None,
            num_workers: NUM_WORKERS,
        }
    }
}

/// Mean loss and accuracy over the batches of one pass
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EpochMetrics {
    pub loss: f64,
    pub accuracy: f64,
}

/// Per-epoch history of a training run, one entry per completed epoch
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingResults {
    pub train_loss: Vec<f64>,
    pub test_loss: Vec<f64>,
    pub train_acc: Vec<f64>,
    pub test_acc: Vec<f64>,
    /// Learning rate the epoch was trained with
    pub learning_rate: Vec<f64>,
}

impl TrainingResults {
    pub fn record(
        &mut self,
        train_loss: f64,
        test_loss: f64,
        train_acc: f64,
        test_acc: f64,
        learning_rate: f64,
    ) {
        self.train_loss.push(train_loss);
        self.test_loss.push(test_loss);
        self.train_acc.push(train_acc);
        self.test_acc.push(test_acc);
        self.learning_rate.push(learning_rate);
    }

    pub fn epochs(&self) -> usize {
        self.train_loss.len()
    }

    /// Look up a metric series by name
    pub fn metric(&self, name: &str) -> Option<&[f64]> {
        match name {
            "train_loss" => Some(&self.train_loss),
            "test_loss" => Some(&self.test_loss),
            "train_acc" => Some(&self.train_acc),
            "test_acc" => Some(&self.test_acc),
            "learning_rate" => Some(&self.learning_rate),
            _ => None,
        }
    }
}

/// Build the shuffled train loader and the sequential test loader
///
/// The test loader runs on the inner backend, matching `model.valid()`.
pub fn make_loaders<B: AutodiffBackend>(
    train: WindowDataset,
    test: WindowDataset,
    config: &TrainingConfig,
    device: &B::Device,
) -> (WindowLoader<B>, WindowLoader<B::InnerBackend>) {
    let seed = config.shuffle_seed.unwrap_or_else(rand::random);
    debug!("Shuffling training windows with seed {}", seed);
    (
        window_loader::<B>(train, config.batch_size, Some(seed), config.num_workers, device),
        window_loader::<B::InnerBackend>(test, config.batch_size, None, config.num_workers, device),
    )
}

/// Run one optimization pass over the training windows
///
/// Every batch goes through forward, MSE loss, backward and an Adam step.
/// Returns the updated model and the batch-averaged loss and accuracy.
pub fn train_step<B, O>(
    mut model: SegRnn<B>,
    loader: &WindowLoader<B>,
    optimizer: &mut O,
    learning_rate: f64,
    config: &TrainingConfig,
) -> (SegRnn<B>, EpochMetrics)
where
    B: AutodiffBackend,
    O: Optimizer<SegRnn<B>, B>,
{
    let loss_fn = MseLoss::new();
    let mut total_loss = 0.0;
    let mut total_acc = 0.0;
    let mut num_batches = 0usize;

    for batch in loader.iter() {
        let output = model.forward(batch.inputs);
        let loss = loss_fn.forward(output.clone(), batch.targets.clone(), Reduction::Mean);

        total_loss += loss.clone().into_scalar().elem::<f64>();
        total_acc += accuracy(output.detach(), batch.targets, config.accuracy_tolerance);

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optimizer.step(learning_rate, model, grads);
        num_batches += 1;
    }

    (model, averaged(total_loss, total_acc, num_batches))
}

/// Evaluate a model over the test windows without tracking gradients
pub fn test_step<B: Backend>(
    model: &SegRnn<B>,
    loader: &WindowLoader<B>,
    config: &TrainingConfig,
) -> EpochMetrics {
    let mut total_loss = 0.0;
    let mut total_acc = 0.0;
    let mut num_batches = 0usize;

    for batch in loader.iter() {
        let output = model.forward(batch.inputs);

        total_loss += mse(output.clone(), batch.targets.clone());
        total_acc += accuracy(output, batch.targets, config.accuracy_tolerance);
        num_batches += 1;
    }

    averaged(total_loss, total_acc, num_batches)
}

fn averaged(total_loss: f64, total_acc: f64, num_batches: usize) -> EpochMetrics {
    if num_batches == 0 {
        return EpochMetrics::default();
    }
    EpochMetrics {
        loss: total_loss / num_batches as f64,
        accuracy: total_acc / num_batches as f64,
    }
}

/// Train a SegRnn model, evaluating it after every epoch
///
/// Per epoch: train pass, test pass, plateau scheduler step on the test loss,
/// then early stopping once the test loss falls below `config.early_stop_loss`.
/// The stopping epoch is neither logged as progress nor recorded.
///
/// # Returns
///
/// The trained model and the per-epoch results
pub fn train<B: AutodiffBackend>(
    model: SegRnn<B>,
    train_loader: &WindowLoader<B>,
    test_loader: &WindowLoader<B::InnerBackend>,
    config: &TrainingConfig,
) -> Result<(SegRnn<B>, TrainingResults)> {
    if train_loader.num_items() == 0 {
        return Err(ForecastError::EmptyDataset(
            "Training set has no complete windows".to_string(),
        ));
    }
    if test_loader.num_items() == 0 {
        return Err(ForecastError::EmptyDataset(
            "Test set has no complete windows".to_string(),
        ));
    }

    let mut model = model;
    let mut optimizer = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(config.weight_decay)))
        .init();
    let mut scheduler = ReduceLrOnPlateau::new(
        config.learning_rate,
        config.plateau_factor,
        config.plateau_patience,
    )
    .with_threshold(config.plateau_threshold)
    .with_cooldown(config.plateau_cooldown)
    .with_min_lr(config.plateau_min_lr);
    let mut results = TrainingResults::default();

    info!(
        "Starting training: {} epochs, {} train windows, {} test windows",
        config.epochs,
        train_loader.num_items(),
        test_loader.num_items()
    );

    for epoch in 0..config.epochs {
        let started = Instant::now();
        let learning_rate = scheduler.current_lr();

        let (trained, train_metrics) =
            train_step(model, train_loader, &mut optimizer, learning_rate, config);
        model = trained;

        let test_metrics = test_step(&model.valid(), test_loader, config);
        scheduler.step(test_metrics.loss);

        if test_metrics.loss < config.early_stop_loss {
            info!(
                "Early stopping at epoch {}: test loss {:.5} below {}",
                epoch, test_metrics.loss, config.early_stop_loss
            );
            break;
        }

        results.record(
            train_metrics.loss,
            test_metrics.loss,
            train_metrics.accuracy,
            test_metrics.accuracy,
            learning_rate,
        );

        let line = format!(
            "Epoch {} | Train loss: {:.5} | Test loss: {:.5} | Train accuracy: {:.2} | Test accuracy: {:.2}",
            epoch,
            train_metrics.loss,
            test_metrics.loss,
            train_metrics.accuracy,
            test_metrics.accuracy
        );
        if config.log_every > 0 && epoch % config.log_every == 0 {
            info!("{}", line);
        } else {
            debug!("{} ({:.2?})", line, started.elapsed());
        }
    }

    Ok((model, results))
}
