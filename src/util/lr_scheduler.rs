//! Learning rate reduction on plateaus of a monitored metric.

use log::info;

use crate::constants::{PLATEAU_EPS, PLATEAU_THRESHOLD};

/// Shrinks the learning rate once a minimized metric stops improving.
///
/// A metric counts as an improvement when it beats the best value seen so far
/// by more than the relative `threshold`. After more than `patience`
/// non-improving steps the rate is multiplied by `factor` (never below
/// `min_lr`), then `cooldown` steps pass before bad epochs count again.
#[derive(Clone, Debug)]
pub struct ReduceLrOnPlateau {
    lr: f64,
    factor: f64,
    patience: usize,
    threshold: f64,
    cooldown: usize,
    min_lr: f64,
    eps: f64,
    best: f64,
    num_bad_epochs: usize,
    cooldown_counter: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(lr: f64, factor: f64, patience: usize) -> Self {
        Self {
            lr,
            factor,
            patience,
            threshold: PLATEAU_THRESHOLD,
            cooldown: 0,
            min_lr: 0.0,
            eps: PLATEAU_EPS,
            best: f64::INFINITY,
            num_bad_epochs: 0,
            cooldown_counter: 0,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_cooldown(mut self, cooldown: usize) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_min_lr(mut self, min_lr: f64) -> Self {
        self.min_lr = min_lr;
        self
    }

    /// Current learning rate
    pub fn current_lr(&self) -> f64 {
        self.lr
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    fn is_better(&self, metric: f64) -> bool {
        // NaN compares false and never improves
        metric < self.best * (1.0 - self.threshold)
    }

    /// Feed the epoch's metric and get the learning rate for the next epoch.
    pub fn step(&mut self, metric: f64) -> f64 {
        if self.is_better(metric) {
            self.best = metric;
            self.num_bad_epochs = 0;
        } else {
            self.num_bad_epochs += 1;
        }

        if self.cooldown_counter > 0 {
            self.cooldown_counter -= 1;
            self.num_bad_epochs = 0;
        }

        if self.num_bad_epochs > self.patience {
            let new_lr = (self.lr * self.factor).max(self.min_lr);
            if self.lr - new_lr > self.eps {
                info!("Reducing learning rate from {:.4e} to {:.4e}", self.lr, new_lr);
                self.lr = new_lr;
            }
            self.cooldown_counter = self.cooldown;
            self.num_bad_epochs = 0;
        }

        self.lr
    }
}
