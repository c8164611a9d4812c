// External imports
use burn::data::dataset::Dataset;
use burn_autodiff::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};

// Internal imports
use crate::segrnn::step_1_window_dataset::{window_loader, TimeSeries, WindowDataset};
use crate::segrnn::step_3_segrnn_model_arch::SegRnnConfig;
use crate::segrnn::step_4_train_model::{make_loaders, test_step, train, TrainingConfig};
use crate::util::error::ForecastError;
use crate::util::metrics::mse;

type TestAutodiffBackend = Autodiff<NdArray<f32>>;

const SEQ_LEN: usize = 8;
const PRED_LEN: usize = 4;

/// Two channels of linear ramps with different slopes
fn ramp_series(name: &str, rows: usize) -> TimeSeries {
    let slopes = [0.5f32, -0.3];
    let values = (0..rows)
        .flat_map(|t| slopes.iter().map(move |slope| slope * t as f32 + 1.0))
        .collect();
    TimeSeries::new(name, vec!["up".to_string(), "down".to_string()], values).unwrap()
}

fn model_config() -> SegRnnConfig {
    SegRnnConfig::new(2, SEQ_LEN, PRED_LEN, 4, 16, 0.0)
}

fn training_config(epochs: usize) -> TrainingConfig {
    TrainingConfig {
        learning_rate: 1e-2,
        weight_decay: 0.0,
        batch_size: 16,
        epochs,
        early_stop_loss: -1.0,
        log_every: 5,
        shuffle_seed: Some(1),
        ..TrainingConfig::default()
    }
}

fn datasets(train_rows: usize, test_rows: usize) -> (WindowDataset, WindowDataset) {
    (
        WindowDataset::new(
            vec![ramp_series("a", train_rows), ramp_series("b", train_rows)],
            SEQ_LEN,
            PRED_LEN,
        )
        .unwrap(),
        WindowDataset::new(vec![ramp_series("c", test_rows)], SEQ_LEN, PRED_LEN).unwrap(),
    )
}

#[test]
fn test_training_reduces_loss() {
    let device = NdArrayDevice::Cpu;
    let config = training_config(15);
    let (train_set, test_set) = datasets(80, 40);
    let (train_loader, test_loader) =
        make_loaders::<TestAutodiffBackend>(train_set, test_set, &config, &device);

    let model = model_config().init::<TestAutodiffBackend>(&device).unwrap();
    let (_, results) = train(model, &train_loader, &test_loader, &config).unwrap();

    assert_eq!(results.epochs(), 15);
    let first = results.train_loss[0];
    let last = *results.train_loss.last().unwrap();
    assert!(
        last < first,
        "Training loss should decrease: first {}, last {}",
        first,
        last
    );
    for loss in results.train_loss.iter().chain(results.test_loss.iter()) {
        assert!(loss.is_finite(), "Loss is not finite");
    }
}

#[test]
fn test_results_have_one_entry_per_epoch() {
    let device = NdArrayDevice::Cpu;
    let config = training_config(3);
    let (train_set, test_set) = datasets(30, 20);
    let (train_loader, test_loader) =
        make_loaders::<TestAutodiffBackend>(train_set, test_set, &config, &device);

    let model = model_config().init::<TestAutodiffBackend>(&device).unwrap();
    let (_, results) = train(model, &train_loader, &test_loader, &config).unwrap();

    assert_eq!(results.train_loss.len(), 3);
    assert_eq!(results.test_loss.len(), 3);
    assert_eq!(results.train_acc.len(), 3);
    assert_eq!(results.test_acc.len(), 3);
    assert_eq!(results.learning_rate, vec![1e-2; 3]);
    for acc in results.train_acc.iter().chain(results.test_acc.iter()) {
        assert!((0.0..=100.0).contains(acc), "Accuracy {} out of range", acc);
    }
}

#[test]
fn test_early_stopping_skips_stopping_epoch() {
    let device = NdArrayDevice::Cpu;
    let config = TrainingConfig {
        early_stop_loss: f64::INFINITY,
        ..training_config(10)
    };
    let (train_set, test_set) = datasets(30, 20);
    let (train_loader, test_loader) =
        make_loaders::<TestAutodiffBackend>(train_set, test_set, &config, &device);

    let model = model_config().init::<TestAutodiffBackend>(&device).unwrap();
    let (_, results) = train(model, &train_loader, &test_loader, &config).unwrap();

    // The epoch that triggers the stop is not recorded
    assert_eq!(results.epochs(), 0, "Training should stop during the first epoch");
}

#[test]
fn test_plateau_halves_learning_rate() {
    let device = NdArrayDevice::Cpu;
    // A threshold of 1.0 makes every epoch a non-improving one
    let config = TrainingConfig {
        plateau_patience: 0,
        plateau_threshold: 1.0,
        ..training_config(3)
    };
    let (train_set, test_set) = datasets(30, 20);
    let (train_loader, test_loader) =
        make_loaders::<TestAutodiffBackend>(train_set, test_set, &config, &device);

    let model = model_config().init::<TestAutodiffBackend>(&device).unwrap();
    let (_, results) = train(model, &train_loader, &test_loader, &config).unwrap();

    let expected = [1e-2, 5e-3, 2.5e-3];
    assert_eq!(results.learning_rate.len(), expected.len());
    for (lr, want) in results.learning_rate.iter().zip(expected) {
        assert!((lr - want).abs() < 1e-12, "learning rate {} should be {}", lr, want);
    }
}

#[test]
fn test_plateau_cooldown_and_min_lr() {
    let device = NdArrayDevice::Cpu;
    let config = TrainingConfig {
        plateau_patience: 0,
        plateau_threshold: 1.0,
        plateau_cooldown: 1,
        plateau_min_lr: 4e-3,
        ..training_config(4)
    };
    let (train_set, test_set) = datasets(30, 20);
    let (train_loader, test_loader) =
        make_loaders::<TestAutodiffBackend>(train_set, test_set, &config, &device);

    let model = model_config().init::<TestAutodiffBackend>(&device).unwrap();
    let (_, results) = train(model, &train_loader, &test_loader, &config).unwrap();

    // Halved, held for one cooldown epoch, then clamped at the floor
    let expected = [1e-2, 5e-3, 5e-3, 4e-3];
    assert_eq!(results.learning_rate.len(), expected.len());
    for (lr, want) in results.learning_rate.iter().zip(expected) {
        assert!((lr - want).abs() < 1e-12, "learning rate {} should be {}", lr, want);
    }
}

#[test]
fn test_step_reports_mean_squared_error() {
    let device = NdArrayDevice::Cpu;
    let config = training_config(1);
    let (_, test_set) = datasets(0, 20);
    let model = model_config().init::<NdArray<f32>>(&device).unwrap();

    // A single batch, so the batch average is the plain MSE
    let loader = window_loader::<NdArray<f32>>(test_set, 64, None, 1, &device);
    let batch = loader.iter().next().unwrap();
    let expected = mse(model.forward(batch.inputs), batch.targets);

    let metrics = test_step(&model, &loader, &config);
    assert!(
        (metrics.loss - expected).abs() < 1e-6,
        "test loss {} should equal mse {}",
        metrics.loss,
        expected
    );
    assert!((0.0..=100.0).contains(&metrics.accuracy));
}

#[test]
fn test_empty_datasets_are_rejected() {
    let device = NdArrayDevice::Cpu;
    let config = training_config(2);

    // Test series shorter than one window
    let (train_set, test_set) = datasets(30, SEQ_LEN + PRED_LEN - 1);
    assert_eq!(test_set.len(), 0);
    let (train_loader, test_loader) =
        make_loaders::<TestAutodiffBackend>(train_set, test_set, &config, &device);
    let model = model_config().init::<TestAutodiffBackend>(&device).unwrap();
    let result = train(model, &train_loader, &test_loader, &config);
    assert!(matches!(result, Err(ForecastError::EmptyDataset(_))));

    let (train_set, test_set) = datasets(5, 20);
    let (train_loader, test_loader) =
        make_loaders::<TestAutodiffBackend>(train_set, test_set, &config, &device);
    let model = model_config().init::<TestAutodiffBackend>(&device).unwrap();
    let result = train(model, &train_loader, &test_loader, &config);
    assert!(matches!(result, Err(ForecastError::EmptyDataset(_))));
}
