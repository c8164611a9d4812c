// External crates
use anyhow::{Context, Result};
use burn::module::AutodiffModule;
use log::{info, warn};
use std::env;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

// Local modules
use segrnn_forecast::constants::RUN_CONFIG_FILE;
use segrnn_forecast::run_config::RunConfig;
use segrnn_forecast::segrnn::{
    step_1_window_dataset::{read_series_dir, split_chronological, TimeSeries, WindowDataset},
    step_4_train_model::{make_loaders, train, TrainingResults},
    step_5_prediction::forecast_latest,
    step_6_model_serialization::{load_checkpoint_or_init, save_checkpoint},
};
use segrnn_forecast::util::device::{select_device, TrainBackend};
use segrnn_forecast::util::model_logger::ExperimentRecord;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Optional first argument: path of a JSON run config
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(RUN_CONFIG_FILE));
    let config = if config_path.exists() {
        RunConfig::load(&config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?
    } else {
        let config = RunConfig::default();
        config.save(&config_path)?;
        info!("Created default config at {}", config_path.display());
        config
    };

    let device = select_device();

    // Load data
    let (train_series, test_series) = load_series(&config)?;
    let channels = train_series[0].channels;
    let model_config = config.resolve_model(channels)?;
    info!(
        "Data: {} train series, {} test series, {} channels",
        train_series.len(),
        test_series.len(),
        channels
    );

    // Last test series, used for the closing forecast
    let forecast_series = test_series.last().cloned();

    let train_dataset =
        WindowDataset::new(train_series, model_config.seq_len, model_config.pred_len)?;
    let test_dataset =
        WindowDataset::new(test_series, model_config.seq_len, model_config.pred_len)?;
    let (train_loader, test_loader) =
        make_loaders::<TrainBackend>(train_dataset, test_dataset, &config.training, &device);

    // Resume from the checkpoint when it fits the configured architecture
    let (model, _status) = load_checkpoint_or_init::<TrainBackend>(
        &model_config,
        &config.checkpoint_path,
        &device,
    )?;

    let started = Instant::now();
    let (model, results) = train(model, &train_loader, &test_loader, &config.training)
        .context("Training failed")?;
    let elapsed = started.elapsed().as_secs_f64();
    log_results(&results, elapsed);

    save_checkpoint(&model, &model_config, Some(&results), &config.checkpoint_path)
        .context("Failed to save checkpoint")?;

    // Forecast past the end of the last test series
    if let Some(series) = &forecast_series {
        match forecast_latest(&model.valid(), series, &device) {
            Ok(rows) => log_forecast(series, &rows),
            Err(e) => warn!("Skipping forecast: {}", e),
        }
    }

    if let Some(dir) = &config.experiment_dir {
        let mut record = ExperimentRecord::new(&model_config, &config.training);
        record.set_results(&results);
        record.set_training_time(elapsed);
        record.add_note(&format!("config: {}", config_path.display()));
        let path = record.save(dir)?;
        info!("Experiment record written to {}", path.display());
    }

    Ok(())
}

fn load_series(config: &RunConfig) -> Result<(Vec<TimeSeries>, Vec<TimeSeries>)> {
    let train_series = read_series_dir(&config.train_dir)
        .with_context(|| format!("Failed to load training data from {}", config.train_dir.display()))?;

    match &config.test_dir {
        Some(dir) => {
            let test_series = read_series_dir(dir)
                .with_context(|| format!("Failed to load test data from {}", dir.display()))?;
            if test_series[0].channels != train_series[0].channels {
                anyhow::bail!(
                    "Train data has {} channels but test data has {}",
                    train_series[0].channels,
                    test_series[0].channels
                );
            }
            Ok((train_series, test_series))
        }
        None => {
            info!(
                "No test directory configured, holding out the last {:.0}% of each series",
                config.validation_split * 100.0
            );
            Ok(split_chronological(&train_series, config.validation_split)?)
        }
    }
}

fn log_results(results: &TrainingResults, seconds: f64) {
    info!("Training finished: {} epochs in {:.1}s", results.epochs(), seconds);
    for name in ["train_loss", "test_loss", "train_acc", "test_acc"] {
        if let Some(last) = results.metric(name).and_then(|values| values.last()) {
            info!("  final {}: {:.5}", name, last);
        }
    }
}

fn log_forecast(series: &TimeSeries, rows: &[Vec<f32>]) {
    info!(
        "Forecast for the next {} steps of '{}' ({})",
        rows.len(),
        series.name,
        series.columns.join(", ")
    );
    for (step, row) in rows.iter().enumerate() {
        let values: Vec<String> = row.iter().map(|v| format!("{:.3}", v)).collect();
        info!("  t+{}: {}", step + 1, values.join(", "));
    }
}
