// External imports
use burn::data::dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder};
use burn::data::dataset::Dataset;
use burn::tensor::{backend::Backend, Tensor, TensorData};
use log::{debug, info};
use polars::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Internal imports
use crate::util::error::{ForecastError, Result};

/// A contiguous multivariate series read from one CSV file.
///
/// Values are stored row-major: `values[row * channels + channel]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub name: String,
    pub columns: Vec<String>,
    pub channels: usize,
    pub rows: usize,
    pub values: Vec<f32>,
}

impl TimeSeries {
    /// Build a series from row-major values
    pub fn new(name: &str, columns: Vec<String>, values: Vec<f32>) -> Result<Self> {
        let channels = columns.len();
        if channels == 0 {
            return Err(ForecastError::data(format!("Series '{}' has no channels", name)));
        }
        if values.len() % channels != 0 {
            return Err(ForecastError::data(format!(
                "Series '{}' holds {} values, not a multiple of {} channels",
                name,
                values.len(),
                channels
            )));
        }

        Ok(Self {
            name: name.to_string(),
            rows: values.len() / channels,
            columns,
            channels,
            values,
        })
    }

    /// Row-major slice of `len` rows starting at `start`
    pub fn rows_slice(&self, start: usize, len: usize) -> &[f32] {
        &self.values[start * self.channels..(start + len) * self.channels]
    }

    /// Split at `row`, returning the leading and trailing parts
    pub fn split_at(&self, row: usize) -> (TimeSeries, TimeSeries) {
        let row = row.min(self.rows);
        let (head, tail) = self.values.split_at(row * self.channels);
        let part = |suffix: &str, values: &[f32]| TimeSeries {
            name: format!("{}{}", self.name, suffix),
            columns: self.columns.clone(),
            channels: self.channels,
            rows: values.len() / self.channels,
            values: values.to_vec(),
        };
        (part("", head), part("#test", tail))
    }
}

/// Read one CSV file, keeping only numeric columns as channels
///
/// Rows holding a null in any column are dropped before conversion.
pub fn read_series_file<P: AsRef<Path>>(path: P) -> Result<TimeSeries> {
    let path = path.as_ref();
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    let df = df.drop_nulls::<String>(None)?;

    let mut columns = Vec::new();
    let mut channel_data: Vec<Vec<f64>> = Vec::new();
    for column in df.get_columns() {
        let numeric = matches!(
            column.dtype(),
            DataType::Float64
                | DataType::Float32
                | DataType::Int64
                | DataType::Int32
                | DataType::Int16
                | DataType::Int8
                | DataType::UInt64
                | DataType::UInt32
                | DataType::UInt16
                | DataType::UInt8
        );
        if !numeric {
            debug!("Skipping non-numeric column '{}' in {}", column.name(), path.display());
            continue;
        }

        let series = column.as_materialized_series().cast(&DataType::Float64)?;
        let values = series
            .f64()?
            .iter()
            .map(|v| v.ok_or_else(|| ForecastError::data(format!("Null in column '{}'", column.name()))))
            .collect::<Result<Vec<f64>>>()?;
        columns.push(column.name().to_string());
        channel_data.push(values);
    }

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("series")
        .to_string();
    if columns.is_empty() {
        return Err(ForecastError::data(format!(
            "No numeric columns found in {}",
            path.display()
        )));
    }

    // Interleave column vectors into row-major order
    let rows = df.height();
    let mut values = Vec::with_capacity(rows * columns.len());
    for row in 0..rows {
        for channel in &channel_data {
            values.push(channel[row] as f32);
        }
    }

    TimeSeries::new(&name, columns, values)
}

/// Read every `.csv` file of a directory in file-name order
///
/// All files must expose the same number of numeric channels.
pub fn read_series_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<TimeSeries>> {
    let dir = dir.as_ref();
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(ForecastError::EmptyDataset(format!(
            "No CSV files in {}",
            dir.display()
        )));
    }

    info!("Loading {} CSV files from {}", files.len(), dir.display());
    let series = files
        .par_iter()
        .map(read_series_file)
        .collect::<Result<Vec<_>>>()?;

    let channels = series[0].channels;
    if let Some(odd) = series.iter().find(|s| s.channels != channels) {
        return Err(ForecastError::data(format!(
            "Channel count mismatch: '{}' has {} channels, '{}' has {}",
            series[0].name, channels, odd.name, odd.channels
        )));
    }

    Ok(series)
}

/// Split every series chronologically, keeping the trailing `validation_split` share for testing
pub fn split_chronological(
    series: &[TimeSeries],
    validation_split: f64,
) -> Result<(Vec<TimeSeries>, Vec<TimeSeries>)> {
    if !(0.0..1.0).contains(&validation_split) {
        return Err(ForecastError::config(
            "Validation split must be in [0.0, 1.0)",
        ));
    }

    Ok(series
        .iter()
        .map(|s| s.split_at((s.rows as f64 * (1.0 - validation_split)) as usize))
        .unzip())
}

/// One training example: an input window followed by its forecast target.
#[derive(Debug, Clone)]
pub struct WindowItem {
    /// `seq_len * channels` values, row-major
    pub input: Vec<f32>,
    /// `pred_len * channels` values, row-major
    pub target: Vec<f32>,
}

/// Sliding windows over a set of series
///
/// Windows never straddle two series, so a file shorter than
/// `seq_len + pred_len` rows contributes nothing.
#[derive(Debug, Clone)]
pub struct WindowDataset {
    series: Vec<TimeSeries>,
    index: Vec<(usize, usize)>,
    seq_len: usize,
    pred_len: usize,
    channels: usize,
}

impl WindowDataset {
    pub fn new(series: Vec<TimeSeries>, seq_len: usize, pred_len: usize) -> Result<Self> {
        if seq_len == 0 || pred_len == 0 {
            return Err(ForecastError::config(
                "Sequence and prediction lengths must be positive",
            ));
        }
        let channels = series.first().map_or(0, |s| s.channels);
        if series.iter().any(|s| s.channels != channels) {
            return Err(ForecastError::data("Series disagree on channel count"));
        }

        let window = seq_len + pred_len;
        let index = series
            .iter()
            .enumerate()
            .flat_map(|(series_idx, s)| {
                let count = (s.rows + 1).saturating_sub(window);
                (0..count).map(move |start| (series_idx, start))
            })
            .collect();

        Ok(Self {
            series,
            index,
            seq_len,
            pred_len,
            channels,
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

impl Dataset<WindowItem> for WindowDataset {
    fn get(&self, index: usize) -> Option<WindowItem> {
        let &(series_idx, start) = self.index.get(index)?;
        let series = &self.series[series_idx];

        Some(WindowItem {
            input: series.rows_slice(start, self.seq_len).to_vec(),
            target: series.rows_slice(start + self.seq_len, self.pred_len).to_vec(),
        })
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}

/// Batch structure for training
#[derive(Debug, Clone)]
pub struct WindowBatch<B: Backend> {
    /// Input windows of shape [batch_size, seq_len, channels]
    pub inputs: Tensor<B, 3>,
    /// Targets of shape [batch_size, pred_len, channels]
    pub targets: Tensor<B, 3>,
}

/// Stacks window items into tensors
#[derive(Debug, Clone)]
pub struct WindowBatcher {
    seq_len: usize,
    pred_len: usize,
    channels: usize,
}

impl WindowBatcher {
    pub fn new(seq_len: usize, pred_len: usize, channels: usize) -> Self {
        Self {
            seq_len,
            pred_len,
            channels,
        }
    }
}

impl<B: Backend> Batcher<B, WindowItem, WindowBatch<B>> for WindowBatcher {
    fn batch(&self, items: Vec<WindowItem>, device: &B::Device) -> WindowBatch<B> {
        let batch_size = items.len();
        let mut inputs = Vec::with_capacity(batch_size * self.seq_len * self.channels);
        let mut targets = Vec::with_capacity(batch_size * self.pred_len * self.channels);
        for item in items {
            inputs.extend(item.input);
            targets.extend(item.target);
        }

        let inputs = Tensor::<B, 3>::from_data(
            TensorData::new(inputs, [batch_size, self.seq_len, self.channels]),
            device,
        );
        let targets = Tensor::<B, 3>::from_data(
            TensorData::new(targets, [batch_size, self.pred_len, self.channels]),
            device,
        );

        WindowBatch { inputs, targets }
    }
}

/// Batches of windows as produced by burn's data loader
pub type WindowLoader<B> = Arc<dyn DataLoader<B, WindowBatch<B>>>;

/// Build a data loader over a [`WindowDataset`]
///
/// With a shuffle seed the windows are reshuffled at the start of every
/// iteration; without one they come in dataset order.
pub fn window_loader<B: Backend>(
    dataset: WindowDataset,
    batch_size: usize,
    shuffle_seed: Option<u64>,
    num_workers: usize,
    device: &B::Device,
) -> WindowLoader<B> {
    let batcher = WindowBatcher::new(dataset.seq_len, dataset.pred_len, dataset.channels);
    let mut builder = DataLoaderBuilder::<B, WindowItem, WindowBatch<B>>::new(batcher)
        .batch_size(batch_size.max(1))
        .num_workers(num_workers.max(1))
        .set_device(device.clone());
    if let Some(seed) = shuffle_seed {
        builder = builder.shuffle(seed);
    }
    builder.build(dataset)
}
