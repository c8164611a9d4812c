use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised by the forecasting pipeline.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ForecastError {
    pub fn config<E: std::fmt::Display>(error: E) -> Self {
        ForecastError::InvalidConfig(error.to_string())
    }

    pub fn data<E: std::fmt::Display>(error: E) -> Self {
        ForecastError::Data(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
