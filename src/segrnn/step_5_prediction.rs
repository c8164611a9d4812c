// External imports
use burn::tensor::{backend::Backend, Tensor, TensorData};

// Internal imports
use super::step_1_window_dataset::TimeSeries;
use super::step_3_segrnn_model_arch::SegRnn;
use crate::util::error::{ForecastError, Result};

/// Forecast a single window
///
/// # Arguments
///
/// * `model` - Trained model (use `model.valid()` for an autodiff model)
/// * `window` - Look-back window of shape [seq_len, enc_in]
///
/// # Returns
///
/// Forecast of shape [pred_len, enc_in]
pub fn forecast<B: Backend>(model: &SegRnn<B>, window: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
    let [seq_len, channels] = window.dims();
    if seq_len != model.seq_len() || channels != model.enc_in() {
        return Err(ForecastError::data(format!(
            "Window shape [{}, {}] does not match model input [{}, {}]",
            seq_len,
            channels,
            model.seq_len(),
            model.enc_in()
        )));
    }

    let output = model.forward(window.unsqueeze_dim::<3>(0));
    Ok(output.squeeze::<2>(0))
}

/// Forecast the steps following the end of a series
///
/// Uses the last `seq_len` rows as the look-back window and returns
/// `pred_len` rows of `enc_in` values each.
pub fn forecast_latest<B: Backend>(
    model: &SegRnn<B>,
    series: &TimeSeries,
    device: &B::Device,
) -> Result<Vec<Vec<f32>>> {
    let seq_len = model.seq_len();
    if series.rows < seq_len {
        return Err(ForecastError::data(format!(
            "Series '{}' has {} rows, need at least {}",
            series.name, series.rows, seq_len
        )));
    }
    if series.channels != model.enc_in() {
        return Err(ForecastError::data(format!(
            "Series '{}' has {} channels, model expects {}",
            series.name,
            series.channels,
            model.enc_in()
        )));
    }

    let window = series.rows_slice(series.rows - seq_len, seq_len).to_vec();
    let window = Tensor::<B, 2>::from_data(TensorData::new(window, [seq_len, series.channels]), device);

    let values = forecast(model, window)?
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| ForecastError::data(format!("{:?}", e)))?;

    Ok(values
        .chunks(series.channels)
        .map(|row| row.to_vec())
        .collect())
}
