/// # SegRNN Implementation Module
///
/// This module implements SegRNN, a segment-wise GRU forecaster for
/// multivariate time series. Each channel's look-back window is cut into
/// fixed-length segments, so the recurrent layer runs over a handful of
/// segment embeddings rather than every time step, and the whole horizon is
/// decoded in one parallel step.
///
/// ## Module Structure:
///
/// 1. **step_1_window_dataset**: CSV loading, sliding windows, batching
/// 2. **step_2_gru_cell**: GRU layer with explicit initial and final state
/// 3. **step_3_segrnn_model_arch**: SegRNN architecture and configuration
/// 4. **step_4_train_model**: Training loop, evaluation and results record
/// 5. **step_5_prediction**: Forecasting from trained models
/// 6. **step_6_model_serialization**: Checkpoint saving and tolerant loading
///
pub mod step_1_window_dataset;
pub mod step_2_gru_cell;
pub mod step_3_segrnn_model_arch;
pub mod step_4_train_model;
pub mod step_5_prediction;
pub mod step_6_model_serialization;
