// External imports
use burn::tensor::{Distribution, Tensor};
use burn_ndarray::{NdArray, NdArrayDevice};

// Internal imports
use crate::segrnn::step_1_window_dataset::TimeSeries;
use crate::segrnn::step_2_gru_cell::GRU;
use crate::segrnn::step_3_segrnn_model_arch::SegRnnConfig;
use crate::segrnn::step_5_prediction::{forecast, forecast_latest};
use crate::util::error::ForecastError;

type TestBackend = NdArray<f32>;

fn to_vec<const D: usize>(tensor: Tensor<TestBackend, D>) -> Vec<f32> {
    tensor.into_data().convert::<f32>().to_vec::<f32>().unwrap()
}

fn small_config() -> SegRnnConfig {
    SegRnnConfig::new(3, 24, 12, 6, 16, 0.0)
}

#[test]
fn test_gru_forward_pass() {
    let device = NdArrayDevice::Cpu;

    // batch_size=2, seq_len=3, input_size=4
    let input = Tensor::<TestBackend, 3>::ones([2, 3, 4], &device);
    let gru = GRU::<TestBackend>::new(4, 5, &device);

    let (output, h_n) = gru.forward(input, None);

    assert_eq!(output.dims(), [2, 3, 5]);
    assert_eq!(h_n.dims(), [2, 5]);

    // The last output step is the final hidden state
    let last = output.narrow(1, 2, 1).reshape([2, 5]);
    assert_eq!(to_vec(last), to_vec(h_n.clone()));

    for val in to_vec(h_n) {
        assert!(!val.is_nan(), "Output contains NaN values");
        assert!(val.abs() <= 1.0, "GRU states stay within tanh range");
    }
}

#[test]
fn test_gru_initial_state_is_used() {
    let device = NdArrayDevice::Cpu;
    let input = Tensor::<TestBackend, 3>::ones([2, 1, 4], &device);
    let gru = GRU::<TestBackend>::new(4, 5, &device);

    let (_, from_zeros) = gru.forward(input.clone(), None);
    let (_, explicit_zeros) = gru.forward(input.clone(), Some(Tensor::zeros([2, 5], &device)));
    let (_, from_ones) = gru.forward(input, Some(Tensor::ones([2, 5], &device)));

    assert_eq!(to_vec(from_zeros.clone()), to_vec(explicit_zeros));
    assert_ne!(to_vec(from_zeros), to_vec(from_ones));
}

#[test]
fn test_gru_param_shapes() {
    let device = NdArrayDevice::Cpu;
    let gru = GRU::<TestBackend>::new(4, 5, &device);

    assert_eq!(
        gru.param_shapes(),
        vec![vec![4, 15], vec![15], vec![5, 15], vec![15]]
    );
}

#[test]
fn test_segrnn_output_shape() {
    let device = NdArrayDevice::Cpu;
    let model = small_config().init::<TestBackend>(&device).unwrap();
    assert_eq!(model.seg_num_x(), 4);
    assert_eq!(model.seg_num_y(), 2);

    let input = Tensor::<TestBackend, 3>::random([4, 24, 3], Distribution::Normal(0.0, 1.0), &device);
    let output = model.forward(input);

    assert_eq!(output.dims(), [4, 12, 3]);
    for val in to_vec(output) {
        assert!(val.is_finite(), "Output contains non-finite values");
    }
}

#[test]
fn test_segrnn_single_segment() {
    let device = NdArrayDevice::Cpu;
    let model = SegRnnConfig::new(1, 4, 4, 4, 2, 0.0)
        .init::<TestBackend>(&device)
        .unwrap();

    let output = model.forward(Tensor::<TestBackend, 3>::zeros([1, 4, 1], &device));
    assert_eq!(output.dims(), [1, 4, 1]);
}

#[test]
fn test_segrnn_shift_equivariance() {
    let device = NdArrayDevice::Cpu;
    let model = small_config().init::<TestBackend>(&device).unwrap();

    let input = Tensor::<TestBackend, 3>::random([2, 24, 3], Distribution::Normal(0.0, 1.0), &device);
    let base = to_vec(model.forward(input.clone()));
    let shifted = to_vec(model.forward(input.add_scalar(5.0)));

    // Last-value normalization makes the forecast follow a level shift exactly
    for (b, s) in base.iter().zip(shifted.iter()) {
        assert!((s - b - 5.0).abs() < 1e-3, "expected {} + 5, got {}", b, s);
    }
}

#[test]
fn test_segrnn_batch_matches_single_samples() {
    let device = NdArrayDevice::Cpu;
    let model = small_config().init::<TestBackend>(&device).unwrap();

    let input = Tensor::<TestBackend, 3>::random([3, 24, 3], Distribution::Normal(0.0, 1.0), &device);
    let batched = to_vec(model.forward(input.clone()));

    // Each sample on its own must give the same forecast as inside the batch
    let singles: Vec<Tensor<TestBackend, 3>> = (0..3)
        .map(|i| model.forward(input.clone().slice([i..i + 1, 0..24, 0..3])))
        .collect();
    let stacked = to_vec(Tensor::cat(singles, 0));

    assert_eq!(batched.len(), stacked.len());
    for (b, s) in batched.iter().zip(stacked.iter()) {
        assert!((b - s).abs() < 1e-5, "batched {} vs single {}", b, s);
    }
}

#[test]
fn test_segrnn_channels_are_distinguished() {
    let device = NdArrayDevice::Cpu;
    let model = small_config().init::<TestBackend>(&device).unwrap();

    // Identical history on every channel; only the channel embedding differs
    let input = Tensor::<TestBackend, 3>::zeros([1, 24, 3], &device);
    let output = to_vec(model.forward(input));
    let first_step = &output[0..3];
    assert!(first_step[0] != first_step[1] || first_step[1] != first_step[2]);
}

#[test]
fn test_config_validation() {
    let valid = small_config();
    assert!(valid.validate().is_ok());

    let cases = [
        SegRnnConfig::new(0, 24, 12, 6, 16, 0.0),  // no channels
        SegRnnConfig::new(3, 25, 12, 6, 16, 0.0),  // seq_len not divisible
        SegRnnConfig::new(3, 24, 13, 6, 16, 0.0),  // pred_len not divisible
        SegRnnConfig::new(3, 24, 12, 0, 16, 0.0),  // zero segment
        SegRnnConfig::new(3, 24, 12, 6, 15, 0.0),  // odd d_model
        SegRnnConfig::new(3, 24, 12, 6, 16, 1.0),  // dropout out of range
    ];
    for config in cases {
        assert!(
            matches!(config.validate(), Err(ForecastError::InvalidConfig(_))),
            "{:?} should be rejected",
            config
        );
        assert!(config.init::<TestBackend>(&NdArrayDevice::Cpu).is_err());
    }
}

#[test]
fn test_forecast_window() {
    let device = NdArrayDevice::Cpu;
    let model = small_config().init::<TestBackend>(&device).unwrap();

    let window = Tensor::<TestBackend, 2>::ones([24, 3], &device);
    assert_eq!(forecast(&model, window).unwrap().dims(), [12, 3]);

    let wrong = Tensor::<TestBackend, 2>::ones([20, 3], &device);
    assert!(forecast(&model, wrong).is_err());
}

#[test]
fn test_forecast_latest() {
    let device = NdArrayDevice::Cpu;
    let model = small_config().init::<TestBackend>(&device).unwrap();
    let columns = vec!["a".to_string(), "b".to_string(), "c".to_string()];

    let series = TimeSeries::new(
        "long",
        columns.clone(),
        (0..30 * 3).map(|v| v as f32 * 0.01).collect(),
    )
    .unwrap();
    let rows = forecast_latest(&model, &series, &device).unwrap();
    assert_eq!(rows.len(), 12);
    assert!(rows.iter().all(|row| row.len() == 3));

    let short = TimeSeries::new("short", columns, vec![0.0; 10 * 3]).unwrap();
    assert!(forecast_latest(&model, &short, &device).is_err());

    let narrow = TimeSeries::new("narrow", vec!["a".to_string()], vec![0.0; 30]).unwrap();
    assert!(forecast_latest(&model, &narrow, &device).is_err());
}
