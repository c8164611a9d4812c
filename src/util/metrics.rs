use burn::tensor::{backend::Backend, ElementConversion, Tensor};

/// Mean squared error between two tensors of equal shape
pub fn mse<B: Backend, const D: usize>(pred: Tensor<B, D>, target: Tensor<B, D>) -> f64 {
    let diff = pred - target;
    (diff.clone() * diff).mean().into_scalar().elem::<f64>()
}

/// Share of elements, in percent, whose absolute error is within `tolerance`
///
/// Returns 0.0 for empty tensors.
pub fn accuracy<B: Backend, const D: usize>(
    pred: Tensor<B, D>,
    target: Tensor<B, D>,
    tolerance: f64,
) -> f64 {
    if pred.shape().num_elements() == 0 {
        return 0.0;
    }
    let hits = (pred - target).abs().lower_equal_elem(tolerance).float();
    hits.mean().into_scalar().elem::<f64>() * 100.0
}
