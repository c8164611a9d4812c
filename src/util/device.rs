//! Backend and device selection for the training binary.

use burn_autodiff::Autodiff;
use log::info;

#[cfg(not(feature = "tch"))]
use burn_ndarray::{NdArray, NdArrayDevice};

#[cfg(feature = "tch")]
use burn::tensor::Tensor;
#[cfg(feature = "tch")]
use burn_tch::{LibTorch, LibTorchDevice};

/// CPU ndarray backend with autodiff
#[cfg(not(feature = "tch"))]
pub type TrainBackend = Autodiff<NdArray<f32>>;

/// LibTorch backend with autodiff
#[cfg(feature = "tch")]
pub type TrainBackend = Autodiff<LibTorch<f32>>;

pub type TrainDevice = <TrainBackend as burn::tensor::backend::Backend>::Device;

/// Pick the device to train on
#[cfg(not(feature = "tch"))]
pub fn select_device() -> TrainDevice {
    info!("Using device: CPU (ndarray)");
    NdArrayDevice::Cpu
}

/// Pick the device to train on: CUDA 0 when usable, CPU otherwise
#[cfg(feature = "tch")]
pub fn select_device() -> TrainDevice {
    if cuda_available() {
        info!("Using device: CUDA 0 (libtorch)");
        LibTorchDevice::Cuda(0)
    } else {
        info!("Using device: CPU (libtorch)");
        LibTorchDevice::Cpu
    }
}

/// Check CUDA by allocating a tiny tensor; libtorch panics when no device exists
#[cfg(feature = "tch")]
fn cuda_available() -> bool {
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let allocated = std::panic::catch_unwind(|| {
        let _ = Tensor::<LibTorch<f32>, 1>::zeros([1], &LibTorchDevice::Cuda(0));
    });
    std::panic::set_hook(hook);
    allocated.is_ok()
}
