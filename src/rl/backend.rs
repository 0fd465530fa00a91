//! Backend type aliases and tensor conversion helpers
//!
//! - **TrainingBackend**: Autodiff-enabled NdArray backend for training (CPU)
//! - **InferenceBackend**: Plain NdArray backend for inference (CPU)
//!
//! The networks are small multilayer perceptrons and the environment is
//! bounded by HTTP round-trips, so the CPU backend is sufficient.

use anyhow::anyhow;
use burn::backend::{
    Autodiff,
    ndarray::{NdArray, NdArrayDevice},
};
use burn::tensor::{Int, Tensor, TensorData, backend::Backend};

/// Backend type for training (with autodiff)
pub type TrainingBackend = Autodiff<NdArray<f32>>;

/// Backend type for inference (without autodiff)
pub type InferenceBackend = NdArray<f32>;

/// Get the default device for computation
pub fn default_device() -> NdArrayDevice {
    NdArrayDevice::default()
}

/// Row-major `[rows, cols]` float tensor from a flat slice
pub fn matrix<B: Backend>(values: &[f32], rows: usize, cols: usize, device: &B::Device) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(values.to_vec(), [rows, cols]), device)
}

/// 1-D float tensor from a slice
pub fn vector<B: Backend>(values: &[f32], device: &B::Device) -> Tensor<B, 1> {
    Tensor::from_data(TensorData::new(values.to_vec(), [values.len()]), device)
}

/// 1-D integer tensor of indices
pub fn indices<B: Backend>(values: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let values: Vec<i64> = values.iter().map(|&v| v as i64).collect();
    let len = values.len();
    Tensor::from_data(TensorData::new(values, [len]), device)
}

/// Copy a tensor's elements out as `f32`, row-major
pub fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> anyhow::Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("failed to read tensor data: {:?}", e))
}
