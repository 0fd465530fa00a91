//! Feed-forward networks for the policy and the value function
//!
//! Both approximators share one architecture, a multilayer perceptron with tanh
//! hidden activations and a linear output layer. They never share weights.
//!
//! ```text
//! Input: [batch, observation_dim]
//!   ↓ Linear(observation_dim → h1) + tanh
//!   ↓ ...
//!   ↓ Linear(h_{n-1} → h_n) + tanh
//!   ↓ Linear(h_n → output_dim)
//! Policy: output_dim = num_actions (logits)
//! Value:  output_dim = 1
//! ```
//!
//! # Example
//!
//! ```rust
//! use survaillant_ppo::rl::NetworkConfig;
//! use burn::backend::ndarray::NdArrayDevice;
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//!
//! type Backend = NdArray<f32>;
//!
//! let device = NdArrayDevice::default();
//! let config = NetworkConfig::new(245, 4, vec![128, 128]);
//! let policy = config.init_policy::<Backend>(&device);
//!
//! let observation = Tensor::zeros([8, 245], &device);
//! assert_eq!(policy.forward(observation).dims(), [8, 4]);
//! ```

use burn::{
    module::Module,
    nn::{Linear, LinearConfig},
    tensor::{Tensor, activation::tanh, backend::Backend},
};
use serde::{Deserialize, Serialize};

/// Shape of the policy and value networks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Length of a flattened observation
    pub observation_dim: usize,

    /// Number of discrete actions (policy output size)
    pub num_actions: usize,

    /// Width of each hidden layer, input side first
    pub hidden_sizes: Vec<usize>,
}

impl NetworkConfig {
    pub fn new(observation_dim: usize, num_actions: usize, hidden_sizes: Vec<usize>) -> Self {
        Self {
            observation_dim,
            num_actions,
            hidden_sizes,
        }
    }

    /// Policy network: observation → `num_actions` logits
    pub fn init_policy<B: Backend>(&self, device: &B::Device) -> Mlp<B> {
        self.init_mlp(self.num_actions, device)
    }

    /// Value network: observation → scalar estimate
    pub fn init_value<B: Backend>(&self, device: &B::Device) -> Mlp<B> {
        self.init_mlp(1, device)
    }

    fn init_mlp<B: Backend>(&self, output_dim: usize, device: &B::Device) -> Mlp<B> {
        let mut hidden = Vec::with_capacity(self.hidden_sizes.len());
        let mut input_dim = self.observation_dim;
        for &size in &self.hidden_sizes {
            hidden.push(LinearConfig::new(input_dim, size).init(device));
            input_dim = size;
        }

        Mlp {
            hidden,
            output: LinearConfig::new(input_dim, output_dim).init(device),
        }
    }
}

/// Multilayer perceptron with tanh hidden activations
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    hidden: Vec<Linear<B>>,
    output: Linear<B>,
}

impl<B: Backend> Mlp<B> {
    /// Forward pass over a batch `[batch, observation_dim]` → `[batch, output_dim]`
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = input;
        for layer in &self.hidden {
            x = tanh(layer.forward(x));
        }
        self.output.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::tensor::{Distribution, TensorData};

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    const OBS_DIM: usize = 45;

    fn config() -> NetworkConfig {
        NetworkConfig::new(OBS_DIM, 4, vec![32, 16])
    }

    #[test]
    fn test_forward_pass_shapes() {
        let device = NdArrayDevice::default();
        let policy = config().init_policy::<TestBackend>(&device);
        let value = config().init_value::<TestBackend>(&device);

        for batch_size in [1, 4, 32] {
            let observation = Tensor::zeros([batch_size, OBS_DIM], &device);
            assert_eq!(policy.forward(observation.clone()).dims(), [batch_size, 4]);
            assert_eq!(value.forward(observation).dims(), [batch_size, 1]);
        }
    }

    #[test]
    fn test_no_hidden_layers() {
        let device = NdArrayDevice::default();
        let network = NetworkConfig::new(OBS_DIM, 4, vec![]).init_policy::<TestBackend>(&device);
        let output = network.forward(Tensor::zeros([2, OBS_DIM], &device));
        assert_eq!(output.dims(), [2, 4]);
    }

    #[test]
    fn test_gradient_flow() {
        let device = NdArrayDevice::default();
        let network = config().init_policy::<TestAutodiffBackend>(&device);

        let observation = Tensor::ones([1, OBS_DIM], &device).require_grad();
        let loss = network.forward(observation.clone()).sum();
        let gradients = loss.backward();

        let obs_grad = observation.grad(&gradients);
        assert!(
            obs_grad.is_some(),
            "Gradients should flow back to input observation"
        );

        let grad_data: TensorData = obs_grad.unwrap().into_data();
        let grad_abs: f32 = grad_data
            .as_slice::<f32>()
            .unwrap()
            .iter()
            .map(|g| g.abs())
            .sum();
        assert!(grad_abs > 1e-6, "Gradients should be non-zero");
    }

    #[test]
    fn test_batch_consistency() {
        let device = NdArrayDevice::default();
        let network = config().init_policy::<TestBackend>(&device);

        let single = Tensor::<TestBackend, 2>::random(
            [1, OBS_DIM],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let batch = Tensor::cat(vec![single.clone(), single.clone(), single.clone()], 0);

        let single_out: Vec<f32> = network.forward(single).into_data().to_vec().unwrap();
        let batch_out: Vec<f32> = network.forward(batch).into_data().to_vec().unwrap();

        for row in 0..3 {
            for j in 0..4 {
                let diff = (single_out[j] - batch_out[row * 4 + j]).abs();
                assert!(diff < 1e-5, "row {} action {} differs by {}", row, j, diff);
            }
        }
    }

    #[test]
    fn test_policy_and_value_are_independent() {
        let device = NdArrayDevice::default();
        let policy = config().init_policy::<TestBackend>(&device);
        let value = config().init_value::<TestBackend>(&device);

        assert_ne!(policy.num_params(), value.num_params());
    }

    #[test]
    fn test_output_finite() {
        let device = NdArrayDevice::default();
        let network = config().init_value::<TestBackend>(&device);
        let observation = Tensor::random([8, OBS_DIM], Distribution::Uniform(-5.0, 5.0), &device);

        let values: Vec<f32> = network.forward(observation).into_data().to_vec().unwrap();
        assert!(values.iter().all(|v| v.is_finite()));
    }
}
