//! A network bundled with its own optimizer state

use burn::{
    optim::{Adam, AdamConfig, GradientsParams, Optimizer, adaptor::OptimizerAdaptor},
    tensor::{Tensor, backend::AutodiffBackend},
};

use super::network::Mlp;

/// Function approximator: an [`Mlp`] plus the Adam state that trains it
///
/// The policy and the value function each own one, so their moment
/// estimates and learning rates never mix.
pub struct Approximator<B: AutodiffBackend> {
    network: Mlp<B>,
    optim: OptimizerAdaptor<Adam, Mlp<B>, B>,
    learning_rate: f64,
}

impl<B: AutodiffBackend> Approximator<B> {
    pub fn new(network: Mlp<B>, learning_rate: f64) -> Self {
        Self {
            network,
            optim: AdamConfig::new().init(),
            learning_rate,
        }
    }

    pub fn network(&self) -> &Mlp<B> {
        &self.network
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.network.forward(input)
    }

    /// Backpropagate `loss` and apply one Adam step to the network
    pub fn step(&mut self, loss: Tensor<B, 1>) {
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.network);
        self.network = self
            .optim
            .step(self.learning_rate, self.network.clone(), grads);
    }

    /// Swap in loaded weights and start a fresh optimizer
    pub fn replace_network(&mut self, network: Mlp<B>) {
        self.network = network;
        self.optim = AdamConfig::new().init();
    }
}
