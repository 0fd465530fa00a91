//! PPO (Proximal Policy Optimization) agent implementation
//!
//! The agent owns two independent approximators, a policy and a value
//! function, and implements the two update steps of PPO-clip on top of them:
//!
//! ```text
//! policy: L = −mean(min(r·A, clip_adv(A)))   r = exp(log π_new − log π_old)
//!         clip_adv(A) = (1+ε)·A if A > 0, else (1−ε)·A
//! value:  L = mean((R − V(s))²)
//! ```

use anyhow::{Context, Result, anyhow, bail};
use burn::{
    module::AutodiffModule,
    tensor::{ElementConversion, Int, Tensor, backend::AutodiffBackend},
};
use log::warn;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::approximator::Approximator;
use super::backend;
use super::buffer::RolloutBatch;
use super::config::PPOConfig;
use super::network::{Mlp, NetworkConfig};
use super::sampler::{log_probabilities, log_probability, sample_categorical};

/// One epoch's rollout uploaded to the training device
pub struct UpdateBatch<B: AutodiffBackend> {
    /// [batch, observation_dim]
    pub observations: Tensor<B, 2>,
    /// [batch]
    pub actions: Tensor<B, 1, Int>,
    /// Behaviour-policy log probabilities [batch]
    pub old_log_probs: Tensor<B, 1>,
    /// Normalized advantages [batch]
    pub advantages: Tensor<B, 1>,
    /// Value targets [batch]
    pub returns: Tensor<B, 1>,
}

impl<B: AutodiffBackend> UpdateBatch<B> {
    pub fn from_rollout(batch: &RolloutBatch, device: &B::Device) -> Self {
        let n = batch.len();
        Self {
            observations: backend::matrix(&batch.observations, n, batch.observation_dim, device),
            actions: backend::indices(&batch.actions, device),
            old_log_probs: backend::vector(&batch.log_probs, device),
            advantages: backend::vector(&batch.advantages, device),
            returns: backend::vector(&batch.returns, device),
        }
    }
}

/// Outcome of one epoch's update phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpdateSummary {
    /// Policy gradient steps actually taken
    pub policy_iterations: usize,
    /// Approximate KL after the last policy step
    pub kl: f32,
    /// Whether the policy loop stopped on the KL limit
    pub early_stopped: bool,
    /// Value loss of the last value step
    pub value_loss: f32,
}

/// An action drawn from the current policy
#[derive(Debug, Clone, PartialEq)]
pub struct SampledAction {
    pub logits: Vec<f32>,
    pub action: usize,
    pub log_prob: f32,
}

/// PPO agent for reinforcement learning
///
/// # Type Parameters
///
/// * `B` - Autodiff backend for gradient computation
///
/// # Example
///
/// ```rust
/// use survaillant_ppo::rl::{NetworkConfig, PPOAgent, PPOConfig, TrainingBackend, default_device};
///
/// let config = PPOConfig { seed: Some(1), hidden_sizes: vec![16], ..Default::default() };
/// let network_config = NetworkConfig::new(45, 4, config.hidden_sizes.clone());
/// let mut agent = PPOAgent::<TrainingBackend>::new(network_config, config, default_device()).unwrap();
///
/// let sampled = agent.select_action(&[0.0; 45]).unwrap();
/// assert!(sampled.action < 4);
/// ```
pub struct PPOAgent<B: AutodiffBackend> {
    policy: Approximator<B>,
    value: Approximator<B>,
    network_config: NetworkConfig,
    config: PPOConfig,
    rng: StdRng,
    device: B::Device,
}

impl<B: AutodiffBackend> PPOAgent<B> {
    /// Create an agent with freshly initialized networks
    pub fn new(network_config: NetworkConfig, config: PPOConfig, device: B::Device) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow!("invalid PPO configuration: {}", e))?;

        let policy = Approximator::new(
            network_config.init_policy(&device),
            config.policy_learning_rate,
        );
        let value = Approximator::new(network_config.init_value(&device), config.value_learning_rate);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            policy,
            value,
            network_config,
            config,
            rng,
            device,
        })
    }

    /// Sample an action for one observation
    ///
    /// Runs the policy without recording an autodiff graph and draws one
    /// categorical sample from `softmax(logits)`.
    pub fn select_action(&mut self, observation: &[f32]) -> Result<SampledAction> {
        let logits = self.policy_logits(observation)?;
        let action = sample_categorical(&logits, &mut self.rng);
        let log_prob = log_probability(&logits, action);
        Ok(SampledAction {
            logits,
            action,
            log_prob,
        })
    }

    /// Policy logits for one observation
    pub fn policy_logits(&self, observation: &[f32]) -> Result<Vec<f32>> {
        self.check_observation(observation)?;
        let network = self.policy.network().clone().valid();
        let input = backend::matrix(observation, 1, observation.len(), &self.device);
        backend::to_vec(network.forward(input)).context("reading policy logits")
    }

    /// Critic estimate V(s) for one observation
    pub fn value_estimate(&self, observation: &[f32]) -> Result<f32> {
        self.check_observation(observation)?;
        let network = self.value.network().clone().valid();
        let input = backend::matrix(observation, 1, observation.len(), &self.device);
        let value = network.forward(input).squeeze::<1>(1).into_scalar();
        Ok(value.elem::<f32>())
    }

    fn check_observation(&self, observation: &[f32]) -> Result<()> {
        let expected = self.network_config.observation_dim;
        if observation.len() != expected {
            bail!(
                "observation has {} values, network expects {}",
                observation.len(),
                expected
            );
        }
        Ok(())
    }

    /// One gradient step on the clipped surrogate objective
    ///
    /// Returns the approximate KL divergence `mean(old_logp − new_logp)`,
    /// recomputed with the updated parameters.
    pub fn train_policy(&mut self, batch: &UpdateBatch<B>) -> f32 {
        let eps = self.config.clip_ratio;

        let logits = self.policy.forward(batch.observations.clone());
        let new_log_probs = log_probabilities(logits, batch.actions.clone());
        let ratio = (new_log_probs - batch.old_log_probs.clone()).exp();

        let advantages = batch.advantages.clone();
        let positive = advantages.clone().greater_elem(0.0);
        let clipped = (advantages.clone() * (1.0 - eps))
            .mask_where(positive, advantages.clone() * (1.0 + eps));

        let loss = (ratio * advantages).min_pair(clipped).mean().neg();
        self.policy.step(loss);

        let network = self.policy.network().clone().valid();
        let logits = network.forward(batch.observations.clone().inner());
        let new_log_probs = log_probabilities(logits, batch.actions.clone().inner());
        (batch.old_log_probs.clone().inner() - new_log_probs)
            .mean()
            .into_scalar()
            .elem::<f32>()
    }

    /// One gradient step on the value regression loss; returns that loss
    pub fn train_value(&mut self, batch: &UpdateBatch<B>) -> f32 {
        let predictions = self
            .value
            .forward(batch.observations.clone())
            .squeeze::<1>(1);
        let loss = (batch.returns.clone() - predictions).powf_scalar(2.0).mean();
        let value = loss.clone().into_scalar().elem::<f32>();
        self.value.step(loss);
        value
    }

    /// Full update phase for one epoch
    ///
    /// Up to `train_policy_iterations` policy steps, stopping once the KL
    /// exceeds [`PPOConfig::kl_limit`], then exactly `train_value_iterations`
    /// value steps.
    pub fn update(&mut self, rollout: &RolloutBatch) -> UpdateSummary {
        let batch = UpdateBatch::from_rollout(rollout, &self.device);
        let limit = self.config.kl_limit();

        let mut summary = UpdateSummary {
            policy_iterations: 0,
            kl: 0.0,
            early_stopped: false,
            value_loss: 0.0,
        };

        for i in 0..self.config.train_policy_iterations {
            summary.kl = self.train_policy(&batch);
            summary.policy_iterations = i + 1;
            if summary.kl > limit {
                warn!(
                    "Early stopping policy update at iteration {} (kl {:.5} > {:.5})",
                    i + 1,
                    summary.kl,
                    limit
                );
                summary.early_stopped = true;
                break;
            }
        }

        for _ in 0..self.config.train_value_iterations {
            summary.value_loss = self.train_value(&batch);
        }

        summary
    }

    /// Replace both networks, e.g. with weights loaded from a checkpoint
    pub fn load_networks(&mut self, policy: Mlp<B>, value: Mlp<B>) {
        self.policy.replace_network(policy);
        self.value.replace_network(value);
    }

    pub fn policy(&self) -> &Mlp<B> {
        self.policy.network()
    }

    pub fn value(&self) -> &Mlp<B> {
        self.value.network()
    }

    pub fn config(&self) -> &PPOConfig {
        &self.config
    }

    pub fn network_config(&self) -> &NetworkConfig {
        &self.network_config
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    type TestBackend = Autodiff<NdArray<f32>>;

    const OBS_DIM: usize = 6;

    fn agent(config: PPOConfig) -> PPOAgent<TestBackend> {
        let network_config = NetworkConfig::new(OBS_DIM, 4, config.hidden_sizes.clone());
        PPOAgent::new(network_config, config, NdArrayDevice::default()).unwrap()
    }

    fn test_config() -> PPOConfig {
        PPOConfig {
            steps_per_epoch: 8,
            hidden_sizes: vec![16],
            seed: Some(42),
            ..Default::default()
        }
    }

    fn rollout(advantages: Vec<f32>, returns: Vec<f32>, agent: &PPOAgent<TestBackend>) -> RolloutBatch {
        let n = advantages.len();
        let observations: Vec<f32> = (0..n * OBS_DIM).map(|i| ((i % 5) as f32) * 0.2).collect();
        let actions: Vec<usize> = (0..n).map(|i| i % 4).collect();
        let log_probs = (0..n)
            .map(|i| {
                let obs = &observations[i * OBS_DIM..(i + 1) * OBS_DIM];
                log_probability(&agent.policy_logits(obs).unwrap(), actions[i])
            })
            .collect();

        RolloutBatch {
            observations,
            observation_dim: OBS_DIM,
            actions,
            advantages,
            returns,
            log_probs,
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PPOConfig {
            clip_ratio: 0.0,
            ..test_config()
        };
        let network_config = NetworkConfig::new(OBS_DIM, 4, vec![8]);
        assert!(PPOAgent::<TestBackend>::new(network_config, config, NdArrayDevice::default()).is_err());
    }

    #[test]
    fn test_select_action() {
        let mut agent = agent(test_config());
        let sampled = agent.select_action(&[0.1; OBS_DIM]).unwrap();

        assert_eq!(sampled.logits.len(), 4);
        assert!(sampled.action < 4);
        assert!(sampled.log_prob <= 0.0);
        assert!((sampled.log_prob - log_probability(&sampled.logits, sampled.action)).abs() < 1e-6);
    }

    #[test]
    fn test_seeded_agents_sample_identically() {
        let mut a = agent(test_config());
        let mut b = agent(test_config());
        b.load_networks(a.policy().clone(), a.value().clone());

        for _ in 0..20 {
            let obs = [0.3; OBS_DIM];
            assert_eq!(
                a.select_action(&obs).unwrap().action,
                b.select_action(&obs).unwrap().action
            );
        }
    }

    #[test]
    fn test_value_estimate_finite() {
        let agent = agent(test_config());
        assert!(agent.value_estimate(&[1.0; OBS_DIM]).unwrap().is_finite());
    }

    #[test]
    fn test_wrong_observation_length_is_error() {
        let mut agent = agent(test_config());
        let short = [1.0; OBS_DIM - 1];
        let long = [1.0; OBS_DIM + 2];

        assert!(agent.policy_logits(&short).is_err());
        assert!(agent.value_estimate(&long).is_err());
        assert!(agent.select_action(&short).is_err());
    }

    #[test]
    fn test_zero_advantages_leave_policy_unchanged() {
        let mut agent = agent(test_config());
        let batch = rollout(vec![0.0; 8], vec![1.0; 8], &agent);
        let sample_obs = [0.4; OBS_DIM];
        let before = agent.policy_logits(&sample_obs).unwrap();

        let update_batch = UpdateBatch::from_rollout(&batch, agent.device());
        for _ in 0..5 {
            let kl = agent.train_policy(&update_batch);
            assert!(kl.abs() < 1e-6);
        }

        let after = agent.policy_logits(&sample_obs).unwrap();
        for (b, a) in before.iter().zip(&after) {
            assert!((b - a).abs() < 1e-6, "logits changed: {:?} -> {:?}", before, after);
        }
    }

    #[test]
    fn test_policy_step_changes_policy_and_reports_kl() {
        let mut agent = agent(test_config());
        let advantages = vec![1.5, -0.5, 1.0, -1.0, 0.5, -1.5, 0.2, -0.2];
        let batch = rollout(advantages, vec![0.0; 8], &agent);
        let sample_obs = &batch.observations[..OBS_DIM];
        let before = agent.policy_logits(sample_obs).unwrap();

        let update_batch = UpdateBatch::from_rollout(&batch, agent.device());
        let kl = agent.train_policy(&update_batch);
        let after = agent.policy_logits(sample_obs).unwrap();

        assert!(kl.is_finite());
        assert!(before.iter().zip(&after).any(|(b, a)| (b - a).abs() > 1e-7));
    }

    #[test]
    fn test_value_loss_decreases() {
        let mut agent = agent(test_config());
        let batch = rollout(vec![0.0; 8], vec![3.0, -1.0, 2.0, 0.5, 3.0, -1.0, 2.0, 0.5], &agent);
        let update_batch = UpdateBatch::from_rollout(&batch, agent.device());

        let first = agent.train_value(&update_batch);
        let mut last = first;
        for _ in 0..60 {
            last = agent.train_value(&update_batch);
        }

        assert!(last < first, "value loss should decrease: {} -> {}", first, last);
    }

    #[test]
    fn test_update_respects_iteration_bounds() {
        let config = PPOConfig {
            train_policy_iterations: 3,
            train_value_iterations: 2,
            target_kl: 100.0,
            ..test_config()
        };
        let mut agent = agent(config);
        let batch = rollout(vec![1.0, -1.0, 0.5, -0.5, 1.0, -1.0, 0.5, -0.5], vec![1.0; 8], &agent);

        let summary = agent.update(&batch);

        assert_eq!(summary.policy_iterations, 3);
        assert!(!summary.early_stopped);
        assert!(summary.value_loss.is_finite());
    }

    #[test]
    fn test_update_stops_early_on_kl() {
        let config = PPOConfig {
            train_policy_iterations: 80,
            policy_learning_rate: 0.05,
            target_kl: 1e-6,
            ..test_config()
        };
        let mut agent = agent(config);

        // Every taken action is action 0 with a negative advantage, so each
        // step lowers its log-probability and the KL estimate is positive
        let mut batch = rollout(vec![-1.0; 8], vec![0.0; 8], &agent);
        batch.actions = vec![0; 8];
        batch.log_probs = (0..8)
            .map(|i| {
                let obs = &batch.observations[i * OBS_DIM..(i + 1) * OBS_DIM];
                log_probability(&agent.policy_logits(obs).unwrap(), 0)
            })
            .collect();

        let summary = agent.update(&batch);

        assert!(summary.early_stopped);
        assert!(summary.policy_iterations < 80);
        assert!(summary.kl > agent.config().kl_limit());
    }
}
