//! PPO algorithm hyperparameter configuration

use serde::{Deserialize, Serialize};

/// Configuration for the PPO (Proximal Policy Optimization) algorithm
///
/// # Example
///
/// ```rust
/// use survaillant_ppo::rl::PPOConfig;
///
/// // Use default hyperparameters
/// let config = PPOConfig::default();
///
/// // Or customize specific parameters
/// let config = PPOConfig {
///     steps_per_epoch: 1000,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PPOConfig {
    /// Environment steps collected per epoch; also the buffer capacity
    ///
    /// Default: 4000
    pub steps_per_epoch: usize,

    /// Number of collect-then-update cycles
    ///
    /// Default: 10000
    pub epochs: usize,

    /// Discount factor for future rewards
    ///
    /// Default: 0.99
    pub gamma: f32,

    /// PPO clipping parameter (epsilon)
    ///
    /// Default: 0.2
    pub clip_ratio: f32,

    /// Adam learning rate of the policy network
    ///
    /// Default: 3e-4
    pub policy_learning_rate: f64,

    /// Adam learning rate of the value network
    ///
    /// Default: 1e-3
    pub value_learning_rate: f64,

    /// Upper bound on policy gradient steps per epoch
    ///
    /// Default: 80
    pub train_policy_iterations: usize,

    /// Value gradient steps per epoch
    ///
    /// Default: 80
    pub train_value_iterations: usize,

    /// GAE lambda
    ///
    /// Default: 0.97
    pub lam: f32,

    /// Target KL divergence between old and new policy
    ///
    /// Policy updates stop once the approximate KL exceeds `1.5 * target_kl`.
    ///
    /// Default: 0.01
    pub target_kl: f32,

    /// Hidden layer widths shared by both networks
    ///
    /// Default: [128, 128]
    pub hidden_sizes: Vec<usize>,

    /// RNG seed for action sampling and map selection
    ///
    /// Default: None (seeded from entropy)
    pub seed: Option<u64>,
}

impl PPOConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// KL threshold above which the policy loop stops early
    pub fn kl_limit(&self) -> f32 {
        1.5 * self.target_kl
    }

    /// Validate configuration parameters
    ///
    /// # Returns
    ///
    /// `Ok(())` if all parameters are valid, `Err(String)` with an error message otherwise.
    ///
    /// # Example
    ///
    /// ```rust
    /// use survaillant_ppo::rl::PPOConfig;
    ///
    /// let mut config = PPOConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.policy_learning_rate = -0.1;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), String> {
        if self.steps_per_epoch == 0 {
            return Err("steps_per_epoch must be at least 1".to_string());
        }

        if self.policy_learning_rate <= 0.0 {
            return Err(format!(
                "policy_learning_rate must be positive, got {}",
                self.policy_learning_rate
            ));
        }

        if self.value_learning_rate <= 0.0 {
            return Err(format!(
                "value_learning_rate must be positive, got {}",
                self.value_learning_rate
            ));
        }

        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(format!("gamma must be in [0, 1], got {}", self.gamma));
        }

        if !(0.0..=1.0).contains(&self.lam) {
            return Err(format!("lam must be in [0, 1], got {}", self.lam));
        }

        if self.clip_ratio <= 0.0 || self.clip_ratio > 1.0 {
            return Err(format!(
                "clip_ratio must be in (0, 1], got {}",
                self.clip_ratio
            ));
        }

        if self.target_kl <= 0.0 {
            return Err(format!(
                "target_kl must be positive, got {}",
                self.target_kl
            ));
        }

        if self.hidden_sizes.contains(&0) {
            return Err("hidden_sizes must not contain empty layers".to_string());
        }

        Ok(())
    }
}

impl Default for PPOConfig {
    fn default() -> Self {
        Self {
            steps_per_epoch: 4000,
            epochs: 10000,
            gamma: 0.99,
            clip_ratio: 0.2,
            policy_learning_rate: 3e-4,
            value_learning_rate: 1e-3,
            train_policy_iterations: 80,
            train_value_iterations: 80,
            lam: 0.97,
            target_kl: 0.01,
            hidden_sizes: vec![128, 128],
            seed: None,
        }
    }
}
