//! PPO training core
//!
//! Provides:
//! - The [`Environment`] interface and its game-server implementation
//! - Flashlight observation flattening
//! - Rollout buffer with GAE-lambda advantages
//! - Policy and value networks, each with its own Adam optimizer
//! - Categorical action sampling and greedy action choice
//! - PPO-clip policy update and value regression
//! - Checkpoint persistence

pub mod approximator;
pub mod backend;
pub mod buffer;
pub mod config;
pub mod discount;
pub mod environment;
pub mod network;
pub mod observation;
pub mod persistence;
pub mod ppo;
pub mod sampler;

pub use approximator::Approximator;
pub use backend::{InferenceBackend, TrainingBackend, default_device};
pub use buffer::{RolloutBatch, RolloutBuffer};
pub use config::PPOConfig;
pub use discount::discounted_cumsum;
pub use environment::{Environment, GameEnvironment, Step};
pub use network::{Mlp, NetworkConfig};
pub use observation::{flatten_observation, observation_dim};
pub use persistence::{
    Checkpoint, ModelMetadata, checkpoint_exists, load_checkpoint, load_metadata, save_checkpoint,
};
pub use ppo::{PPOAgent, SampledAction, UpdateBatch, UpdateSummary};
