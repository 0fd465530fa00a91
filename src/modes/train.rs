//! Training mode for the PPO agent
//!
//! Each epoch runs four phases in order:
//!
//! ```text
//! COLLECTING → UPDATING_POLICY → UPDATING_VALUE → CHECKPOINT
//! ```
//!
//! Collection fills the rollout buffer with exactly `steps_per_epoch`
//! transitions, resetting the environment whenever an episode ends. The buffer
//! is then drained into one batch, the agent runs its policy and value update
//! loops on it, and both networks are saved.
//!
//! # Example
//!
//! ```rust,ignore
//! use survaillant_ppo::game::HttpGameServer;
//! use survaillant_ppo::modes::{TrainConfig, TrainMode};
//! use survaillant_ppo::rl::{GameEnvironment, TrainingBackend, default_device};
//!
//! let config = TrainConfig::default();
//! let server = HttpGameServer::new(&config.game)?;
//! let env = GameEnvironment::new(server, config.game.clone(), config.ppo.seed);
//!
//! let mut train_mode = TrainMode::<TrainingBackend, _>::new(config, env, default_device())?;
//! train_mode.run()?;
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use burn::tensor::backend::AutodiffBackend;
use log::info;
use serde::{Deserialize, Serialize};

use crate::game::GameConfig;
use crate::metrics::{EpisodeSummary, PerformanceMetrics, TimingKey, TrainingStats};
use crate::rl::{
    Environment, NetworkConfig, PPOAgent, PPOConfig, RolloutBuffer, UpdateSummary,
    load_checkpoint, save_checkpoint,
};

/// Configuration for training mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// PPO hyperparameters
    pub ppo: PPOConfig,

    /// Game server and reward shaping
    pub game: GameConfig,

    /// Directory holding the policy/value checkpoint
    pub checkpoint_dir: PathBuf,

    /// Directory receiving one JSON report per epoch, if set
    pub stats_dir: Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            ppo: PPOConfig::default(),
            game: GameConfig::default(),
            checkpoint_dir: PathBuf::from("modelsweight_ppo"),
            stats_dir: None,
        }
    }
}

impl TrainConfig {
    /// Read a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        serde_json::from_str(&json).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.ppo.validate()?;
        self.game.validate()
    }
}

/// What happened during one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    /// 1-based epoch number, continuing across resumed runs
    pub epoch: usize,
    pub episodes: EpisodeSummary,
    pub update: UpdateSummary,
    pub rollout_steps_per_second: f64,
    pub updates_per_second: f64,
}

/// Training mode for the PPO agent
///
/// Owns every piece of mutable training state: the agent with both
/// approximators, the environment, the rollout buffer and the statistics.
pub struct TrainMode<B: AutodiffBackend, E: Environment> {
    agent: PPOAgent<B>,
    env: E,
    buffer: RolloutBuffer,
    stats: TrainingStats,
    perf: PerformanceMetrics,
    config: TrainConfig,

    /// Epochs completed, including those of a loaded checkpoint
    epochs_completed: usize,
}

impl<B: AutodiffBackend, E: Environment> TrainMode<B, E> {
    /// Create a training run
    ///
    /// Networks are loaded from `checkpoint_dir` when a checkpoint exists there
    /// and freshly initialized otherwise.
    pub fn new(config: TrainConfig, env: E, device: B::Device) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow!("invalid training configuration: {}", e))?;

        let network_config = NetworkConfig::new(
            env.observation_dim(),
            env.num_actions(),
            config.ppo.hidden_sizes.clone(),
        );
        let mut agent = PPOAgent::new(network_config, config.ppo.clone(), device.clone())?;

        let mut epochs_completed = 0;
        let checkpoint =
            load_checkpoint::<B>(&config.checkpoint_dir, agent.network_config(), &device)
                .with_context(|| {
                    format!("Failed to load checkpoint from {:?}", config.checkpoint_dir)
                })?;
        match checkpoint {
            Some(checkpoint) => {
                epochs_completed = checkpoint.metadata.epochs_trained;
                agent.load_networks(checkpoint.policy, checkpoint.value);
                info!(
                    "Loaded checkpoint from {:?} ({} epochs trained)",
                    config.checkpoint_dir, epochs_completed
                );
            }
            None => info!("No weights found, starting from fresh networks"),
        }

        let buffer = RolloutBuffer::new(
            env.observation_dim(),
            config.ppo.steps_per_epoch,
            config.ppo.gamma,
            config.ppo.lam,
        );

        Ok(Self {
            agent,
            env,
            buffer,
            stats: TrainingStats::new(100),
            perf: PerformanceMetrics::new(),
            config,
            epochs_completed,
        })
    }

    /// Run `epochs` epochs and return their reports
    pub fn run(&mut self) -> Result<Vec<EpochReport>> {
        self.log_header();

        let mut reports = Vec::with_capacity(self.config.ppo.epochs);
        for _ in 0..self.config.ppo.epochs {
            reports.push(self.run_epoch()?);
        }

        info!("Training complete. {}", self.stats.format_summary());
        info!("{}", self.perf.format_summary());

        Ok(reports)
    }

    /// Collect, update, checkpoint and report one epoch
    pub fn run_epoch(&mut self) -> Result<EpochReport> {
        let steps = self.config.ppo.steps_per_epoch;

        let timer = self.perf.start(TimingKey::Rollout);
        let episodes = self.collect_rollout()?;
        self.perf.finish(timer, steps as u64);

        let rollout = self.buffer.get().context("Failed to read rollout buffer")?;

        let timer = self.perf.start(TimingKey::Update);
        let update = self.agent.update(&rollout);
        let gradient_steps = update.policy_iterations + self.config.ppo.train_value_iterations;
        self.perf.finish(timer, gradient_steps as u64);
        self.stats.record_update(&update);

        self.epochs_completed += 1;

        let timer = self.perf.start(TimingKey::Checkpoint);
        self.save_checkpoint()?;
        self.perf.finish(timer, 1);

        let report = EpochReport {
            epoch: self.epochs_completed,
            episodes,
            update,
            rollout_steps_per_second: self.perf.last_rate(TimingKey::Rollout),
            updates_per_second: self.perf.last_rate(TimingKey::Update),
        };

        self.log_epoch(&report);
        if let Some(dir) = &self.config.stats_dir {
            write_report(dir, &report)?;
        }

        Ok(report)
    }

    /// Fill the buffer with one epoch of transitions
    ///
    /// A trajectory ends either on a terminal step (bootstrap value 0) or at
    /// the last step of the epoch (bootstrap from the critic on the next
    /// observation). Transitions left by an aborted epoch are discarded first.
    fn collect_rollout(&mut self) -> Result<EpisodeSummary> {
        let steps = self.config.ppo.steps_per_epoch;
        self.buffer.clear();
        let mut returns = Vec::new();
        let mut lengths = Vec::new();

        let mut observation = self.start_episode()?;
        let mut episode_return = 0.0;
        let mut episode_length = 0;

        for t in 0..steps {
            let sampled = self.agent.select_action(&observation)?;
            let value = self.agent.value_estimate(&observation)?;

            let step = self
                .env
                .step(sampled.action)
                .context("Failed to step environment")?;
            self.buffer
                .store(&observation, sampled.action, step.reward, value, sampled.log_prob)?;

            episode_return += step.reward;
            episode_length += 1;

            let epoch_ended = t + 1 == steps;
            if step.done || epoch_ended {
                let last_value = match (&step.observation, step.done) {
                    (Some(next), false) => self.agent.value_estimate(next)?,
                    _ => 0.0,
                };
                self.buffer.finish_trajectory(last_value);

                returns.push(episode_return);
                lengths.push(episode_length);
                self.stats.record_episode(episode_return, episode_length);

                if !epoch_ended {
                    observation = self.start_episode()?;
                    episode_return = 0.0;
                    episode_length = 0;
                }
            } else {
                observation = step
                    .observation
                    .ok_or_else(|| anyhow!("environment returned no observation for a non-terminal step"))?;
            }
        }

        Ok(EpisodeSummary::new(&returns, &lengths))
    }

    fn start_episode(&mut self) -> Result<Vec<f32>> {
        self.env.reset().context("Failed to reset environment")?;
        self.env.observe().context("Failed to read observation")
    }

    fn save_checkpoint(&self) -> Result<()> {
        save_checkpoint(&self.agent, &self.config.checkpoint_dir, self.epochs_completed)
            .with_context(|| {
                format!(
                    "Failed to save checkpoint to {:?}",
                    self.config.checkpoint_dir
                )
            })
    }

    fn log_header(&self) {
        let ppo = &self.config.ppo;
        info!("{}", "=".repeat(70));
        info!("PPO Training - Survaillant");
        info!("{}", "=".repeat(70));
        info!("Server: {}", self.config.game.server_url);
        info!(
            "Maps: {:?} | Flashlight radius: {} | Max turns: {}",
            self.config.game.map_ids, self.config.game.flashlight_radius, self.config.game.max_turns
        );
        info!(
            "Epochs: {} x {} steps (starting after epoch {})",
            ppo.epochs, ppo.steps_per_epoch, self.epochs_completed
        );
        info!(
            "Gamma: {} | Lambda: {} | Clip ratio: {} | Target KL: {}",
            ppo.gamma, ppo.lam, ppo.clip_ratio, ppo.target_kl
        );
        info!(
            "Policy lr: {} x {} iters | Value lr: {} x {} iters | Hidden: {:?}",
            ppo.policy_learning_rate,
            ppo.train_policy_iterations,
            ppo.value_learning_rate,
            ppo.train_value_iterations,
            ppo.hidden_sizes
        );
        info!("Checkpoints: {:?}", self.config.checkpoint_dir);
        info!("{}", "=".repeat(70));
    }

    fn log_epoch(&self, report: &EpochReport) {
        info!(
            "Epoch: {}. Mean Return: {:.3}. Mean Length: {:.1}",
            report.epoch, report.episodes.returns.mean, report.episodes.lengths.mean
        );
        info!("  {}", report.episodes.format());
        info!(
            "  policy iters {} | kl {:.5} | value loss {:.4} | {:.1} steps/s | {:.1} updates/s",
            report.update.policy_iterations,
            report.update.kl,
            report.update.value_loss,
            report.rollout_steps_per_second,
            report.updates_per_second
        );
    }

    pub fn agent(&self) -> &PPOAgent<B> {
        &self.agent
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn buffer(&self) -> &RolloutBuffer {
        &self.buffer
    }

    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    pub fn epochs_completed(&self) -> usize {
        self.epochs_completed
    }
}

/// Write `report` as `<dir>/epoch_<n>.json`
fn write_report(dir: &Path, report: &EpochReport) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create stats directory {:?}", dir))?;
    let path = dir.join(format!("epoch_{}.json", report.epoch));
    let json = serde_json::to_string_pretty(report).context("Failed to serialize epoch report")?;
    fs::write(&path, json).with_context(|| format!("Failed to write epoch report {:?}", path))
}
