use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use survaillant_ppo::game::{GameConfig, HttpGameServer};
use survaillant_ppo::modes::{EvaluateConfig, EvaluateMode, TrainConfig, TrainMode};
use survaillant_ppo::rl::{GameEnvironment, InferenceBackend, TrainingBackend, default_device};

#[derive(Parser)]
#[command(name = "survaillant_ppo")]
#[command(version, about = "PPO agent for the Survaillant game server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train the policy and value networks
    Train(TrainArgs),
    /// Play greedy games with a trained policy and report scores per map
    Evaluate(EvaluateArgs),
}

/// Game server settings shared by both modes
#[derive(Args)]
struct ServerArgs {
    /// Base URL of the game server
    #[arg(long)]
    server_url: Option<String>,

    /// Maps to play, comma separated
    #[arg(long, value_delimiter = ',')]
    maps: Option<Vec<u32>>,

    /// Flashlight radius of the observation
    #[arg(long)]
    radius: Option<usize>,
}

impl ServerArgs {
    fn apply(self, game: &mut GameConfig) {
        if let Some(url) = self.server_url {
            game.server_url = GameConfig::new(url).server_url;
        }
        if let Some(maps) = self.maps {
            game.map_ids = maps;
        }
        if let Some(radius) = self.radius {
            game.flashlight_radius = radius;
        }
    }
}

#[derive(Args)]
struct TrainArgs {
    /// JSON training configuration; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    server: ServerArgs,

    /// Turns after which an episode is ended
    #[arg(long)]
    max_turns: Option<u32>,

    /// Number of epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Environment steps per epoch
    #[arg(long)]
    steps_per_epoch: Option<usize>,

    /// Discount factor
    #[arg(long)]
    gamma: Option<f32>,

    /// GAE lambda
    #[arg(long)]
    lam: Option<f32>,

    /// PPO clip ratio
    #[arg(long)]
    clip_ratio: Option<f32>,

    /// Policy learning rate
    #[arg(long)]
    policy_lr: Option<f64>,

    /// Value function learning rate
    #[arg(long)]
    value_lr: Option<f64>,

    /// Maximum policy gradient steps per epoch
    #[arg(long)]
    train_policy_iterations: Option<usize>,

    /// Value gradient steps per epoch
    #[arg(long)]
    train_value_iterations: Option<usize>,

    /// Target KL divergence for early stopping
    #[arg(long)]
    target_kl: Option<f32>,

    /// Hidden layer sizes, comma separated
    #[arg(long, value_delimiter = ',')]
    hidden_sizes: Option<Vec<usize>>,

    /// RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Checkpoint directory
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Directory for per-epoch JSON reports
    #[arg(long)]
    stats_dir: Option<PathBuf>,
}

impl TrainArgs {
    fn into_config(self) -> Result<TrainConfig> {
        let mut config = match &self.config {
            Some(path) => TrainConfig::from_json_file(path)?,
            None => TrainConfig::default(),
        };

        self.server.apply(&mut config.game);
        if let Some(max_turns) = self.max_turns {
            config.game.max_turns = max_turns;
        }

        let ppo = &mut config.ppo;
        if let Some(epochs) = self.epochs {
            ppo.epochs = epochs;
        }
        if let Some(steps) = self.steps_per_epoch {
            ppo.steps_per_epoch = steps;
        }
        if let Some(gamma) = self.gamma {
            ppo.gamma = gamma;
        }
        if let Some(lam) = self.lam {
            ppo.lam = lam;
        }
        if let Some(clip_ratio) = self.clip_ratio {
            ppo.clip_ratio = clip_ratio;
        }
        if let Some(lr) = self.policy_lr {
            ppo.policy_learning_rate = lr;
        }
        if let Some(lr) = self.value_lr {
            ppo.value_learning_rate = lr;
        }
        if let Some(iters) = self.train_policy_iterations {
            ppo.train_policy_iterations = iters;
        }
        if let Some(iters) = self.train_value_iterations {
            ppo.train_value_iterations = iters;
        }
        if let Some(target_kl) = self.target_kl {
            ppo.target_kl = target_kl;
        }
        if let Some(hidden_sizes) = self.hidden_sizes {
            ppo.hidden_sizes = hidden_sizes;
        }
        if self.seed.is_some() {
            ppo.seed = self.seed;
        }

        if let Some(dir) = self.checkpoint_dir {
            config.checkpoint_dir = dir;
        }
        if self.stats_dir.is_some() {
            config.stats_dir = self.stats_dir;
        }

        Ok(config)
    }
}

#[derive(Args)]
struct EvaluateArgs {
    /// JSON evaluation configuration; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    server: ServerArgs,

    /// Checkpoint directory to evaluate
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Games played on each map
    #[arg(long)]
    games: Option<usize>,

    /// Moves after which a game is stopped
    #[arg(long)]
    max_turns: Option<u32>,

    /// Write one CSV row per game to this file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the full report as JSON to this file
    #[arg(long)]
    json: Option<PathBuf>,
}

impl EvaluateArgs {
    fn into_config(self) -> Result<EvaluateConfig> {
        let mut config = match &self.config {
            Some(path) => EvaluateConfig::from_json_file(path)?,
            None => EvaluateConfig::default(),
        };

        self.server.apply(&mut config.game);
        if let Some(dir) = self.checkpoint_dir {
            config.checkpoint_dir = dir;
        }
        if let Some(games) = self.games {
            config.games_per_map = games;
        }
        if let Some(max_turns) = self.max_turns {
            config.max_turns = max_turns;
        }
        if self.csv.is_some() {
            config.csv_path = self.csv;
        }
        if self.json.is_some() {
            config.json_path = self.json;
        }

        Ok(config)
    }
}

fn train(args: TrainArgs) -> Result<()> {
    let config = args.into_config()?;

    let server = HttpGameServer::new(&config.game).context("Failed to build HTTP client")?;
    // Separate RNG stream for map selection
    let env_seed = config.ppo.seed.map(|seed| seed.wrapping_add(1));
    let env = GameEnvironment::new(server, config.game.clone(), env_seed);

    info!("Connecting to game server at {}", config.game.server_url);
    let mut train_mode = TrainMode::<TrainingBackend, _>::new(config, env, default_device())?;
    train_mode.run()?;

    Ok(())
}

fn evaluate(args: EvaluateArgs) -> Result<()> {
    let config = args.into_config()?;

    let server = HttpGameServer::new(&config.game).context("Failed to build HTTP client")?;
    info!("Connecting to game server at {}", config.game.server_url);
    let mut evaluate_mode = EvaluateMode::<InferenceBackend, _>::new(config, server, default_device())?;
    evaluate_mode.run()?;

    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Train(args) => train(args),
        Command::Evaluate(args) => evaluate(args),
    }
}
