//! Evaluation mode for trained policies
//!
//! Loads the policy network of a checkpoint on an inference backend and plays
//! `games_per_map` games on every configured map, always taking the action with
//! the largest logit. A game ends on `GAME_OVER`, on a rejected move (the
//! greedy policy would repeat it forever) or after `max_turns` moves.
//!
//! # Example
//!
//! ```rust,ignore
//! use survaillant_ppo::game::HttpGameServer;
//! use survaillant_ppo::modes::{EvaluateConfig, EvaluateMode};
//! use survaillant_ppo::rl::{InferenceBackend, default_device};
//!
//! let config = EvaluateConfig::default();
//! let server = HttpGameServer::new(&config.game)?;
//!
//! let mut evaluate_mode = EvaluateMode::<InferenceBackend, _>::new(config, server, default_device())?;
//! let report = evaluate_mode.run()?;
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use burn::tensor::backend::Backend;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::game::{Direction, GameConfig, GameServer, MoveOutcome, NUM_ACTIONS};
use crate::metrics::Summary;
use crate::rl::backend;
use crate::rl::sampler::greedy_action;
use crate::rl::{Mlp, ModelMetadata, NetworkConfig, load_checkpoint, load_metadata};

/// Configuration for evaluation mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluateConfig {
    /// Game server and maps to evaluate on
    pub game: GameConfig,

    /// Directory holding the checkpoint to evaluate
    pub checkpoint_dir: PathBuf,

    /// Games played on each map
    pub games_per_map: usize,

    /// Moves after which a game is stopped
    pub max_turns: u32,

    /// Per-game CSV export, if set
    pub csv_path: Option<PathBuf>,

    /// Full JSON report, if set
    pub json_path: Option<PathBuf>,
}

impl Default for EvaluateConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            checkpoint_dir: PathBuf::from("modelsweight_ppo"),
            games_per_map: 100,
            max_turns: 1000,
            csv_path: None,
            json_path: None,
        }
    }
}

impl EvaluateConfig {
    /// Read a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        serde_json::from_str(&json).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.games_per_map == 0 {
            return Err("games_per_map must be at least 1".to_string());
        }
        if self.max_turns == 0 {
            return Err("max_turns must be at least 1".to_string());
        }
        self.game.validate()
    }
}

/// Why an evaluation game stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameEnd {
    GameOver,
    BadMovement,
    TurnLimit,
}

impl GameEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GameOver => "GAME_OVER",
            Self::BadMovement => "BAD_MOVEMENT",
            Self::TurnLimit => "TURN_LIMIT",
        }
    }
}

/// Final scores of one evaluation game
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub map_id: u32,
    pub total_score: f64,
    pub nb_turn: u32,
    pub end: GameEnd,
}

/// Aggregate of the games played on one map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSummary {
    pub map_id: u32,
    pub games: usize,
    pub score: Summary,
    pub turns: Summary,
    pub game_overs: usize,
    pub bad_movements: usize,
    pub turn_limits: usize,
}

impl MapSummary {
    pub fn from_records(map_id: u32, records: &[GameRecord]) -> Self {
        let count = |end: GameEnd| records.iter().filter(|r| r.end == end).count();
        Self {
            map_id,
            games: records.len(),
            score: Summary::of(records.iter().map(|r| r.total_score)),
            turns: Summary::of(records.iter().map(|r| r.nb_turn as f64)),
            game_overs: count(GameEnd::GameOver),
            bad_movements: count(GameEnd::BadMovement),
            turn_limits: count(GameEnd::TurnLimit),
        }
    }

    /// One-line rendering for the log
    pub fn format(&self) -> String {
        format!(
            "map {} | {} games | score mean {:.2} best {:.0} | turns mean {:.1} | game over {} bad move {} turn limit {}",
            self.map_id,
            self.games,
            self.score.mean,
            self.score.max,
            self.turns.mean,
            self.game_overs,
            self.bad_movements,
            self.turn_limits,
        )
    }
}

/// Everything an evaluation run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Training epochs of the evaluated checkpoint
    pub epochs_trained: usize,
    pub maps: Vec<MapSummary>,
    pub games: Vec<GameRecord>,
}

impl EvaluationReport {
    /// Write one row per game
    ///
    /// # Format
    ///
    /// ```text
    /// map_id,total_score,nb_turn,end
    /// 2,45,34,GAME_OVER
    /// ```
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create CSV file at {:?}", path))?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "map_id,total_score,nb_turn,end")?;
        for game in &self.games {
            writeln!(
                writer,
                "{},{},{},{}",
                game.map_id,
                game.total_score,
                game.nb_turn,
                game.end.as_str()
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize evaluation report")?;
        fs::write(path, json).with_context(|| format!("Failed to write evaluation report {:?}", path))
    }
}

/// Evaluation mode for a trained policy
pub struct EvaluateMode<B: Backend, S: GameServer> {
    /// Policy network (no autodiff)
    policy: Mlp<B>,
    server: S,
    metadata: ModelMetadata,
    config: EvaluateConfig,
    device: B::Device,
}

impl<B: Backend, S: GameServer> EvaluateMode<B, S> {
    /// Load the checkpoint in `config.checkpoint_dir`
    ///
    /// Hidden layer sizes are taken from the checkpoint metadata; observation
    /// size and action count must match the game configuration.
    pub fn new(config: EvaluateConfig, server: S, device: B::Device) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow!("invalid evaluation configuration: {}", e))?;

        let dir = &config.checkpoint_dir;
        let metadata = load_metadata(dir)
            .with_context(|| format!("Failed to read checkpoint metadata from {:?}", dir))?
            .ok_or_else(|| anyhow!("no checkpoint found in {:?}", dir))?;

        let expected = NetworkConfig::new(
            config.game.observation_dim(),
            NUM_ACTIONS,
            metadata.network.hidden_sizes.clone(),
        );
        let checkpoint = load_checkpoint::<B>(dir, &expected, &device)
            .with_context(|| format!("Failed to load checkpoint from {:?}", dir))?
            .ok_or_else(|| anyhow!("no checkpoint found in {:?}", dir))?;

        info!(
            "Loaded policy from {:?} ({} epochs trained, hidden {:?})",
            dir, metadata.epochs_trained, metadata.network.hidden_sizes
        );

        Ok(Self {
            policy: checkpoint.policy,
            server,
            metadata,
            config,
            device,
        })
    }

    /// Play every map and export the results
    pub fn run(&mut self) -> Result<EvaluationReport> {
        self.log_header();

        let mut maps = Vec::new();
        let mut games = Vec::new();
        for map_id in self.config.game.map_ids.clone() {
            let mut records = Vec::with_capacity(self.config.games_per_map);
            for _ in 0..self.config.games_per_map {
                records.push(self.play_game(map_id)?);
            }

            let summary = MapSummary::from_records(map_id, &records);
            info!("{}", summary.format());
            maps.push(summary);
            games.extend(records);
        }

        let report = EvaluationReport {
            epochs_trained: self.metadata.epochs_trained,
            maps,
            games,
        };

        if let Some(path) = &self.config.csv_path {
            report.write_csv(path)?;
            info!("Wrote {} games to {:?}", report.games.len(), path);
        }
        if let Some(path) = &self.config.json_path {
            report.write_json(path)?;
        }

        Ok(report)
    }

    /// Play one greedy game on `map_id`
    pub fn play_game(&mut self, map_id: u32) -> Result<GameRecord> {
        self.server
            .create_game(map_id)
            .with_context(|| format!("Failed to create a game on map {}", map_id))?;

        let mut end = GameEnd::TurnLimit;
        for _ in 0..self.config.max_turns {
            let observation = self
                .server
                .flashlight(self.config.game.flashlight_radius)
                .context("Failed to read observation")?;
            let direction = self.select_direction(&observation)?;

            match self.server.move_player(direction).context("Failed to move player")? {
                MoveOutcome::Moved(_) => {}
                MoveOutcome::Invalid => {
                    end = GameEnd::BadMovement;
                    break;
                }
                MoveOutcome::GameOver => {
                    end = GameEnd::GameOver;
                    break;
                }
            }
        }

        let scores = self.server.scores().context("Failed to read scores")?;
        debug!(
            "map {}: score {} after {} turns ({})",
            map_id,
            scores.total_score,
            scores.nb_turn,
            end.as_str()
        );

        Ok(GameRecord {
            map_id,
            total_score: scores.total_score,
            nb_turn: scores.nb_turn,
            end,
        })
    }

    /// Direction of the largest policy logit
    pub fn select_direction(&self, observation: &[f32]) -> Result<Direction> {
        let expected = self.config.game.observation_dim();
        if observation.len() != expected {
            bail!(
                "observation has {} values, network expects {}",
                observation.len(),
                expected
            );
        }

        let input = backend::matrix(observation, 1, expected, &self.device);
        let logits = backend::to_vec(self.policy.forward(input)).context("reading policy logits")?;
        let action = greedy_action(&logits);
        Direction::from_index(action).ok_or_else(|| anyhow!("policy chose unknown action {}", action))
    }

    fn log_header(&self) {
        info!("{}", "=".repeat(70));
        info!("PPO Evaluation - Survaillant");
        info!("{}", "=".repeat(70));
        info!("Server: {}", self.config.game.server_url);
        info!(
            "Maps: {:?} | {} games per map | Max turns: {}",
            self.config.game.map_ids, self.config.games_per_map, self.config.max_turns
        );
        info!("{}", "=".repeat(70));
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn server(&self) -> &S {
        &self.server
    }
}
