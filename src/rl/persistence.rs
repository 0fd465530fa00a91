//! Checkpoints of the policy and value networks
//!
//! A checkpoint directory holds three files:
//! - `policy.mpk` - policy network weights (Burn named MessagePack record)
//! - `value.mpk` - value network weights
//! - `metadata.json` - [`ModelMetadata`]
//!
//! Each file is first written under a temporary name and then renamed over the
//! previous one, so no file is ever seen half written. The three renames are
//! separate steps: a crash between them can pair networks from consecutive
//! epochs. Metadata is renamed last, so `epochs_trained` never runs ahead of
//! the weights.

use std::fs;
use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
    tensor::backend::{AutodiffBackend, Backend},
};
use log::info;
use serde::{Deserialize, Serialize};

use super::network::{Mlp, NetworkConfig};
use super::ppo::PPOAgent;
use super::config::PPOConfig;
use crate::error::CheckpointError;

const POLICY_FILE: &str = "policy";
const VALUE_FILE: &str = "value";
const METADATA_FILE: &str = "metadata.json";
const WEIGHTS_EXTENSION: &str = "mpk";

/// Metadata saved with the networks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// PPO configuration used during training
    pub ppo_config: PPOConfig,

    /// Shape of both networks
    pub network: NetworkConfig,

    /// Epochs completed when the checkpoint was written
    pub epochs_trained: usize,

    /// Crate version that wrote the checkpoint
    pub version: String,
}

impl ModelMetadata {
    pub fn new(ppo_config: PPOConfig, network: NetworkConfig, epochs_trained: usize) -> Self {
        Self {
            ppo_config,
            network,
            epochs_trained,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Networks restored from a checkpoint directory
pub struct Checkpoint<B: Backend> {
    pub policy: Mlp<B>,
    pub value: Mlp<B>,
    pub metadata: ModelMetadata,
}

fn weights_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(stem).with_extension(WEIGHTS_EXTENSION)
}

/// Whether `dir` holds a complete checkpoint
pub fn checkpoint_exists(dir: &Path) -> bool {
    weights_path(dir, POLICY_FILE).is_file()
        && weights_path(dir, VALUE_FILE).is_file()
        && dir.join(METADATA_FILE).is_file()
}

fn save_network<B: Backend>(
    network: &Mlp<B>,
    dir: &Path,
    stem: &str,
) -> Result<(), CheckpointError> {
    let tmp_stem = format!("{}-tmp", stem);
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .record(network.clone().into_record(), dir.join(&tmp_stem))
        .map_err(|e| CheckpointError::ModelSave(format!("{} network: {:?}", stem, e)))?;

    fs::rename(weights_path(dir, &tmp_stem), weights_path(dir, stem))?;
    Ok(())
}

/// Save both networks and their metadata into `dir`
///
/// Creates `dir` if needed.
pub fn save_checkpoint<B: AutodiffBackend>(
    agent: &PPOAgent<B>,
    dir: &Path,
    epochs_trained: usize,
) -> Result<(), CheckpointError> {
    fs::create_dir_all(dir)?;

    save_network(agent.policy(), dir, POLICY_FILE)?;
    save_network(agent.value(), dir, VALUE_FILE)?;

    let metadata = ModelMetadata::new(
        agent.config().clone(),
        agent.network_config().clone(),
        epochs_trained,
    );
    let tmp = dir.join(format!("{}.tmp", METADATA_FILE));
    fs::write(&tmp, serde_json::to_string_pretty(&metadata)?)?;
    fs::rename(&tmp, dir.join(METADATA_FILE))?;

    Ok(())
}

fn load_network<B: Backend>(
    network: Mlp<B>,
    dir: &Path,
    stem: &str,
    device: &B::Device,
) -> Result<Mlp<B>, CheckpointError> {
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let record = recorder
        .load(dir.join(stem), device)
        .map_err(|e| CheckpointError::ModelLoad {
            path: weights_path(dir, stem),
            message: format!("{:?}", e),
        })?;
    Ok(network.load_record(record))
}

/// Read the metadata of the checkpoint in `dir`, if it holds a complete one
pub fn load_metadata(dir: &Path) -> Result<Option<ModelMetadata>, CheckpointError> {
    if !checkpoint_exists(dir) {
        return Ok(None);
    }
    let json = fs::read_to_string(dir.join(METADATA_FILE))?;
    Ok(Some(serde_json::from_str(&json)?))
}

/// Load a checkpoint written by [`save_checkpoint`]
///
/// Returns `Ok(None)` when `dir` does not hold a complete checkpoint, so the
/// caller can start from fresh networks. A checkpoint whose shape differs from
/// `expected` is an error.
pub fn load_checkpoint<B: Backend>(
    dir: &Path,
    expected: &NetworkConfig,
    device: &B::Device,
) -> Result<Option<Checkpoint<B>>, CheckpointError> {
    let Some(metadata) = load_metadata(dir)? else {
        info!("no checkpoint found in {}", dir.display());
        return Ok(None);
    };
    let found = &metadata.network;

    if found.observation_dim != expected.observation_dim || found.num_actions != expected.num_actions
    {
        return Err(CheckpointError::ShapeMismatch {
            expected_obs: expected.observation_dim,
            expected_actions: expected.num_actions,
            found_obs: found.observation_dim,
            found_actions: found.num_actions,
        });
    }
    if found.hidden_sizes != expected.hidden_sizes {
        return Err(CheckpointError::LayerMismatch {
            expected: expected.hidden_sizes.clone(),
            found: found.hidden_sizes.clone(),
        });
    }

    let policy = load_network(expected.init_policy(device), dir, POLICY_FILE, device)?;
    let value = load_network(expected.init_value(device), dir, VALUE_FILE, device)?;

    Ok(Some(Checkpoint {
        policy,
        value,
        metadata,
    }))
}
