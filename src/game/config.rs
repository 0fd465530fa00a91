use serde::{Deserialize, Serialize};

use crate::rl::observation::observation_dim;

/// Configuration of the remote game and of the reward shaping applied to it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Base URL of the game server, with trailing slash
    pub server_url: String,
    /// Map identifiers a new session is drawn from
    pub map_ids: Vec<u32>,
    /// Visibility radius of the flashlight observation
    pub flashlight_radius: usize,

    // Rewards (for RL)
    /// Episode is cut once the server reports more turns than this
    pub max_turns: u32,
    /// Reward for a move the server rejects
    pub invalid_move_reward: f32,
    /// Reward for a move that ends the game
    pub game_over_reward: f32,

    // Transport
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Retries for transient transport failures
    pub max_retries: u32,
    /// First retry delay in milliseconds, doubled on each attempt
    pub retry_backoff_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:4000/".to_string(),
            map_ids: vec![0, 1, 2, 3, 4],
            flashlight_radius: 3,
            max_turns: 50,
            invalid_move_reward: -3.0,
            game_over_reward: -10.0,
            request_timeout_secs: 10,
            max_retries: 3,
            retry_backoff_ms: 200,
        }
    }
}

impl GameConfig {
    /// Create a configuration pointing at a specific server
    pub fn new(server_url: impl Into<String>) -> Self {
        let mut server_url = server_url.into();
        if !server_url.ends_with('/') {
            server_url.push('/');
        }
        Self {
            server_url,
            ..Default::default()
        }
    }

    /// Length of the flattened observation: 5 channels over a (2r+1)² window
    pub fn observation_dim(&self) -> usize {
        observation_dim(self.flashlight_radius)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.map_ids.is_empty() {
            return Err("map_ids must contain at least one map".to_string());
        }

        if self.max_turns == 0 {
            return Err("max_turns must be at least 1".to_string());
        }

        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be at least 1".to_string());
        }

        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(format!(
                "server_url must be an http(s) URL, got {}",
                self.server_url
            ));
        }

        Ok(())
    }
}
