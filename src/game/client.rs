//! HTTP client for the Survaillant game server
//!
//! [`GameServer`] is the narrow interface the environment adapter needs;
//! [`HttpGameServer`] implements it on a blocking `reqwest` client with request
//! timeouts and retry with exponential backoff on transient failures.

use std::thread;
use std::time::Duration;

use log::{debug, warn};
use serde::de::DeserializeOwned;

use super::action::Direction;
use super::config::GameConfig;
use super::state::{MoveOutcome, MoveResponse, MoveStatus, Scores};
use crate::error::EnvError;
use crate::rl::observation::flatten_observation;

/// Upper bound on a single retry delay
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Operations the training loop needs from a game session
pub trait GameServer {
    /// Start a new session on the given map
    fn create_game(&mut self, map_id: u32) -> Result<(), EnvError>;

    /// Flattened flashlight view around the player
    fn flashlight(&mut self, radius: usize) -> Result<Vec<f32>, EnvError>;

    /// Send a move; on success the scores are fetched right after it
    fn move_player(&mut self, direction: Direction) -> Result<MoveOutcome, EnvError>;

    /// Scores of the current session
    fn scores(&mut self) -> Result<Scores, EnvError>;
}

/// Game server reached over HTTP
pub struct HttpGameServer {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HttpGameServer {
    /// Build a client from the game configuration
    pub fn new(config: &GameConfig) -> Result<Self, EnvError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| EnvError::Transport {
                endpoint: config.server_url.clone(),
                message: e.to_string(),
                transient: false,
            })?;

        Ok(Self {
            client,
            base_url: config.server_url.clone(),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    /// GET `path` and return the raw body, retrying transient failures
    fn get_text(&self, path: &str) -> Result<String, EnvError> {
        let mut attempt = 0;
        loop {
            match self.try_get_text(path) {
                Ok(body) => return Ok(body),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    let delay = self.retry_delay(attempt);
                    attempt += 1;
                    warn!(
                        "{} (attempt {}/{}), retrying in {:?}",
                        err, attempt, self.max_retries, delay
                    );
                    thread::sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// `retry_backoff · 2^attempt`, capped at [`MAX_RETRY_DELAY`]
    fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.retry_backoff.saturating_mul(factor).min(MAX_RETRY_DELAY)
    }

    fn try_get_text(&self, path: &str) -> Result<String, EnvError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| transport_error(path, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnvError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().map_err(|e| transport_error(path, e))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, EnvError> {
        let body = self.get_text(path)?;
        serde_json::from_str(&body).map_err(|e| EnvError::Schema {
            endpoint: path.to_string(),
            message: e.to_string(),
        })
    }
}

impl GameServer for HttpGameServer {
    fn create_game(&mut self, map_id: u32) -> Result<(), EnvError> {
        self.get_text(&format!("createNewGame/{}", map_id))?;
        Ok(())
    }

    fn flashlight(&mut self, radius: usize) -> Result<Vec<f32>, EnvError> {
        let path = format!("getGameSate/flashLight?radius={}", radius);
        let grid: serde_json::Value = self.get_json(&path)?;
        flatten_observation(&grid).map_err(|message| EnvError::Schema {
            endpoint: path,
            message,
        })
    }

    fn move_player(&mut self, direction: Direction) -> Result<MoveOutcome, EnvError> {
        let (dx, dy) = direction.delta();
        let response: MoveResponse = self.get_json(&format!("movePlayer?x={}&y={}", dx, dy))?;

        match response.resp {
            MoveStatus::BadMovement => Ok(MoveOutcome::Invalid),
            MoveStatus::GameOver => Ok(MoveOutcome::GameOver),
            MoveStatus::Ok => Ok(MoveOutcome::Moved(self.scores()?)),
        }
    }

    fn scores(&mut self) -> Result<Scores, EnvError> {
        self.get_json("getScores")
    }
}

fn transport_error(endpoint: &str, err: reqwest::Error) -> EnvError {
    let transient = err.is_timeout() || err.is_connect();
    EnvError::Transport {
        endpoint: endpoint.to_string(),
        message: err.to_string(),
        transient,
    }
}
