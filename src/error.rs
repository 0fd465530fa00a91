use std::path::PathBuf;

/// Errors raised while talking to the game server or shaping its responses.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("request to {endpoint} failed: {message}")]
    Transport {
        endpoint: String,
        message: String,
        transient: bool,
    },

    #[error("game server answered {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("unexpected response from {endpoint}: {message}")]
    Schema { endpoint: String, message: String },

    #[error("action index {0} is out of range")]
    InvalidAction(usize),

    #[error("invalid game configuration: {0}")]
    Config(String),
}

impl EnvError {
    /// Whether retrying the same request may succeed.
    ///
    /// Timeouts, refused connections and 5xx answers are transient; client
    /// errors, malformed payloads and bad actions are not.
    pub fn is_transient(&self) -> bool {
        match self {
            EnvError::Transport { transient, .. } => *transient,
            EnvError::Status { status, .. } => *status >= 500,
            EnvError::Schema { .. } | EnvError::InvalidAction(_) | EnvError::Config(_) => false,
        }
    }
}

/// Errors raised by the rollout buffer.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BufferError {
    #[error("rollout buffer is full ({capacity} transitions)")]
    Full { capacity: usize },

    #[error("observation has {got} values, buffer expects {expected}")]
    ObservationSize { expected: usize, got: usize },

    #[error("rollout buffer is empty")]
    Empty,

    #[error("trajectory [{start}, {pointer}) was not finished before reading the buffer")]
    UnfinishedTrajectory { start: usize, pointer: usize },
}

/// Errors that can occur during checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("failed to save model: {0}")]
    ModelSave(String),

    #[error("failed to load model from {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error(
        "checkpoint shape (obs {found_obs}, actions {found_actions}) does not match configured (obs {expected_obs}, actions {expected_actions})"
    )]
    ShapeMismatch {
        expected_obs: usize,
        expected_actions: usize,
        found_obs: usize,
        found_actions: usize,
    },

    #[error("checkpoint hidden layers {found:?} do not match configured {expected:?}")]
    LayerMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
