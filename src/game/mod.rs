//! Remote game boundary
//!
//! The Survaillant game runs in a separate server process. This module holds its
//! move set, connection settings, response schemas and the HTTP client; reward
//! shaping lives in [`crate::rl::environment`].

pub mod action;
pub mod client;
pub mod config;
pub mod state;

// Re-export commonly used types
pub use action::{Direction, NUM_ACTIONS};
pub use client::{GameServer, HttpGameServer};
pub use config::GameConfig;
pub use state::{MoveOutcome, MoveStatus, Scores};
