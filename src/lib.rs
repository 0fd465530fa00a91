//! Survaillant PPO - train a PPO agent against the Survaillant game server
//!
//! This library provides:
//! - The HTTP game boundary (game module)
//! - PPO training infrastructure (rl module)
//! - Episode, training and performance statistics (metrics module)
//! - The epoch-driven training loop (modes module)

pub mod error;
pub mod game;
pub mod metrics;
pub mod modes;
pub mod rl;
