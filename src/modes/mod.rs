//! Run modes: PPO training and greedy evaluation of a checkpoint

pub mod evaluate;
pub mod train;

pub use evaluate::{EvaluateConfig, EvaluateMode, EvaluationReport, GameEnd, GameRecord, MapSummary};
pub use train::{EpochReport, TrainConfig, TrainMode};
