//! Training progress metrics
//!
//! - [`EpisodeSummary`]: per-epoch statistics of finished episodes
//! - [`TrainingStats`]: rolling averages across epochs
//! - [`PerformanceMetrics`]: phase timings and operation rates

pub mod episode_stats;
pub mod performance;
pub mod training_stats;

pub use episode_stats::{EpisodeSummary, Summary};
pub use performance::{PerformanceMetrics, PhaseTimer, TimingKey};
pub use training_stats::TrainingStats;
