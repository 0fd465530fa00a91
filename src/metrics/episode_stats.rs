//! Per-epoch summaries of finished episodes

use serde::{Deserialize, Serialize};

/// Mean, population standard deviation, extremes and total of a sample
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
}

impl Summary {
    /// Summarize `values`; an empty sample gives all zeros
    pub fn of<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let values: Vec<f64> = values.into_iter().collect();
        if values.is_empty() {
            return Self::default();
        }

        let n = values.len() as f64;
        let sum: f64 = values.iter().sum();
        let mean = sum / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Self {
            mean,
            std: variance.sqrt(),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            sum,
        }
    }
}

/// Returns and lengths of the episodes finished during one epoch
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EpisodeSummary {
    /// Finished trajectories, including the one cut at the epoch boundary
    pub episodes: usize,
    pub returns: Summary,
    pub lengths: Summary,
}

impl EpisodeSummary {
    pub fn new(returns: &[f32], lengths: &[usize]) -> Self {
        Self {
            episodes: returns.len(),
            returns: Summary::of(returns.iter().map(|&r| r as f64)),
            lengths: Summary::of(lengths.iter().map(|&l| l as f64)),
        }
    }

    /// One-line rendering for the epoch log
    pub fn format(&self) -> String {
        format!(
            "episodes {} | return mean {:.3} std {:.3} min {:.3} max {:.3} | length mean {:.1} std {:.1} min {} max {}",
            self.episodes,
            self.returns.mean,
            self.returns.std,
            self.returns.min,
            self.returns.max,
            self.lengths.mean,
            self.lengths.std,
            self.lengths.min,
            self.lengths.max,
        )
    }
}
