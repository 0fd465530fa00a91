//! Categorical action sampling and log-probabilities
//!
//! The scalar functions work on a single logit vector during collection; the
//! tensor version recomputes log-probabilities of a whole batch during the
//! policy update so gradients flow through it.

use burn::tensor::{Int, Tensor, activation::log_softmax, backend::Backend};
use rand::Rng;
use rand::distributions::Standard;

/// Numerically stable softmax of a logit vector
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// `log_softmax(logits)[action]`
pub fn log_probability(logits: &[f32], action: usize) -> f32 {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let log_sum_exp = logits.iter().map(|&l| (l - max).exp()).sum::<f32>().ln() + max;
    logits[action] - log_sum_exp
}

/// Draw an action index with probability `softmax(logits)`
pub fn sample_categorical<R: Rng + ?Sized>(logits: &[f32], rng: &mut R) -> usize {
    let probs = softmax(logits);
    let random_val: f32 = rng.sample(Standard);
    let mut cumsum = 0.0;

    for (idx, &prob) in probs.iter().enumerate() {
        cumsum += prob;
        if random_val < cumsum {
            return idx;
        }
    }

    // Rounding can leave the cumulative sum just below 1
    probs.len() - 1
}

/// Index of the largest logit; the first one wins a tie
pub fn greedy_action(logits: &[f32]) -> usize {
    let mut best = 0;
    for (idx, &logit) in logits.iter().enumerate() {
        if logit > logits[best] {
            best = idx;
        }
    }
    best
}

/// Log-probabilities of `actions` under `logits`, row by row
///
/// # Arguments
///
/// * `logits` - Policy output [batch, num_actions]
/// * `actions` - Action indices [batch]
///
/// # Returns
///
/// Tensor [batch] of `log_softmax(logits)[i, actions[i]]`
pub fn log_probabilities<B: Backend>(
    logits: Tensor<B, 2>,
    actions: Tensor<B, 1, Int>,
) -> Tensor<B, 1> {
    log_softmax(logits, 1)
        .gather(1, actions.unsqueeze_dim(1))
        .squeeze::<1>(1)
}
