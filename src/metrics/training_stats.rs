//! Training statistics tracking for PPO
//!
//! Rolling windows over recent episodes and update phases, used for the
//! smoothed progress line printed after every epoch.

use std::collections::VecDeque;

use crate::rl::UpdateSummary;

/// Training statistics tracker with rolling averages
///
/// # Example
///
/// ```rust
/// use survaillant_ppo::metrics::TrainingStats;
///
/// let mut stats = TrainingStats::new(100);
/// stats.record_episode(15.5, 12);
///
/// assert_eq!(stats.total_episodes(), 1);
/// println!("{}", stats.format_summary());
/// ```
#[derive(Debug, Clone)]
pub struct TrainingStats {
    /// Episode returns (rolling window)
    episode_returns: VecDeque<f32>,

    /// Episode lengths in steps (rolling window)
    episode_lengths: VecDeque<usize>,

    /// Approximate KL at the end of each policy phase (rolling window)
    kls: VecDeque<f32>,

    /// Final value loss of each value phase (rolling window)
    value_losses: VecDeque<f32>,

    /// Policy iterations used per epoch (rolling window)
    policy_iterations: VecDeque<usize>,

    total_episodes: usize,
    total_steps: usize,
    total_updates: usize,
    early_stops: usize,

    /// Window size for rolling averages
    window_size: usize,
}

impl TrainingStats {
    pub fn new(window_size: usize) -> Self {
        Self {
            episode_returns: VecDeque::with_capacity(window_size),
            episode_lengths: VecDeque::with_capacity(window_size),
            kls: VecDeque::with_capacity(window_size),
            value_losses: VecDeque::with_capacity(window_size),
            policy_iterations: VecDeque::with_capacity(window_size),
            total_episodes: 0,
            total_steps: 0,
            total_updates: 0,
            early_stops: 0,
            window_size,
        }
    }

    /// Record a finished trajectory
    pub fn record_episode(&mut self, episode_return: f32, length: usize) {
        Self::push_deque(&mut self.episode_returns, episode_return, self.window_size);
        Self::push_deque(&mut self.episode_lengths, length, self.window_size);
        self.total_episodes += 1;
        self.total_steps += length;
    }

    /// Record the outcome of one update phase
    pub fn record_update(&mut self, update: &UpdateSummary) {
        Self::push_deque(&mut self.kls, update.kl, self.window_size);
        Self::push_deque(&mut self.value_losses, update.value_loss, self.window_size);
        Self::push_deque(
            &mut self.policy_iterations,
            update.policy_iterations,
            self.window_size,
        );
        self.total_updates += 1;
        if update.early_stopped {
            self.early_stops += 1;
        }
    }

    pub fn mean_episode_return(&self) -> f32 {
        Self::mean(&self.episode_returns)
    }

    pub fn mean_episode_length(&self) -> f32 {
        if self.episode_lengths.is_empty() {
            0.0
        } else {
            self.episode_lengths.iter().sum::<usize>() as f32 / self.episode_lengths.len() as f32
        }
    }

    pub fn mean_kl(&self) -> f32 {
        Self::mean(&self.kls)
    }

    pub fn mean_value_loss(&self) -> f32 {
        Self::mean(&self.value_losses)
    }

    pub fn mean_policy_iterations(&self) -> f32 {
        if self.policy_iterations.is_empty() {
            0.0
        } else {
            self.policy_iterations.iter().sum::<usize>() as f32
                / self.policy_iterations.len() as f32
        }
    }

    pub fn total_episodes(&self) -> usize {
        self.total_episodes
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn total_updates(&self) -> usize {
        self.total_updates
    }

    /// Update phases that ended on the KL limit
    pub fn early_stops(&self) -> usize {
        self.early_stops
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Format a summary of the current statistics
    ///
    /// ```text
    /// Episodes: 12 | Steps: 4000 | Return: 3.25 | Len: 21.4 | KL: 0.0081 | V_Loss: 1.2040 | Pi_Iters: 42.0 | Early stops: 3
    /// ```
    pub fn format_summary(&self) -> String {
        format!(
            "Episodes: {} | Steps: {} | Return: {:.2} | Len: {:.1} | KL: {:.4} | V_Loss: {:.4} | Pi_Iters: {:.1} | Early stops: {}",
            self.total_episodes,
            self.total_steps,
            self.mean_episode_return(),
            self.mean_episode_length(),
            self.mean_kl(),
            self.mean_value_loss(),
            self.mean_policy_iterations(),
            self.early_stops,
        )
    }

    fn mean(deque: &VecDeque<f32>) -> f32 {
        if deque.is_empty() {
            0.0
        } else {
            deque.iter().sum::<f32>() / deque.len() as f32
        }
    }

    fn push_deque<T>(deque: &mut VecDeque<T>, value: T, window_size: usize) {
        if deque.len() >= window_size {
            deque.pop_front();
        }
        deque.push_back(value);
    }
}
