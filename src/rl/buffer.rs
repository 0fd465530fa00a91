//! Rollout buffer for PPO trajectory collection
//!
//! Stores one epoch of transitions in fixed-size arrays and computes advantages
//! with Generalized Advantage Estimation (GAE) each time a trajectory ends.

use log::warn;

use super::discount::discounted_cumsum;
use crate::error::BufferError;

/// Smallest standard deviation used when normalizing advantages
pub const ADVANTAGE_STD_EPSILON: f32 = 1e-8;

/// Experience buffer for one epoch of PPO training
///
/// Two cursors drive it: `pointer` is the next slot to write and
/// `trajectory_start` the first slot of the trajectory still being collected.
/// `trajectory_start <= pointer <= capacity` holds at all times.
///
/// # Example
///
/// ```rust
/// use survaillant_ppo::rl::RolloutBuffer;
///
/// let mut buffer = RolloutBuffer::new(2, 3, 0.99, 0.97);
///
/// buffer.store(&[0.0, 1.0], 0, 1.0, 0.5, -1.4).unwrap();
/// buffer.store(&[1.0, 0.0], 2, 1.0, 0.4, -1.3).unwrap();
/// buffer.store(&[1.0, 1.0], 1, 0.0, 0.3, -1.2).unwrap();
/// buffer.finish_trajectory(0.0);
///
/// let batch = buffer.get().unwrap();
/// assert_eq!(batch.len(), 3);
/// assert_eq!(buffer.pointer(), 0);
/// ```
pub struct RolloutBuffer {
    /// Flattened observations [capacity * observation_dim]
    observations: Vec<f32>,

    /// Action indices taken [capacity]
    actions: Vec<usize>,

    /// Rewards received [capacity]
    rewards: Vec<f32>,

    /// Value estimates V(s) [capacity]
    values: Vec<f32>,

    /// Behaviour-policy log probabilities [capacity]
    log_probs: Vec<f32>,

    /// GAE advantages, filled by `finish_trajectory` [capacity]
    advantages: Vec<f32>,

    /// Discounted returns, filled by `finish_trajectory` [capacity]
    returns: Vec<f32>,

    observation_dim: usize,
    capacity: usize,
    gamma: f32,
    lam: f32,

    /// Next slot to write
    pointer: usize,

    /// First slot of the open trajectory
    trajectory_start: usize,
}

/// Contents of a drained buffer, ready for the update phase
#[derive(Debug, Clone)]
pub struct RolloutBatch {
    /// Flattened observations [len * observation_dim]
    pub observations: Vec<f32>,
    pub observation_dim: usize,
    pub actions: Vec<usize>,
    /// Advantages normalized over the whole batch
    pub advantages: Vec<f32>,
    pub returns: Vec<f32>,
    pub log_probs: Vec<f32>,
}

impl RolloutBatch {
    /// Number of transitions in the batch
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl RolloutBuffer {
    /// Create a buffer holding `capacity` transitions of `observation_dim` features
    ///
    /// # Arguments
    ///
    /// * `observation_dim` - Length of each flattened observation
    /// * `capacity` - Transitions per epoch
    /// * `gamma` - Discount factor
    /// * `lam` - GAE lambda
    pub fn new(observation_dim: usize, capacity: usize, gamma: f32, lam: f32) -> Self {
        Self {
            observations: vec![0.0; capacity * observation_dim],
            actions: vec![0; capacity],
            rewards: vec![0.0; capacity],
            values: vec![0.0; capacity],
            log_probs: vec![0.0; capacity],
            advantages: vec![0.0; capacity],
            returns: vec![0.0; capacity],
            observation_dim,
            capacity,
            gamma,
            lam,
            pointer: 0,
            trajectory_start: 0,
        }
    }

    /// Append one step of agent-environment interaction
    ///
    /// # Errors
    ///
    /// [`BufferError::Full`] once `capacity` transitions are stored, and
    /// [`BufferError::ObservationSize`] if the observation has the wrong length.
    pub fn store(
        &mut self,
        observation: &[f32],
        action: usize,
        reward: f32,
        value: f32,
        log_prob: f32,
    ) -> Result<(), BufferError> {
        if self.pointer >= self.capacity {
            return Err(BufferError::Full {
                capacity: self.capacity,
            });
        }
        if observation.len() != self.observation_dim {
            return Err(BufferError::ObservationSize {
                expected: self.observation_dim,
                got: observation.len(),
            });
        }

        let offset = self.pointer * self.observation_dim;
        self.observations[offset..offset + self.observation_dim].copy_from_slice(observation);
        self.actions[self.pointer] = action;
        self.rewards[self.pointer] = reward;
        self.values[self.pointer] = value;
        self.log_probs[self.pointer] = log_prob;
        self.pointer += 1;

        Ok(())
    }

    /// Close the open trajectory and compute its advantages and returns
    ///
    /// With `last_value` appended to both rewards and values over
    /// `[trajectory_start, pointer)`:
    ///
    /// ```text
    /// δ_t = r_t + γ · V(s_{t+1}) − V(s_t)
    /// A   = discounted_cumsum(δ, γλ)
    /// R   = discounted_cumsum(r ++ [last_value], γ)[..len]
    /// ```
    ///
    /// `last_value` must be 0 for a terminal state and the critic's estimate of
    /// the cut-off observation when the epoch ends mid-episode.
    pub fn finish_trajectory(&mut self, last_value: f32) {
        let start = self.trajectory_start;
        let end = self.pointer;
        if start == end {
            return;
        }

        let mut rewards = self.rewards[start..end].to_vec();
        rewards.push(last_value);
        let mut values = self.values[start..end].to_vec();
        values.push(last_value);

        let deltas: Vec<f32> = (0..end - start)
            .map(|i| rewards[i] + self.gamma * values[i + 1] - values[i])
            .collect();

        let advantages = discounted_cumsum(&deltas, self.gamma * self.lam);
        let returns = discounted_cumsum(&rewards, self.gamma);

        self.advantages[start..end].copy_from_slice(&advantages);
        self.returns[start..end].copy_from_slice(&returns[..end - start]);

        self.trajectory_start = end;
    }

    /// Read out the epoch and reset both cursors
    ///
    /// Advantages are normalized to zero mean and unit standard deviation over
    /// every stored transition. The deviation is floored at
    /// [`ADVANTAGE_STD_EPSILON`]; a buffer whose advantages are all equal yields
    /// all-zero advantages, meaning no policy-gradient signal for the epoch.
    ///
    /// # Errors
    ///
    /// [`BufferError::Empty`] if nothing was stored and
    /// [`BufferError::UnfinishedTrajectory`] if the last trajectory was never
    /// finished.
    pub fn get(&mut self) -> Result<RolloutBatch, BufferError> {
        let n = self.pointer;
        if n == 0 {
            return Err(BufferError::Empty);
        }
        if self.trajectory_start != n {
            return Err(BufferError::UnfinishedTrajectory {
                start: self.trajectory_start,
                pointer: n,
            });
        }

        let advantages = &mut self.advantages[..n];
        let mean = advantages.iter().sum::<f32>() / n as f32;
        let variance = advantages.iter().map(|a| (a - mean).powi(2)).sum::<f32>() / n as f32;
        let std = variance.sqrt();
        if std < ADVANTAGE_STD_EPSILON {
            warn!(
                "advantages have zero variance over {} transitions, no policy-gradient signal this epoch",
                n
            );
        }
        let std = std.max(ADVANTAGE_STD_EPSILON);
        for a in advantages.iter_mut() {
            *a = (*a - mean) / std;
        }

        let batch = RolloutBatch {
            observations: self.observations[..n * self.observation_dim].to_vec(),
            observation_dim: self.observation_dim,
            actions: self.actions[..n].to_vec(),
            advantages: self.advantages[..n].to_vec(),
            returns: self.returns[..n].to_vec(),
            log_probs: self.log_probs[..n].to_vec(),
        };

        self.clear();

        Ok(batch)
    }

    /// Drop every stored transition, including an unfinished trajectory
    pub fn clear(&mut self) {
        self.pointer = 0;
        self.trajectory_start = 0;
    }

    /// Number of stored transitions
    pub fn len(&self) -> usize {
        self.pointer
    }

    pub fn is_empty(&self) -> bool {
        self.pointer == 0
    }

    pub fn is_full(&self) -> bool {
        self.pointer >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Write cursor
    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// First index of the open trajectory
    pub fn trajectory_start(&self) -> usize {
        self.trajectory_start
    }

    /// Stored value estimates
    pub fn values(&self) -> &[f32] {
        &self.values[..self.pointer]
    }

    /// Stored rewards
    pub fn rewards(&self) -> &[f32] {
        &self.rewards[..self.pointer]
    }

    /// Unnormalized advantages of the finished trajectories
    pub fn advantages(&self) -> &[f32] {
        &self.advantages[..self.trajectory_start]
    }

    /// Returns of the finished trajectories
    pub fn returns(&self) -> &[f32] {
        &self.returns[..self.trajectory_start]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OBS_DIM: usize = 3;

    fn obs(x: f32) -> Vec<f32> {
        vec![x; OBS_DIM]
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!((a - e).abs() < 1e-4, "index {}: {} vs {}", i, a, e);
        }
    }

    fn mean_std(xs: &[f32]) -> (f32, f32) {
        let n = xs.len() as f32;
        let mean = xs.iter().sum::<f32>() / n;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n;
        (mean, var.sqrt())
    }

    #[test]
    fn test_buffer_new() {
        let buffer = RolloutBuffer::new(OBS_DIM, 10, 0.99, 0.97);
        assert_eq!(buffer.capacity(), 10);
        assert_eq!(buffer.len(), 0);
        assert!(buffer.is_empty());
        assert!(!buffer.is_full());
    }

    #[test]
    fn test_store_advances_pointer_only() {
        let mut buffer = RolloutBuffer::new(OBS_DIM, 10, 0.99, 0.97);
        buffer.store(&obs(1.0), 0, 1.0, 0.5, -1.0).unwrap();
        buffer.store(&obs(2.0), 1, 1.0, 0.5, -1.0).unwrap();

        assert_eq!(buffer.pointer(), 2);
        assert_eq!(buffer.trajectory_start(), 0);
    }

    #[test]
    fn test_store_rejects_overflow() {
        let mut buffer = RolloutBuffer::new(OBS_DIM, 2, 0.99, 0.97);
        buffer.store(&obs(0.0), 0, 0.0, 0.0, 0.0).unwrap();
        buffer.store(&obs(0.0), 0, 0.0, 0.0, 0.0).unwrap();
        assert!(buffer.is_full());

        let err = buffer.store(&obs(0.0), 0, 0.0, 0.0, 0.0).unwrap_err();
        assert_eq!(err, BufferError::Full { capacity: 2 });
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_store_rejects_wrong_observation_size() {
        let mut buffer = RolloutBuffer::new(OBS_DIM, 2, 0.99, 0.97);
        let err = buffer.store(&[1.0], 0, 0.0, 0.0, 0.0).unwrap_err();
        assert_eq!(
            err,
            BufferError::ObservationSize {
                expected: OBS_DIM,
                got: 1
            }
        );
    }

    #[test]
    fn test_gae_three_step_terminal() {
        let (gamma, lam) = (0.9f32, 0.8f32);
        let mut buffer = RolloutBuffer::new(OBS_DIM, 3, gamma, lam);
        let rewards = [1.0f32, 0.0, 2.0];
        let values = [0.5f32, 0.4, 0.3];
        for i in 0..3 {
            buffer
                .store(&obs(i as f32), i, rewards[i], values[i], -1.0)
                .unwrap();
        }
        buffer.finish_trajectory(0.0);

        // δ_t = r_t + γ V_{t+1} − V_t with V_3 = 0
        let d0 = 1.0 + gamma * 0.4 - 0.5;
        let d1 = 0.0 + gamma * 0.3 - 0.4;
        let d2 = 2.0 + gamma * 0.0 - 0.3;
        let gl = gamma * lam;
        let expected_adv = [d0 + gl * d1 + gl * gl * d2, d1 + gl * d2, d2];
        let expected_ret = [
            1.0 + gamma * 0.0 + gamma * gamma * 2.0,
            0.0 + gamma * 2.0,
            2.0,
        ];

        assert_close(buffer.advantages(), &expected_adv);
        assert_close(buffer.returns(), &expected_ret);
        assert_eq!(buffer.trajectory_start(), 3);
    }

    #[test]
    fn test_gae_two_step_with_bootstrap() {
        let (gamma, lam) = (0.99f32, 0.97f32);
        let mut buffer = RolloutBuffer::new(OBS_DIM, 2, gamma, lam);
        buffer.store(&obs(0.0), 0, 1.0, 2.0, -1.0).unwrap();
        buffer.store(&obs(1.0), 1, -1.0, 1.5, -1.0).unwrap();

        let last_value = 3.0f32;
        buffer.finish_trajectory(last_value);

        let d0 = 1.0 + gamma * 1.5 - 2.0;
        let d1 = -1.0 + gamma * last_value - 1.5;
        let expected_adv = [d0 + gamma * lam * d1, d1];
        // Returns keep the discounted bootstrap and drop only the appended slot
        let expected_ret = [
            1.0 + gamma * -1.0 + gamma * gamma * last_value,
            -1.0 + gamma * last_value,
        ];

        assert_close(buffer.advantages(), &expected_adv);
        assert_close(buffer.returns(), &expected_ret);
    }

    #[test]
    fn test_single_step_return_includes_discounted_bootstrap() {
        let gamma = 0.99f32;
        let mut buffer = RolloutBuffer::new(OBS_DIM, 1, gamma, 0.97);
        buffer.store(&obs(0.0), 0, 2.0, 0.0, -1.0).unwrap();
        buffer.finish_trajectory(5.0);

        assert_close(buffer.returns(), &[2.0 + gamma * 5.0]);
    }

    #[test]
    fn test_trajectories_are_independent() {
        let (gamma, lam) = (0.99f32, 0.97f32);
        let mut buffer = RolloutBuffer::new(OBS_DIM, 4, gamma, lam);

        buffer.store(&obs(0.0), 0, 1.0, 0.0, -1.0).unwrap();
        buffer.store(&obs(0.0), 0, 1.0, 0.0, -1.0).unwrap();
        buffer.finish_trajectory(0.0);
        assert_eq!(buffer.trajectory_start(), 2);

        buffer.store(&obs(0.0), 0, 5.0, 0.0, -1.0).unwrap();
        buffer.store(&obs(0.0), 0, 5.0, 0.0, -1.0).unwrap();
        buffer.finish_trajectory(0.0);

        // First trajectory does not see the large rewards of the second
        assert_close(&buffer.returns()[..2], &[1.0 + gamma, 1.0]);
        assert_close(&buffer.returns()[2..], &[5.0 + gamma * 5.0, 5.0]);
    }

    #[test]
    fn test_finish_empty_trajectory_is_noop() {
        let mut buffer = RolloutBuffer::new(OBS_DIM, 4, 0.99, 0.97);
        buffer.finish_trajectory(1.0);
        assert_eq!(buffer.trajectory_start(), 0);
        assert_eq!(buffer.pointer(), 0);
    }

    #[test]
    fn test_get_normalizes_advantages() {
        let mut buffer = RolloutBuffer::new(OBS_DIM, 10, 0.99, 0.97);
        for i in 0..10 {
            buffer
                .store(&obs(0.0), 0, i as f32, 0.5, -1.0)
                .unwrap();
            if i == 4 {
                buffer.finish_trajectory(0.0);
            }
        }
        buffer.finish_trajectory(0.7);

        let batch = buffer.get().unwrap();
        let (mean, std) = mean_std(&batch.advantages);

        assert!(mean.abs() < 1e-5);
        assert!((std - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_get_with_equal_advantages_gives_zeros() {
        let mut buffer = RolloutBuffer::new(OBS_DIM, 3, 0.99, 0.97);
        for _ in 0..3 {
            buffer.store(&obs(0.0), 0, 0.0, 0.0, -1.0).unwrap();
            buffer.finish_trajectory(0.0);
        }

        let batch = buffer.get().unwrap();
        for a in &batch.advantages {
            assert!(a.is_finite());
            assert_eq!(*a, 0.0);
        }
    }

    #[test]
    fn test_get_resets_cursors_for_reuse() {
        let size = 5;
        let mut buffer = RolloutBuffer::new(OBS_DIM, size, 0.99, 0.97);
        for i in 0..size {
            buffer
                .store(&obs(i as f32), i % 4, 1.0, 0.1 * i as f32, -1.0)
                .unwrap();
        }
        buffer.finish_trajectory(0.2);

        let batch = buffer.get().unwrap();
        assert_eq!(batch.len(), size);
        assert_eq!(batch.observations.len(), size * OBS_DIM);
        assert_eq!(&batch.observations[OBS_DIM..2 * OBS_DIM], &obs(1.0)[..]);
        assert_eq!(buffer.pointer(), 0);
        assert_eq!(buffer.trajectory_start(), 0);

        // Ready for the next epoch
        for _ in 0..size {
            buffer.store(&obs(9.0), 0, 0.0, 0.0, -1.0).unwrap();
        }
        assert!(buffer.is_full());
    }

    #[test]
    fn test_get_requires_finished_trajectory() {
        let mut buffer = RolloutBuffer::new(OBS_DIM, 3, 0.99, 0.97);
        buffer.store(&obs(0.0), 0, 1.0, 0.0, -1.0).unwrap();

        assert_eq!(
            buffer.get().unwrap_err(),
            BufferError::UnfinishedTrajectory {
                start: 0,
                pointer: 1
            }
        );
    }

    #[test]
    fn test_get_empty_buffer() {
        let mut buffer = RolloutBuffer::new(OBS_DIM, 3, 0.99, 0.97);
        assert_eq!(buffer.get().unwrap_err(), BufferError::Empty);
    }

    #[test]
    fn test_clear_discards_partial_epoch() {
        let mut buffer = RolloutBuffer::new(OBS_DIM, 3, 0.99, 0.97);
        buffer.store(&obs(0.0), 0, 1.0, 0.0, -1.0).unwrap();
        buffer.finish_trajectory(0.0);
        buffer.store(&obs(1.0), 1, 1.0, 0.0, -1.0).unwrap();

        buffer.clear();
        assert_eq!(buffer.pointer(), 0);
        assert_eq!(buffer.trajectory_start(), 0);
        assert_eq!(buffer.get().unwrap_err(), BufferError::Empty);

        for i in 0..3 {
            buffer.store(&obs(i as f32), 0, 1.0, 0.0, -1.0).unwrap();
        }
        buffer.finish_trajectory(0.0);
        assert_eq!(buffer.get().unwrap().len(), 3);
    }
}
