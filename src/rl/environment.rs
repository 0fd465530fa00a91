use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand::seq::SliceRandom;

use crate::error::EnvError;
use crate::game::{Direction, GameConfig, GameServer, MoveOutcome, NUM_ACTIONS};

/// Result of one environment step
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Observation after the move; `None` once the episode is over
    pub observation: Option<Vec<f32>>,
    pub reward: f32,
    pub done: bool,
}

/// Episodic environment with a flat observation and discrete actions
pub trait Environment {
    /// Length of every observation vector
    fn observation_dim(&self) -> usize;

    /// Number of discrete actions accepted by [`Environment::step`]
    fn num_actions(&self) -> usize;

    /// Start a new episode
    fn reset(&mut self) -> Result<(), EnvError>;

    /// Current observation
    fn observe(&mut self) -> Result<Vec<f32>, EnvError>;

    /// Apply an action index
    fn step(&mut self, action: usize) -> Result<Step, EnvError>;
}

/// Survaillant game session exposed as an RL environment
///
/// Owns the running score so rewards can be reported as score deltas:
/// - rejected move: `invalid_move_reward`, episode continues
/// - game over: `game_over_reward`, episode ends
/// - accepted move: `totalScore - previous totalScore`, episode ends once the
///   server reports more than `max_turns` turns
pub struct GameEnvironment<S: GameServer> {
    server: S,
    config: GameConfig,
    rng: StdRng,
    previous_score: f64,
    current_map: Option<u32>,
}

impl<S: GameServer> GameEnvironment<S> {
    /// Create an environment; `seed` fixes the sequence of maps played
    pub fn new(server: S, config: GameConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            server,
            config,
            rng,
            previous_score: 0.0,
            current_map: None,
        }
    }

    /// Map of the running session, if any
    pub fn current_map(&self) -> Option<u32> {
        self.current_map
    }

    /// Cumulative score reported by the server so far this episode
    pub fn score(&self) -> f64 {
        self.previous_score
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: GameServer> Environment for GameEnvironment<S> {
    fn observation_dim(&self) -> usize {
        self.config.observation_dim()
    }

    fn num_actions(&self) -> usize {
        NUM_ACTIONS
    }

    fn reset(&mut self) -> Result<(), EnvError> {
        let map_id = *self
            .config
            .map_ids
            .choose(&mut self.rng)
            .ok_or_else(|| EnvError::Config("map_ids is empty".to_string()))?;
        debug!("starting a new game on map {}", map_id);

        self.server.create_game(map_id)?;
        self.current_map = Some(map_id);
        self.previous_score = 0.0;
        Ok(())
    }

    fn observe(&mut self) -> Result<Vec<f32>, EnvError> {
        let observation = self.server.flashlight(self.config.flashlight_radius)?;
        let expected = self.observation_dim();
        if observation.len() != expected {
            return Err(EnvError::Schema {
                endpoint: "getGameSate/flashLight".to_string(),
                message: format!(
                    "observation has {} values, expected {}",
                    observation.len(),
                    expected
                ),
            });
        }
        Ok(observation)
    }

    fn step(&mut self, action: usize) -> Result<Step, EnvError> {
        let direction = Direction::from_index(action).ok_or(EnvError::InvalidAction(action))?;

        let (reward, done) = match self.server.move_player(direction)? {
            MoveOutcome::Invalid => (self.config.invalid_move_reward, false),
            MoveOutcome::GameOver => (self.config.game_over_reward, true),
            MoveOutcome::Moved(scores) => {
                let reward = (scores.total_score - self.previous_score) as f32;
                self.previous_score = scores.total_score;
                (reward, scores.nb_turn > self.config.max_turns)
            }
        };

        let observation = if done { None } else { Some(self.observe()?) };

        Ok(Step {
            observation,
            reward,
            done,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Scores;
    use std::collections::VecDeque;

    /// Game server replaying a fixed list of move outcomes
    struct ScriptedServer {
        outcomes: VecDeque<MoveOutcome>,
        observation_len: usize,
        created: Vec<u32>,
        moves: Vec<Direction>,
        observations_served: usize,
    }

    impl ScriptedServer {
        fn new(outcomes: Vec<MoveOutcome>, observation_len: usize) -> Self {
            Self {
                outcomes: outcomes.into(),
                observation_len,
                created: Vec::new(),
                moves: Vec::new(),
                observations_served: 0,
            }
        }
    }

    impl GameServer for ScriptedServer {
        fn create_game(&mut self, map_id: u32) -> Result<(), EnvError> {
            self.created.push(map_id);
            Ok(())
        }

        fn flashlight(&mut self, _radius: usize) -> Result<Vec<f32>, EnvError> {
            self.observations_served += 1;
            Ok(vec![0.5; self.observation_len])
        }

        fn move_player(&mut self, direction: Direction) -> Result<MoveOutcome, EnvError> {
            self.moves.push(direction);
            self.outcomes.pop_front().ok_or(EnvError::Status {
                endpoint: "movePlayer".to_string(),
                status: 500,
            })
        }

        fn scores(&mut self) -> Result<Scores, EnvError> {
            Ok(Scores {
                total_score: 0.0,
                nb_turn: 0,
            })
        }
    }

    fn moved(total_score: f64, nb_turn: u32) -> MoveOutcome {
        MoveOutcome::Moved(Scores {
            total_score,
            nb_turn,
        })
    }

    fn env(outcomes: Vec<MoveOutcome>) -> GameEnvironment<ScriptedServer> {
        let config = GameConfig::default();
        let server = ScriptedServer::new(outcomes, config.observation_dim());
        GameEnvironment::new(server, config, Some(11))
    }

    #[test]
    fn test_reset_picks_configured_map() {
        let mut env = env(vec![]);
        for _ in 0..20 {
            env.reset().unwrap();
            assert!(env.current_map().unwrap() <= 4);
        }
        assert_eq!(env.server().created.len(), 20);
    }

    #[test]
    fn test_reset_without_maps() {
        let config = GameConfig {
            map_ids: vec![],
            ..Default::default()
        };
        let mut env = GameEnvironment::new(ScriptedServer::new(vec![], 245), config, Some(0));
        assert!(matches!(env.reset().unwrap_err(), EnvError::Config(_)));
    }

    #[test]
    fn test_observe_checks_length() {
        let mut env = env(vec![]);
        assert_eq!(env.observe().unwrap().len(), 245);

        let mut short = GameEnvironment::new(
            ScriptedServer::new(vec![], 10),
            GameConfig::default(),
            Some(0),
        );
        assert!(matches!(
            short.observe().unwrap_err(),
            EnvError::Schema { .. }
        ));
    }

    #[test]
    fn test_bad_movement_penalty() {
        let mut env = env(vec![MoveOutcome::Invalid]);
        env.reset().unwrap();

        let step = env.step(0).unwrap();
        assert_eq!(step.reward, -3.0);
        assert!(!step.done);
        assert!(step.observation.is_some());
        assert_eq!(env.server().moves, vec![Direction::Down]);
    }

    #[test]
    fn test_game_over_penalty() {
        let mut env = env(vec![MoveOutcome::GameOver]);
        env.reset().unwrap();

        let step = env.step(3).unwrap();
        assert_eq!(step.reward, -10.0);
        assert!(step.done);
        assert!(step.observation.is_none());
        assert_eq!(env.server().observations_served, 0);
    }

    #[test]
    fn test_score_delta_reward() {
        let mut env = env(vec![moved(1.0, 1), moved(1.0, 2), moved(4.5, 3)]);
        env.reset().unwrap();

        assert_eq!(env.step(1).unwrap().reward, 1.0);
        assert_eq!(env.step(1).unwrap().reward, 0.0);
        assert_eq!(env.step(2).unwrap().reward, 3.5);
        assert_eq!(env.score(), 4.5);
    }

    #[test]
    fn test_reset_clears_running_score() {
        let mut env = env(vec![moved(5.0, 1), moved(2.0, 1)]);
        env.reset().unwrap();
        env.step(0).unwrap();

        env.reset().unwrap();
        assert_eq!(env.score(), 0.0);
        assert_eq!(env.step(0).unwrap().reward, 2.0);
    }

    #[test]
    fn test_turn_limit_ends_episode() {
        let mut env = env(vec![moved(0.0, 50), moved(0.0, 51)]);
        env.reset().unwrap();

        assert!(!env.step(0).unwrap().done);
        let last = env.step(0).unwrap();
        assert!(last.done);
        assert!(last.observation.is_none());
    }

    #[test]
    fn test_invalid_action_index() {
        let mut env = env(vec![]);
        env.reset().unwrap();
        assert!(matches!(
            env.step(4).unwrap_err(),
            EnvError::InvalidAction(4)
        ));
        assert!(env.server().moves.is_empty());
    }

    #[test]
    fn test_seeded_map_sequence_is_reproducible() {
        let mut a = env(vec![]);
        let mut b = env(vec![]);
        for _ in 0..10 {
            a.reset().unwrap();
            b.reset().unwrap();
            assert_eq!(a.current_map(), b.current_map());
        }
    }
}
