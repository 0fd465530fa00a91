/// Unit move the player can request from the game server
///
/// The discriminant order is the action index used by the policy network, so it
/// must stay stable between training and inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Down,
    Up,
    Right,
    Left,
}

impl Direction {
    /// All moves in action-index order
    pub const ALL: [Direction; 4] = [
        Direction::Down,
        Direction::Up,
        Direction::Right,
        Direction::Left,
    ];

    /// Map a policy action index to a move
    pub fn from_index(index: usize) -> Option<Direction> {
        Self::ALL.get(index).copied()
    }

    /// Action index of this move
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Returns the delta (dx, dy) sent to the server for this move
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Down => (0, 1),
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Left => (-1, 0),
        }
    }
}

/// Number of discrete actions available to the agent
pub const NUM_ACTIONS: usize = Direction::ALL.len();
