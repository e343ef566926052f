use crate::Result;
use std::fmt::{self, Debug};
use std::hash::Hash;

/// Dense numeric board representation handed to evaluators.
pub type BoardEncoding = Vec<Vec<i32>>;

/// One of the two seats in a zero-sum game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Player {
    First,
    Second,
}

impl Player {
    /// Get the opposing player.
    pub fn opponent(self) -> Self {
        match self {
            Player::First => Player::Second,
            Player::Second => Player::First,
        }
    }

    /// Seat index: 0 for the first player, 1 for the second.
    pub fn index(self) -> usize {
        match self {
            Player::First => 0,
            Player::Second => 1,
        }
    }

    /// Player indicator used in evaluator requests and training data.
    pub fn sign(self) -> i32 {
        match self {
            Player::First => 1,
            Player::Second => -1,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::First => write!(f, "first"),
            Player::Second => write!(f, "second"),
        }
    }
}

/// An immutable game state searchable by MCTS.
///
/// States are values: [`apply`](GameState::apply) returns a new state and
/// never mutates the receiver. The trait is game-agnostic and covers any
/// two-player zero-sum game with perfect information.
pub trait GameState: Clone + Debug + Send + Sync {
    /// A game action. Actions are totally ordered so that child iteration,
    /// tie-breaks and distributions are deterministic.
    type Action: Copy + Eq + Ord + Hash + Debug + Send + Sync;

    /// Returns true if the game has ended.
    fn is_terminal(&self) -> bool;

    /// Legal actions from this state, without duplicates.
    /// Empty if and only if the state is terminal.
    fn legal_actions(&self) -> Vec<Self::Action>;

    /// The fixed global action space in ascending order.
    /// Always a superset of [`legal_actions`](GameState::legal_actions).
    fn all_actions(&self) -> Vec<Self::Action>;

    /// Applies an action, returning the successor state.
    fn apply(&self, action: Self::Action) -> Self;

    /// The player to move.
    fn current_player(&self) -> Player;

    /// Terminal reward from `player`'s perspective:
    /// `1.0` for a win, `-1.0` for a loss, `0.0` for a draw.
    ///
    /// # Errors
    /// Returns `ArborError::NotTerminal` if the game is still in progress.
    fn reward(&self, player: Player) -> Result<f32>;

    /// Upper bound on the number of plies left before the game must end.
    /// At least 1 for non-terminal states.
    fn max_remaining_plies(&self) -> usize;

    /// Dense 2D encoding of the board for evaluator input.
    fn encode_board(&self) -> BoardEncoding;

    /// Position of `action` within [`all_actions`](GameState::all_actions).
    fn action_index(&self, action: Self::Action) -> Option<usize> {
        self.all_actions().binary_search(&action).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_opponent() {
        assert_eq!(Player::First.opponent(), Player::Second);
        assert_eq!(Player::Second.opponent(), Player::First);
        assert_eq!(Player::First.opponent().opponent(), Player::First);
    }

    #[test]
    fn test_player_sign_and_index() {
        assert_eq!(Player::First.sign(), 1);
        assert_eq!(Player::Second.sign(), -1);
        assert_eq!(Player::First.index(), 0);
        assert_eq!(Player::Second.index(), 1);
    }
}
