//! A forced line of fixed length.
//!
//! Each turn has exactly one legal action. The player who makes the last
//! move wins, so the result of any position is known in advance.

use arbor_core::{ArborError, BoardEncoding, GameState, Player, Result};

/// The only action in [`Countdown`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Tick;

#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct Countdown {
    remaining: usize,
    current: Player,
}

impl Countdown {
    /// A line of `plies` moves with the first player to move.
    pub fn new(plies: usize) -> Self {
        Self {
            remaining: plies,
            current: Player::First,
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl GameState for Countdown {
    type Action = Tick;

    fn is_terminal(&self) -> bool {
        self.remaining == 0
    }

    fn legal_actions(&self) -> Vec<Tick> {
        if self.is_terminal() {
            Vec::new()
        } else {
            vec![Tick]
        }
    }

    fn all_actions(&self) -> Vec<Tick> {
        vec![Tick]
    }

    fn apply(&self, _action: Tick) -> Self {
        Self {
            remaining: self.remaining.saturating_sub(1),
            current: self.current.opponent(),
        }
    }

    fn current_player(&self) -> Player {
        self.current
    }

    fn reward(&self, player: Player) -> Result<f32> {
        if !self.is_terminal() {
            return Err(ArborError::NotTerminal);
        }
        // The player to move at the end did not make the last move.
        Ok(if player == self.current { -1.0 } else { 1.0 })
    }

    fn max_remaining_plies(&self) -> usize {
        self.remaining
    }

    fn encode_board(&self) -> BoardEncoding {
        vec![vec![self.remaining as i32, self.current.sign()]]
    }
}
