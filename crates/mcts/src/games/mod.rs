//! Small reference games for exercising the searches.
//!
//! Tic-tac-toe is solved (perfect play draws), which makes it a good
//! check that search never loses. Countdown is a forced line with a known
//! winner, useful for checking signs and exhaustion.

pub mod countdown;
pub mod tictactoe;

pub use countdown::{Countdown, Tick};
pub use tictactoe::{Mark, TicTacToeAction, TicTacToeState};
