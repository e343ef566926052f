//! Arbor Core - Game abstractions and common types
//!
//! This crate provides the [`GameState`] trait that any two-player,
//! zero-sum, perfect-information game implements to be searchable by
//! the arbor MCTS engines.
//!
//! # Types
//!
//! - [`GameState`] - Trait for immutable game states
//! - [`Player`] - The two seats of a game
//! - [`Policy`] - Probability distribution over actions (sums to 1.0)
//! - [`Value`] - Game value estimate in [-1, 1]

mod error;
mod game;
mod types;

pub use error::{ArborError, Result};
pub use game::{BoardEncoding, GameState, Player};
pub use types::{Policy, Value};
