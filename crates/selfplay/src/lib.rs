//! Self-play training data generation for arbor.
//!
//! Games are played with the AlphaZero-style search from `arbor_mcts`, one
//! game per worker, against a shared evaluator. Every move yields a
//! [`TrainingExample`]; once a game ends its examples get TD(lambda) value
//! targets and can be written with an [`ExampleSink`].

pub mod config;
pub mod error;
pub mod example;
pub mod orchestrator;
pub mod sink;

pub use config::{ActionSelection, SelfPlayConfig};
pub use error::{Result, SelfPlayError};
pub use example::{backfill_td_lambda, TrainingExample};
pub use orchestrator::{GameFailure, GameRecord, SelfPlay, SelfPlayReport};
pub use sink::{ExampleSink, JsonLinesSink, MessagePackSink};
