//! Remote policy/value evaluation for arbor search.
//!
//! [`RemoteEvaluator`] implements [`arbor_mcts::Evaluator`] for any game by
//! posting the encoded board to an HTTP inference service and reading back
//! a policy over the game's full action space and a value for the player to
//! move. The same client pushes training batches and asks the service to
//! reload its model. The bodies are described in [`protocol`].

pub mod client;
pub mod protocol;

pub use client::{RemoteConfig, RemoteEvaluator};
pub use protocol::{PredictReply, PredictRequest};
