//! Evaluation abstraction for MCTS.
//!
//! The `Evaluator` trait lets the AlphaZero-style search swap between
//! in-process strategies and a remote inference service:
//! - `UniformEvaluator`: uniform priors, neutral value
//! - `RolloutEvaluator`: uniform priors, random playout value
//! - `arbor_inference::RemoteEvaluator`: policy/value from a network service

use arbor_core::GameState;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by an evaluator call.
#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("Evaluator I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Evaluator rejected the request: {0}")]
    Rejected(String),

    #[error("Malformed evaluator response: {0}")]
    Malformed(String),

    #[error("Cannot evaluate state: {0}")]
    InvalidState(String),
}

/// Evaluation result: prior policy + value estimate.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    /// Prior probability for each entry of `state.all_actions()`.
    pub policy: Vec<f32>,

    /// Value estimate in [-1, 1] from the perspective of the player to move.
    pub value: f32,
}

/// Trait for evaluating game positions.
///
/// Evaluators are shared between concurrent self-play workers, so they
/// must be `Send + Sync` and treat each call independently.
pub trait Evaluator<S: GameState>: Send + Sync {
    /// Evaluate a non-terminal position.
    fn evaluate(&self, state: &S) -> Result<Evaluation, EvaluatorError>;
}

impl<S: GameState, E: Evaluator<S> + ?Sized> Evaluator<S> for &E {
    fn evaluate(&self, state: &S) -> Result<Evaluation, EvaluatorError> {
        (**self).evaluate(state)
    }
}

impl<S: GameState, E: Evaluator<S> + ?Sized> Evaluator<S> for Arc<E> {
    fn evaluate(&self, state: &S) -> Result<Evaluation, EvaluatorError> {
        (**self).evaluate(state)
    }
}

/// Uniform distribution over the legal actions, zero elsewhere.
fn uniform_legal_policy<S: GameState>(state: &S) -> Result<Vec<f32>, EvaluatorError> {
    let legal = state.legal_actions();
    if state.is_terminal() || legal.is_empty() {
        return Err(EvaluatorError::InvalidState(
            "terminal states have no policy".to_string(),
        ));
    }
    let mut policy = vec![0.0; state.all_actions().len()];
    let prior = 1.0 / legal.len() as f32;
    for action in legal {
        if let Some(i) = state.action_index(action) {
            policy[i] = prior;
        }
    }
    Ok(policy)
}

/// Uniform prior over legal actions and a neutral value.
///
/// Useful as a stand-in network: search then behaves like PUCT over
/// ground-truth terminal rewards only.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformEvaluator;

impl<S: GameState> Evaluator<S> for UniformEvaluator {
    fn evaluate(&self, state: &S) -> Result<Evaluation, EvaluatorError> {
        Ok(Evaluation {
            policy: uniform_legal_policy(state)?,
            value: 0.0,
        })
    }
}

/// Evaluator using uniform prior and random rollouts.
///
/// - Policy: uniform distribution over legal actions
/// - Value: result of a random playout from the position
///
/// Each playout draws from a generator seeded by the evaluator seed and
/// the position, so a shared evaluator gives the same answers whichever
/// worker asks and in whatever order.
#[derive(Clone, Copy, Debug)]
pub struct RolloutEvaluator {
    seed: u64,

    /// Maximum moves in a random playout; unfinished playouts score 0.
    max_rollout_depth: usize,
}

impl RolloutEvaluator {
    pub fn new(seed: u64, max_rollout_depth: usize) -> Self {
        Self {
            seed,
            max_rollout_depth,
        }
    }

    fn rng_for<S: GameState>(&self, state: &S) -> ChaCha8Rng {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        state.encode_board().hash(&mut hasher);
        state.current_player().hash(&mut hasher);
        ChaCha8Rng::seed_from_u64(hasher.finish())
    }

    /// Random playout, scored for the player to move at `initial`.
    fn rollout<S: GameState>(&self, initial: &S) -> Result<f32, EvaluatorError> {
        let perspective = initial.current_player();
        let mut rng = self.rng_for(initial);
        let mut state = initial.clone();
        let mut depth = 0;

        while !state.is_terminal() && depth < self.max_rollout_depth {
            let legal = state.legal_actions();
            if legal.is_empty() {
                return Err(EvaluatorError::InvalidState(
                    "non-terminal state without legal actions".to_string(),
                ));
            }
            state = state.apply(legal[rng.gen_range(0..legal.len())]);
            depth += 1;
        }

        if state.is_terminal() {
            state
                .reward(perspective)
                .map_err(|e| EvaluatorError::InvalidState(e.to_string()))
        } else {
            Ok(0.0)
        }
    }
}

impl<S: GameState> Evaluator<S> for RolloutEvaluator {
    fn evaluate(&self, state: &S) -> Result<Evaluation, EvaluatorError> {
        Ok(Evaluation {
            policy: uniform_legal_policy(state)?,
            value: self.rollout(state)?,
        })
    }
}
