//! Shared search plumbing: errors, budgets and results.
//!
//! The three drivers live in [`crate::uct`], [`crate::heuristic`] and
//! [`crate::alphazero`]; each returns a [`SearchResult`].

use crate::backprop::backpropagate;
use crate::config::MctsConfig;
use crate::evaluator::EvaluatorError;
use crate::node::NodeId;
use crate::tree::Tree;
use arbor_core::{ArborError, GameState, Policy};
use rand::Rng;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that abort a search run.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Corrupt search tree: {0}")]
    CorruptTree(String),

    #[error("Invalid prior {probability} for action {action}")]
    InvalidPrior { action: String, probability: f32 },

    #[error("Cannot search from a terminal state")]
    TerminalRoot,

    #[error(transparent)]
    Game(#[from] ArborError),

    #[error("Evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),
}

/// Iteration and wall-clock limits for one search.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Budget {
    pub(crate) start: Instant,
    deadline: Option<Instant>,
}

impl Budget {
    pub(crate) fn start(config: &MctsConfig) -> Self {
        let start = Instant::now();
        Self {
            start,
            deadline: config.time_budget.map(|budget| start + budget),
        }
    }

    pub(crate) fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Handle a node where selection found nothing to descend into.
///
/// A node with children that are all closed is itself exhausted; a node
/// without children at this point breaks the tree's invariants.
pub(crate) fn close_exhausted<S: GameState>(
    tree: &Tree<S>,
    id: NodeId,
    visit_threshold: u32,
) -> Result<(), SearchError> {
    if tree.get(id).num_children() == 0 {
        return Err(SearchError::CorruptTree(format!(
            "node {} is expanded but has no children",
            id.index()
        )));
    }
    if !tree.mark_exhausted(id, visit_threshold) {
        // Still under the visit threshold: count the pass as a visit at the
        // node's current mean so the gate is eventually met.
        let mean = tree.get(id).stats().mean_value();
        backpropagate(tree, id, mean);
        tree.refresh_exploration(id, visit_threshold);
    }
    Ok(())
}

/// Result of an MCTS search.
#[derive(Debug)]
pub struct SearchResult<S: GameState> {
    tree: Tree<S>,
    iterations: usize,
    elapsed: Duration,
}

impl<S: GameState> SearchResult<S> {
    pub(crate) fn new(tree: Tree<S>, iterations: usize, elapsed: Duration) -> Self {
        Self {
            tree,
            iterations,
            elapsed,
        }
    }

    /// The searched tree, rooted at the searched state.
    pub fn tree(&self) -> &Tree<S> {
        &self.tree
    }

    /// Iterations actually run (fewer than budgeted if the deadline passed
    /// or the root was fully explored).
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn root_visits(&self) -> u32 {
        self.tree.root().stats().visit_count
    }

    /// True if every line below the root has been closed.
    pub fn is_exhausted(&self) -> bool {
        self.tree.root().is_fully_explored()
    }

    /// Visit count for each expanded root action.
    pub fn visit_counts(&self) -> Vec<(S::Action, u32)> {
        self.tree.visit_counts(NodeId::ROOT)
    }

    /// Best root action: an immediate win if one was expanded, otherwise
    /// the most visited child, ties broken by higher mean value.
    pub fn best_action(&self) -> Option<S::Action> {
        self.tree.best_action(NodeId::ROOT)
    }

    /// Temperature-scaled visit distribution over the global action space.
    pub fn distribution(&self, temperature: f32) -> Vec<f32> {
        self.tree.visit_distribution(NodeId::ROOT, temperature)
    }

    /// The distribution as a typed Policy (enforces sum to 1.0).
    pub fn typed_policy(&self, temperature: f32) -> arbor_core::Result<Policy> {
        Policy::new(self.distribution(temperature))
    }

    /// Root value from the perspective of the player to move at the root.
    pub fn root_value(&self) -> f32 {
        self.tree.root_value(NodeId::ROOT)
    }

    /// Sample an action from the temperature-scaled distribution.
    pub fn select_action<R: Rng + ?Sized>(&self, temperature: f32, rng: &mut R) -> Option<S::Action> {
        let distribution = self.distribution(temperature);
        let all_actions = self.tree.root().state().all_actions();

        let threshold: f32 = rng.gen::<f32>() * distribution.iter().sum::<f32>();
        let mut cumulative = 0.0;
        let mut last_candidate = None;
        for (action, p) in all_actions.iter().zip(&distribution) {
            if *p <= 0.0 {
                continue;
            }
            cumulative += p;
            last_candidate = Some(*action);
            if cumulative >= threshold {
                return Some(*action);
            }
        }
        last_candidate
    }
}
