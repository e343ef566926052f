//! Heuristic MCTS with virtual loss.
//!
//! Iterations run concurrently on the rayon pool against one shared tree.
//! Each iteration adds virtual loss to every node it enters so that
//! parallel descents spread out, scores its leaf with a win/block-biased
//! playout and backpropagates under per-node locks.

use crate::backprop::{apply_virtual_loss, backpropagate_virtual, release_virtual_loss};
use crate::config::{MctsConfig, VirtualLossMode};
use crate::node::NodeId;
use crate::rollout::heuristic_rollout;
use crate::search::{close_exhausted, Budget, SearchError, SearchResult};
use crate::selection::{select_child, VirtualLossUct};
use crate::tree::{Tree, ValuePerspective};
use arbor_core::GameState;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

/// Concurrent MCTS with heuristic playouts, virtual loss and progressive
/// widening.
///
/// Node values are stored from the perspective of the player to move at
/// the node; selection negates them.
pub struct HeuristicMcts {
    config: MctsConfig,
    seed: u64,
}

impl HeuristicMcts {
    pub fn new(config: MctsConfig, seed: u64) -> Self {
        Self { config, seed }
    }

    pub fn config(&self) -> &MctsConfig {
        &self.config
    }

    /// Run a search from `state`.
    ///
    /// Each iteration draws from its own generator seeded from the search
    /// seed and the iteration index. The tree shape still depends on thread
    /// interleaving.
    pub fn search<S: GameState>(&self, state: &S) -> Result<SearchResult<S>, SearchError> {
        if state.is_terminal() {
            return Err(SearchError::TerminalRoot);
        }

        let budget = Budget::start(&self.config);
        let tree = Tree::with_perspective(state.clone(), ValuePerspective::PlayerToMove);
        let policy = VirtualLossUct {
            exploration_weight: self.config.exploration_weight,
            widening_coefficient: self.config.widening_coefficient,
        };
        let completed = AtomicUsize::new(0);

        (0..self.config.num_iterations)
            .into_par_iter()
            .try_for_each(|i| {
                if budget.expired() || tree.root().is_fully_explored() {
                    return Ok(());
                }
                let mut rng = ChaCha8Rng::seed_from_u64(iteration_seed(self.seed, i));
                self.iterate(&tree, &policy, &mut rng)?;
                completed.fetch_add(1, Ordering::Relaxed);
                Ok::<(), SearchError>(())
            })?;

        let iterations = completed.into_inner();
        debug!(
            iterations,
            nodes = tree.len(),
            root_visits = tree.root().stats().visit_count,
            exhausted = tree.root().is_fully_explored(),
            "heuristic search finished"
        );
        Ok(SearchResult::new(tree, iterations, budget.start.elapsed()))
    }

    /// Search and return the best root action (see [`Tree::best_action`]).
    pub fn best_action<S: GameState>(&self, state: &S) -> Result<S::Action, SearchError> {
        self.search(state)?
            .best_action()
            .ok_or_else(|| SearchError::CorruptTree("searched root has no children".to_string()))
    }

    fn iterate<S: GameState>(
        &self,
        tree: &Tree<S>,
        policy: &VirtualLossUct,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), SearchError> {
        let threshold = self.config.visit_threshold;
        let penalty = self.config.virtual_loss;
        let mode = self.config.virtual_loss_mode;

        let mut id = NodeId::ROOT;
        apply_virtual_loss(tree, id, penalty);
        loop {
            let node = tree.get(id);
            if node.is_terminal() {
                break;
            }
            if !node.is_fully_expanded() {
                // Another iteration may take the last untried action first.
                if let Some(child) = tree.expand_uniform(id, threshold) {
                    id = child;
                    apply_virtual_loss(tree, id, penalty);
                    break;
                }
            }
            match select_child(tree, id, policy) {
                Some((_, child)) => {
                    id = child;
                    apply_virtual_loss(tree, id, penalty);
                }
                None => {
                    if mode == VirtualLossMode::Compensated {
                        release_virtual_loss(tree, id, penalty);
                    }
                    return close_exhausted(tree, id, threshold);
                }
            }
        }

        let node = tree.get(id);
        let to_move = node.state().current_player();
        let reward = heuristic_rollout(node.state(), to_move, self.config.heuristic_depth, rng)?;
        backpropagate_virtual(tree, id, reward, penalty, mode);

        trace!(leaf = id.index(), reward, "heuristic iteration");
        Ok(())
    }
}

fn iteration_seed(seed: u64, iteration: usize) -> u64 {
    seed ^ (iteration as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
