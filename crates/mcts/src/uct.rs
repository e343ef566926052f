//! Baseline UCT search.
//!
//! One untried action is expanded per iteration and scored with a random
//! playout whose reward is shaped by playout depth. Terminal children are
//! closed as soon as they are created, so search stops early once every
//! line from the root is decided.

use crate::backprop::backpropagate;
use crate::config::MctsConfig;
use crate::node::NodeId;
use crate::rollout::random_rollout;
use crate::search::{close_exhausted, Budget, SearchError, SearchResult};
use crate::selection::{select_child, Uct};
use crate::tree::Tree;
use arbor_core::GameState;
use rand::Rng;
use tracing::{debug, trace};

/// Baseline Monte Carlo Tree Search with UCT selection.
pub struct Mcts<R: Rng> {
    config: MctsConfig,
    rng: R,
}

impl<R: Rng> Mcts<R> {
    pub fn new(config: MctsConfig, rng: R) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &MctsConfig {
        &self.config
    }

    /// Run a search from `state` with a fresh tree.
    ///
    /// # Errors
    /// `SearchError::TerminalRoot` for a finished game; any game or tree
    /// error raised during an iteration aborts the search.
    pub fn search<S: GameState>(&mut self, state: &S) -> Result<SearchResult<S>, SearchError> {
        if state.is_terminal() {
            return Err(SearchError::TerminalRoot);
        }

        let budget = Budget::start(&self.config);
        let tree = Tree::new(state.clone());
        let policy = Uct {
            exploration_weight: self.config.exploration_weight,
        };

        let mut iterations = 0;
        while iterations < self.config.num_iterations && !budget.expired() {
            if tree.root().is_fully_explored() {
                break;
            }
            self.iterate(&tree, &policy)?;
            iterations += 1;
        }

        debug!(
            iterations,
            nodes = tree.len(),
            root_visits = tree.root().stats().visit_count,
            exhausted = tree.root().is_fully_explored(),
            "uct search finished"
        );
        Ok(SearchResult::new(tree, iterations, budget.start.elapsed()))
    }

    /// Search and return the best root action (see [`Tree::best_action`]).
    pub fn best_action<S: GameState>(&mut self, state: &S) -> Result<S::Action, SearchError> {
        self.search(state)?
            .best_action()
            .ok_or_else(|| SearchError::CorruptTree("searched root has no children".to_string()))
    }

    /// One iteration: select -> expand -> simulate -> backpropagate.
    fn iterate<S: GameState>(&mut self, tree: &Tree<S>, policy: &Uct) -> Result<(), SearchError> {
        let threshold = self.config.visit_threshold;

        let mut id = NodeId::ROOT;
        loop {
            let node = tree.get(id);
            if node.is_terminal() || !node.is_fully_expanded() {
                break;
            }
            match select_child(tree, id, policy) {
                Some((_, child)) => id = child,
                None => return close_exhausted(tree, id, threshold),
            }
        }

        let leaf = if tree.get(id).is_terminal() {
            id
        } else {
            tree.expand_uniform(id, threshold).ok_or_else(|| {
                SearchError::CorruptTree(format!("node {} has no action left to expand", id.index()))
            })?
        };

        let node = tree.get(leaf);
        // Stored from the perspective of the player who moved into the leaf.
        let mover = node.state().current_player().opponent();
        let reward = random_rollout(node.state(), mover, &mut self.rng)?;
        backpropagate(tree, leaf, reward);

        trace!(leaf = leaf.index(), reward, "uct iteration");
        Ok(())
    }
}
