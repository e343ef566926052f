//! AlphaZero-style search: PUCT selection over evaluator priors.
//!
//! A leaf is evaluated once. Its policy becomes the priors of all of its
//! children and its value, negated into the perspective of the player who
//! moved in, is backpropagated. Terminal leaves use the game's own reward.

use crate::backprop::backpropagate;
use crate::config::MctsConfig;
use crate::evaluator::Evaluator;
use crate::node::NodeId;
use crate::search::{close_exhausted, Budget, SearchError, SearchResult};
use crate::selection::{select_child, Puct};
use crate::tree::{legal_priors, Tree};
use arbor_core::{ArborError, GameState, Value};
use rand::Rng;
use rand_distr::{Dirichlet, Distribution};
use tracing::{debug, trace};

/// Monte Carlo Tree Search guided by a policy/value evaluator.
pub struct AlphaZeroMcts<E, R: Rng> {
    config: MctsConfig,
    evaluator: E,
    rng: R,
}

impl<E, R: Rng> AlphaZeroMcts<E, R> {
    pub fn new(config: MctsConfig, evaluator: E, rng: R) -> Self {
        Self {
            config,
            evaluator,
            rng,
        }
    }

    pub fn config(&self) -> &MctsConfig {
        &self.config
    }

    /// Run a search from `state` with a fresh tree.
    ///
    /// # Errors
    /// Evaluator failures, malformed priors and out-of-range values abort
    /// the search; nothing is retried.
    pub fn search<S>(&mut self, state: &S) -> Result<SearchResult<S>, SearchError>
    where
        S: GameState,
        E: Evaluator<S>,
    {
        if state.is_terminal() {
            return Err(SearchError::TerminalRoot);
        }

        let budget = Budget::start(&self.config);
        let tree = Tree::new(state.clone());
        let policy = Puct {
            c_puct: self.config.c_puct,
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
            "alphazero search finished"
        );
        Ok(SearchResult::new(tree, iterations, budget.start.elapsed()))
    }

    /// Search and return the best root action (see [`Tree::best_action`]).
    pub fn best_action<S>(&mut self, state: &S) -> Result<S::Action, SearchError>
    where
        S: GameState,
        E: Evaluator<S>,
    {
        self.search(state)?
            .best_action()
            .ok_or_else(|| SearchError::CorruptTree("searched root has no children".to_string()))
    }

    fn iterate<S>(&mut self, tree: &Tree<S>, policy: &Puct) -> Result<(), SearchError>
    where
        S: GameState,
        E: Evaluator<S>,
    {
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

        let node = tree.get(id);
        let value = if node.is_terminal() {
            node.state().reward(node.state().current_player().opponent())?
        } else {
            // No node lock is held across the evaluator call.
            let evaluation = self.evaluator.evaluate(node.state())?;
            let value = Value::new(evaluation.value)?;
            if node.num_children() == 0 {
                let mut priors = legal_priors(node.state(), node.legal_actions(), &evaluation.policy)?;
                if id == NodeId::ROOT {
                    self.mix_root_noise(&mut priors)?;
                }
                tree.attach_children(id, priors, threshold);
            }
            value.negate().get()
        };

        backpropagate(tree, id, value);
        if node.is_terminal() {
            tree.refresh_exploration(id, threshold);
        }

        trace!(leaf = id.index(), value, "alphazero iteration");
        Ok(())
    }

    /// Blend Dirichlet noise into the root priors when configured.
    fn mix_root_noise<A>(&mut self, priors: &mut [(A, f32)]) -> Result<(), SearchError> {
        let eps = self.config.exploration_fraction;
        if eps <= 0.0 || priors.len() < 2 {
            return Ok(());
        }

        let alpha = vec![self.config.dirichlet_alpha; priors.len()];
        let dirichlet = Dirichlet::new(&alpha)
            .map_err(|e| ArborError::InvalidPolicy(format!("dirichlet noise: {e}")))?;
        let noise: Vec<f32> = dirichlet.sample(&mut self.rng);

        for ((_, prior), n) in priors.iter_mut().zip(noise) {
            *prior = (1.0 - eps) * *prior + eps * n;
        }
        Ok(())
    }
}
