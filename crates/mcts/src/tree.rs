//! Arena-allocated MCTS tree.
//!
//! Nodes are stored in a growable vector and referenced by [`NodeId`]. The
//! arena itself is only write-locked while a node is appended; everything
//! else locks per node, so a tree can be shared across threads.

use crate::node::{Node, NodeId, NodeStats};
use crate::search::SearchError;
use arbor_core::{ArborError, GameState, Policy};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Temperatures at or below this collapse the visit distribution to a
/// one-hot on the best action.
pub const MIN_TEMPERATURE: f32 = 1e-3;

/// Whose point of view a node's `value_sum` is recorded from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ValuePerspective {
    /// The player whose move led into the node. Parents maximize it directly.
    #[default]
    PlayerWhoMoved,

    /// The player to move at the node. Parents maximize its negation.
    PlayerToMove,
}

/// Arena-allocated MCTS tree rooted at a single game state.
#[derive(Debug)]
pub struct Tree<S: GameState> {
    nodes: RwLock<Vec<Arc<Node<S>>>>,
    perspective: ValuePerspective,
}

impl<S: GameState> Tree<S> {
    /// Create a tree holding only a root for `state`.
    pub fn new(state: S) -> Self {
        Self::with_perspective(state, ValuePerspective::default())
    }

    pub fn with_perspective(state: S, perspective: ValuePerspective) -> Self {
        Self {
            nodes: RwLock::new(vec![Arc::new(Node::new(state, None, None))]),
            perspective,
        }
    }

    /// Get a node by ID.
    ///
    /// # Panics
    /// Panics if the NodeId did not come from this tree.
    pub fn get(&self, id: NodeId) -> Arc<Node<S>> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&nodes[id.0])
    }

    pub fn root(&self) -> Arc<Node<S>> {
        self.get(NodeId::ROOT)
    }

    /// Number of nodes in the tree (never zero).
    pub fn len(&self) -> usize {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, node: Node<S>) -> NodeId {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        let id = NodeId(nodes.len());
        nodes.push(Arc::new(node));
        id
    }

    /// Expand the first legal action that has no child yet.
    ///
    /// Returns `None` if the node is terminal or already fully expanded.
    /// A terminal child is immediately checked for full exploration.
    pub fn expand_uniform(&self, id: NodeId, visit_threshold: u32) -> Option<NodeId> {
        let node = self.get(id);
        if node.is_terminal() {
            return None;
        }

        let child_id = {
            let mut children = node.children_mut();
            let action = node
                .legal_actions()
                .iter()
                .copied()
                .find(|a| !children.contains_key(a))?;
            let state = node.state().apply(action);
            let child_id = self.push(Node::new(state, Some(id), Some(action)));
            children.insert(action, child_id);
            child_id
        };

        self.refresh_exploration(child_id, visit_threshold);
        Some(child_id)
    }

    /// Expand every legal action at once, annotated with priors taken from
    /// `policy` (indexed like `all_actions`).
    ///
    /// Returns the number of children created.
    ///
    /// # Errors
    /// - `SearchError::InvalidPrior` if any probability is outside [0, 1]
    /// - `ArborError::InvalidPolicy` if `policy` has the wrong length
    pub fn expand_with_priors(
        &self,
        id: NodeId,
        policy: &[f32],
        visit_threshold: u32,
    ) -> Result<usize, SearchError> {
        let node = self.get(id);
        if node.is_terminal() {
            return Ok(0);
        }
        let priors = legal_priors(node.state(), node.legal_actions(), policy)?;
        Ok(self.attach_children(id, priors, visit_threshold))
    }

    /// Create children for the given (action, prior) pairs and record the
    /// priors on the node. Existing children are kept.
    pub(crate) fn attach_children(
        &self,
        id: NodeId,
        priors: Vec<(S::Action, f32)>,
        visit_threshold: u32,
    ) -> usize {
        let node = self.get(id);
        node.set_priors(priors.iter().copied().collect::<BTreeMap<_, _>>());

        let mut created = Vec::new();
        {
            let mut children = node.children_mut();
            for (action, _) in &priors {
                if children.contains_key(action) {
                    continue;
                }
                let state = node.state().apply(*action);
                let child_id = self.push(Node::new(state, Some(id), Some(*action)));
                children.insert(*action, child_id);
                created.push(child_id);
            }
        }

        for child_id in &created {
            self.refresh_exploration(*child_id, visit_threshold);
        }
        created.len()
    }

    /// Re-evaluate full exploration at `id` and, each time a node flips,
    /// at its parent.
    pub fn refresh_exploration(&self, id: NodeId, visit_threshold: u32) {
        let mut current = Some(id);
        while let Some(id) = current {
            let node = self.get(id);
            if node.is_fully_explored() || !self.is_exhausted(&node, visit_threshold) {
                return;
            }
            if !node.mark_fully_explored() {
                return;
            }
            current = node.parent();
        }
    }

    /// Mark a node whose children are all unselectable, then propagate.
    ///
    /// Returns `false` and leaves the node open while it has fewer than
    /// `visit_threshold` visits.
    pub fn mark_exhausted(&self, id: NodeId, visit_threshold: u32) -> bool {
        let node = self.get(id);
        if node.stats().visit_count < visit_threshold {
            return false;
        }
        node.mark_fully_explored();
        if let Some(parent) = node.parent() {
            self.refresh_exploration(parent, visit_threshold);
        }
        true
    }

    fn is_exhausted(&self, node: &Node<S>, visit_threshold: u32) -> bool {
        if node.stats().visit_count < visit_threshold {
            return false;
        }
        if node.is_terminal() {
            return true;
        }
        if !node.is_fully_expanded() {
            return false;
        }
        let children = node.children();
        !children.is_empty()
            && children
                .iter()
                .all(|(_, child)| self.get(*child).is_fully_explored())
    }

    /// Child statistics of `id` in ascending action order.
    pub fn child_stats(&self, id: NodeId) -> Vec<(S::Action, NodeStats)> {
        self.get(id)
            .children()
            .into_iter()
            .map(|(action, child)| (action, self.get(child).stats()))
            .collect()
    }

    pub fn visit_counts(&self, id: NodeId) -> Vec<(S::Action, u32)> {
        self.child_stats(id)
            .into_iter()
            .map(|(action, stats)| (action, stats.visit_count))
            .collect()
    }

    /// A child's mean value as seen by the player choosing at its parent.
    pub fn parent_view(&self, stats: &NodeStats) -> f32 {
        match self.perspective {
            ValuePerspective::PlayerWhoMoved => stats.mean_value(),
            ValuePerspective::PlayerToMove => -stats.mean_value(),
        }
    }

    /// Preferred child action.
    ///
    /// A child that ends the game in a win for the player to move is
    /// decided and comes first, however few visits it has. Otherwise the
    /// most visited child wins; ties go to the higher mean value, then to
    /// the lower action.
    pub fn best_action(&self, id: NodeId) -> Option<S::Action> {
        let node = self.get(id);
        let mover = node.state().current_player();
        let mut best: Option<(S::Action, (bool, u32), f32)> = None;
        for (action, child_id) in node.children() {
            let child = self.get(child_id);
            let stats = child.stats();
            let wins = child.is_terminal()
                && child.state().reward(mover).map_or(false, |r| r > 0.0);
            let rank = (wins, stats.visit_count);
            let value = self.parent_view(&stats);
            let better = match best {
                None => true,
                Some((_, best_rank, best_value)) => {
                    rank > best_rank || (rank == best_rank && value > best_value)
                }
            };
            if better {
                best = Some((action, rank, value));
            }
        }
        best.map(|(action, _, _)| action)
    }

    /// Temperature-scaled visit distribution over `all_actions` of the
    /// node's state.
    ///
    /// Weights are `(visits / max_visits)^(1 / temperature)`, renormalized.
    /// Actions without a child get 0. If no child has been visited the
    /// distribution is uniform over legal actions.
    pub fn visit_distribution(&self, id: NodeId, temperature: f32) -> Vec<f32> {
        let node = self.get(id);
        let all_actions = node.state().all_actions();
        let mut distribution = vec![0.0f32; all_actions.len()];
        let index_of = |action: &S::Action| all_actions.binary_search(action).ok();

        let visits = self.visit_counts(id);
        let max_visits = visits.iter().map(|(_, v)| *v).max().unwrap_or(0);

        if max_visits == 0 {
            let legal = node.legal_actions();
            for action in legal {
                if let Some(i) = index_of(action) {
                    distribution[i] = 1.0 / legal.len() as f32;
                }
            }
            return distribution;
        }

        if temperature <= MIN_TEMPERATURE {
            if let Some(i) = self.best_action(id).as_ref().and_then(index_of) {
                distribution[i] = 1.0;
            }
            return distribution;
        }

        let inv_temp = 1.0 / temperature as f64;
        let weights: Vec<(usize, f64)> = visits
            .iter()
            .filter_map(|(action, count)| {
                let weight = (*count as f64 / max_visits as f64).powf(inv_temp);
                index_of(action).map(|i| (i, weight))
            })
            .collect();
        let sum: f64 = weights.iter().map(|(_, w)| w).sum();
        for (i, weight) in weights {
            distribution[i] = (weight / sum) as f32;
        }
        distribution
    }

    /// Visit-weighted value of the node's children, from the perspective of
    /// the player to move at the node.
    pub fn root_value(&self, id: NodeId) -> f32 {
        let stats = self.child_stats(id);
        let total: u32 = stats.iter().map(|(_, s)| s.visit_count).sum();
        if total == 0 {
            return 0.0;
        }
        let weighted: f32 = stats
            .iter()
            .map(|(_, s)| self.parent_view(s) * s.visit_count as f32)
            .sum();
        weighted / total as f32
    }
}

/// Normalized priors over `legal` read from a policy indexed like
/// `state.all_actions()`.
///
/// Falls back to uniform when the legal mass is zero.
pub(crate) fn legal_priors<S: GameState>(
    state: &S,
    legal: &[S::Action],
    policy: &[f32],
) -> Result<Vec<(S::Action, f32)>, SearchError> {
    let all_actions = state.all_actions();
    if policy.len() != all_actions.len() {
        return Err(ArborError::InvalidPolicy(format!(
            "expected {} entries, got {}",
            all_actions.len(),
            policy.len()
        ))
        .into());
    }
    if let Some((i, &p)) = policy
        .iter()
        .enumerate()
        .find(|(_, p)| !(0.0..=1.0).contains(*p))
    {
        return Err(SearchError::InvalidPrior {
            action: format!("{:?}", all_actions[i]),
            probability: p,
        });
    }

    let mut weights = Vec::with_capacity(legal.len());
    for action in legal {
        let i = all_actions
            .binary_search(action)
            .map_err(|_| ArborError::IllegalAction(format!("{:?}", action)))?;
        weights.push(policy[i]);
    }

    let normalized = match Policy::from_unnormalized(weights) {
        Ok(policy) => policy,
        Err(_) => Policy::uniform(legal.len())?,
    };
    Ok(legal
        .iter()
        .copied()
        .zip(normalized.into_inner())
        .collect())
}
