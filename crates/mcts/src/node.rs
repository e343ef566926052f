//! MCTS node types for tree storage.
//!
//! Nodes live in an arena and refer to each other by index. Every mutable
//! part of a node sits behind its own lock so that concurrent iterations
//! contend per node rather than per tree.

use arbor_core::GameState;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError, RwLock, RwLockWriteGuard};

/// Index into the node arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The root node is always at index 0.
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Statistics for a single MCTS node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NodeStats {
    /// Completed backpropagation passes through this node.
    pub visit_count: u32,

    /// Sum of backed-up values, from the perspective recorded at this node.
    pub value_sum: f32,

    /// Accumulated virtual loss penalty.
    pub virtual_loss: f32,

    /// Fractional visits added alongside virtual loss.
    pub virtual_visits: f32,
}

impl NodeStats {
    /// Mean value (Q-value) for this node.
    ///
    /// Returns 0.0 if the node has never been visited.
    pub fn mean_value(&self) -> f32 {
        if self.visit_count == 0 {
            0.0
        } else {
            self.value_sum / self.visit_count as f32
        }
    }

    /// Visit count including in-flight virtual visits.
    pub fn effective_visits(&self) -> f32 {
        self.visit_count as f32 + self.virtual_visits
    }
}

/// A node in the MCTS tree.
#[derive(Debug)]
pub struct Node<S: GameState> {
    state: S,
    parent: Option<NodeId>,
    action: Option<S::Action>,
    terminal: bool,
    legal_actions: Vec<S::Action>,
    children: RwLock<BTreeMap<S::Action, NodeId>>,
    priors: OnceLock<BTreeMap<S::Action, f32>>,
    stats: Mutex<NodeStats>,
    fully_explored: AtomicBool,
}

impl<S: GameState> Node<S> {
    pub(crate) fn new(state: S, parent: Option<NodeId>, action: Option<S::Action>) -> Self {
        let terminal = state.is_terminal();
        let legal_actions = if terminal {
            Vec::new()
        } else {
            state.legal_actions()
        };
        Self {
            state,
            parent,
            action,
            terminal,
            legal_actions,
            children: RwLock::new(BTreeMap::new()),
            priors: OnceLock::new(),
            stats: Mutex::new(NodeStats::default()),
            fully_explored: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Parent node (None for root).
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Action that led to this node (None for root).
    pub fn action(&self) -> Option<S::Action> {
        self.action
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Legal actions of the node's state, in the game's order.
    pub fn legal_actions(&self) -> &[S::Action] {
        &self.legal_actions
    }

    /// Snapshot of the node statistics.
    pub fn stats(&self) -> NodeStats {
        *self.lock_stats()
    }

    /// Run `f` on the statistics under the node's lock.
    pub(crate) fn update_stats<T>(&self, f: impl FnOnce(&mut NodeStats) -> T) -> T {
        f(&mut self.lock_stats())
    }

    fn lock_stats(&self) -> MutexGuard<'_, NodeStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the children in ascending action order.
    pub fn children(&self) -> Vec<(S::Action, NodeId)> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(a, id)| (*a, *id))
            .collect()
    }

    pub fn child(&self, action: S::Action) -> Option<NodeId> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&action)
            .copied()
    }

    pub fn num_children(&self) -> usize {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn children_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<S::Action, NodeId>> {
        self.children.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// True once every legal action has a child (or there are none).
    pub fn is_fully_expanded(&self) -> bool {
        self.num_children() >= self.legal_actions.len()
    }

    /// Prior probability recorded for `action`, 0.0 without priors.
    pub fn prior(&self, action: S::Action) -> f32 {
        self.priors
            .get()
            .and_then(|p| p.get(&action).copied())
            .unwrap_or(0.0)
    }

    /// Store priors; later calls keep the first set.
    pub(crate) fn set_priors(&self, priors: BTreeMap<S::Action, f32>) {
        let _ = self.priors.set(priors);
    }

    pub fn is_fully_explored(&self) -> bool {
        self.fully_explored.load(Ordering::Acquire)
    }

    /// Returns true if this call flipped the flag.
    pub(crate) fn mark_fully_explored(&self) -> bool {
        !self.fully_explored.swap(true, Ordering::AcqRel)
    }
}
