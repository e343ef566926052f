//! Child selection policies.
//!
//! Each policy is a pure scoring function over a node's children. The
//! shared [`select_child`] walks children in ascending action order and
//! keeps the first one with a strictly greater score, so ties resolve to
//! the lowest action.

use crate::node::{NodeId, NodeStats};
use crate::tree::Tree;
use arbor_core::GameState;

/// A child considered during selection.
#[derive(Clone, Copy, Debug)]
pub struct Candidate<A> {
    pub action: A,
    pub id: NodeId,
    pub stats: NodeStats,
    pub prior: f32,
}

/// Scores children for descent.
pub trait SelectionPolicy {
    /// Score of `child` under `parent`. Higher is better.
    fn score<A>(&self, parent: &NodeStats, child: &Candidate<A>) -> f32;

    /// Narrow the eligible candidates before scoring. Keeps all by default.
    fn restrict<A: Ord + Copy>(&self, _parent: &NodeStats, _candidates: &mut Vec<Candidate<A>>) {}
}

/// UCB1 applied to trees.
///
/// `score = (Q + 1) / 2 + w * sqrt(ln N / n)`, unvisited children score +∞.
/// `Q` is stored from the perspective of the player who moved into the
/// child, so it is maximized directly.
#[derive(Clone, Copy, Debug)]
pub struct Uct {
    pub exploration_weight: f32,
}

impl SelectionPolicy for Uct {
    fn score<A>(&self, parent: &NodeStats, child: &Candidate<A>) -> f32 {
        let n = child.stats.visit_count;
        if n == 0 {
            return f32::INFINITY;
        }
        let exploitation = (child.stats.mean_value() + 1.0) / 2.0;
        let parent_visits = parent.visit_count.max(1) as f32;
        exploitation + self.exploration_weight * (parent_visits.ln() / n as f32).sqrt()
    }
}

/// UCT over values stored from the child's player-to-move perspective,
/// counting virtual loss, with progressive widening.
#[derive(Clone, Copy, Debug)]
pub struct VirtualLossUct {
    pub exploration_weight: f32,
    pub widening_coefficient: f32,
}

impl VirtualLossUct {
    /// Number of children eligible at a parent with `visits` visits:
    /// `1 + floor(coefficient * ln(visits + 1))`.
    pub fn widening_limit(&self, visits: u32) -> usize {
        1 + (self.widening_coefficient * (visits as f32 + 1.0).ln()).floor() as usize
    }
}

impl SelectionPolicy for VirtualLossUct {
    fn score<A>(&self, parent: &NodeStats, child: &Candidate<A>) -> f32 {
        let n = child.stats.effective_visits();
        if n <= 0.0 {
            return f32::INFINITY;
        }
        // Virtual loss counts in favour of the child's player to move.
        let exploitation = -(child.stats.value_sum + child.stats.virtual_loss) / n;
        let parent_visits = parent.effective_visits().max(1.0);
        exploitation + self.exploration_weight * (parent_visits.ln() / n).sqrt()
    }

    fn restrict<A: Ord + Copy>(&self, parent: &NodeStats, candidates: &mut Vec<Candidate<A>>) {
        let limit = self.widening_limit(parent.visit_count);
        if candidates.len() <= limit {
            return;
        }
        // Unvisited first, then best for the parent, then by action.
        candidates.sort_by(|a, b| {
            let rank = |c: &Candidate<A>| {
                if c.stats.visit_count == 0 {
                    f32::INFINITY
                } else {
                    -c.stats.mean_value()
                }
            };
            rank(b)
                .total_cmp(&rank(a))
                .then_with(|| a.action.cmp(&b.action))
        });
        candidates.truncate(limit);
        candidates.sort_by(|a, b| a.action.cmp(&b.action));
    }
}

/// Prior-weighted UCT.
///
/// `score = Q + c_puct * P * sqrt(ln(N + 1)) / (1 + n)`, unvisited children
/// score +∞.
#[derive(Clone, Copy, Debug)]
pub struct Puct {
    pub c_puct: f32,
}

impl SelectionPolicy for Puct {
    fn score<A>(&self, parent: &NodeStats, child: &Candidate<A>) -> f32 {
        let n = child.stats.visit_count;
        if n == 0 {
            return f32::INFINITY;
        }
        let exploration = (parent.visit_count as f32 + 1.0).ln().sqrt() / (1.0 + n as f32);
        child.stats.mean_value() + self.c_puct * child.prior * exploration
    }
}

/// Pick the child of `id` to descend into.
///
/// Fully explored children are skipped. Returns `None` when no child is
/// selectable; the caller decides whether that means the node is exhausted
/// or the tree is corrupt.
pub fn select_child<S, P>(tree: &Tree<S>, id: NodeId, policy: &P) -> Option<(S::Action, NodeId)>
where
    S: GameState,
    P: SelectionPolicy,
{
    let node = tree.get(id);
    let parent = node.stats();

    let mut candidates: Vec<Candidate<S::Action>> = node
        .children()
        .into_iter()
        .filter_map(|(action, child_id)| {
            let child = tree.get(child_id);
            if child.is_fully_explored() {
                return None;
            }
            Some(Candidate {
                action,
                id: child_id,
                stats: child.stats(),
                prior: node.prior(action),
            })
        })
        .collect();
    policy.restrict(&parent, &mut candidates);

    let mut best: Option<&Candidate<S::Action>> = None;
    let mut best_score = f32::NEG_INFINITY;
    for candidate in &candidates {
        let score = policy.score(&parent, candidate);
        if best.is_none() || score > best_score {
            best = Some(candidate);
            best_score = score;
        }
    }
    best.map(|c| (c.action, c.id))
}
