//! Backpropagation and virtual loss.
//!
//! Each node's statistics are updated under that node's own lock; the walk
//! never holds more than one lock at a time.

use crate::config::VirtualLossMode;
use crate::node::NodeId;
use crate::tree::Tree;
use arbor_core::GameState;

/// Walk from `leaf` to the root. At each node: one more visit, add the
/// current value, then negate it for the parent.
pub fn backpropagate<S: GameState>(tree: &Tree<S>, leaf: NodeId, value: f32) {
    backpropagate_with_compensation(tree, leaf, value, 0.0);
}

/// Backpropagate the real result of an iteration that applied virtual loss
/// along its path. Under [`VirtualLossMode::Compensated`] the penalty is
/// removed on the same pass.
pub fn backpropagate_virtual<S: GameState>(
    tree: &Tree<S>,
    leaf: NodeId,
    value: f32,
    virtual_loss: f32,
    mode: VirtualLossMode,
) {
    let compensation = match mode {
        VirtualLossMode::Persistent => 0.0,
        VirtualLossMode::Compensated => virtual_loss,
    };
    backpropagate_with_compensation(tree, leaf, value, compensation);
}

fn backpropagate_with_compensation<S: GameState>(
    tree: &Tree<S>,
    leaf: NodeId,
    leaf_value: f32,
    compensation: f32,
) {
    let mut value = leaf_value;
    let mut current = Some(leaf);
    while let Some(id) = current {
        let node = tree.get(id);
        node.update_stats(|stats| {
            stats.visit_count += 1;
            stats.value_sum += value;
            if compensation > 0.0 {
                stats.virtual_loss = (stats.virtual_loss - compensation).max(0.0);
                stats.virtual_visits = (stats.virtual_visits - compensation).max(0.0);
            }
        });
        value = -value;
        current = node.parent();
    }
}

/// Add a virtual loss (and matching fractional visit) to one node.
pub fn apply_virtual_loss<S: GameState>(tree: &Tree<S>, id: NodeId, amount: f32) {
    tree.get(id).update_stats(|stats| {
        stats.virtual_loss += amount;
        stats.virtual_visits += amount;
    });
}

/// Remove virtual loss from `leaf` and every ancestor without recording a
/// result.
pub fn release_virtual_loss<S: GameState>(tree: &Tree<S>, leaf: NodeId, amount: f32) {
    let mut current = Some(leaf);
    while let Some(id) = current {
        let node = tree.get(id);
        node.update_stats(|stats| {
            stats.virtual_loss = (stats.virtual_loss - amount).max(0.0);
            stats.virtual_visits = (stats.virtual_visits - amount).max(0.0);
        });
        current = node.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::Countdown;

    /// Root -> child -> grandchild chain.
    fn chain() -> (Tree<Countdown>, NodeId, NodeId) {
        let tree = Tree::new(Countdown::new(5));
        let child = tree.expand_uniform(NodeId::ROOT, 0).unwrap();
        let grandchild = tree.expand_uniform(child, 0).unwrap();
        (tree, child, grandchild)
    }

    #[test]
    fn test_backpropagate_alternates_sign() {
        let (tree, child, leaf) = chain();
        backpropagate(&tree, leaf, 1.0);

        assert_eq!(tree.get(leaf).stats().value_sum, 1.0);
        assert_eq!(tree.get(child).stats().value_sum, -1.0);
        assert_eq!(tree.root().stats().value_sum, 1.0);
        for id in [leaf, child, NodeId::ROOT] {
            assert_eq!(tree.get(id).stats().visit_count, 1);
        }
    }

    #[test]
    fn test_visit_count_matches_passes() {
        let (tree, child, leaf) = chain();
        for _ in 0..7 {
            backpropagate(&tree, leaf, 0.5);
        }
        backpropagate(&tree, child, 0.5);
        assert_eq!(tree.get(leaf).stats().visit_count, 7);
        assert_eq!(tree.get(child).stats().visit_count, 8);
        assert_eq!(tree.root().stats().visit_count, 8);
        assert!(!tree.root().is_fully_explored());
    }

    #[test]
    fn test_persistent_virtual_loss_stays() {
        let (tree, child, leaf) = chain();
        for id in [NodeId::ROOT, child, leaf] {
            apply_virtual_loss(&tree, id, 0.1);
        }
        backpropagate_virtual(&tree, leaf, 1.0, 0.1, VirtualLossMode::Persistent);

        let stats = tree.get(leaf).stats();
        assert_eq!(stats.visit_count, 1);
        assert!((stats.virtual_loss - 0.1).abs() < 1e-6);
        assert!((stats.effective_visits() - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_compensated_virtual_loss_is_removed() {
        let (tree, child, leaf) = chain();
        for id in [NodeId::ROOT, child, leaf] {
            apply_virtual_loss(&tree, id, 0.1);
        }
        backpropagate_virtual(&tree, leaf, 1.0, 0.1, VirtualLossMode::Compensated);

        for id in [NodeId::ROOT, child, leaf] {
            let stats = tree.get(id).stats();
            assert_eq!(stats.visit_count, 1);
            assert!(stats.virtual_loss.abs() < 1e-6);
            assert!(stats.virtual_visits.abs() < 1e-6);
        }
        assert_eq!(tree.get(child).stats().value_sum, -1.0);
    }

    #[test]
    fn test_release_virtual_loss_records_nothing() {
        let (tree, child, leaf) = chain();
        apply_virtual_loss(&tree, child, 0.1);
        apply_virtual_loss(&tree, leaf, 0.1);
        release_virtual_loss(&tree, leaf, 0.1);

        let stats = tree.get(child).stats();
        assert_eq!(stats.visit_count, 0);
        assert!(stats.virtual_loss.abs() < 1e-6);
        assert_eq!(stats.value_sum, 0.0);
    }
}
