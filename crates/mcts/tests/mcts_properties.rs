//! Property-based tests for the search drivers.
//!
//! These tests verify invariants that hold for any position:
//! - visit distributions sum to 1 and put no mass on illegal actions
//! - temperature 1 is proportional to visits, temperature 0 is one-hot
//! - every baseline iteration is one visit at the root
//! - shaped rewards stay in range and fade with depth
//! - a fixed seed reproduces the same search

use arbor_core::GameState;
use arbor_mcts::games::TicTacToeState;
use arbor_mcts::rollout::shape_reward;
use arbor_mcts::{AlphaZeroMcts, Mcts, MctsConfig, UniformEvaluator};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const POLICY_SUM_TOLERANCE: f32 = 1e-5;

// =============================================================================
// Strategies for generating test inputs
// =============================================================================

fn arb_seed() -> impl Strategy<Value = u64> {
    any::<u64>()
}

fn arb_iterations() -> impl Strategy<Value = usize> {
    10usize..200
}

/// A tic-tac-toe position reached by up to eight random moves.
fn arb_tictactoe_position() -> impl Strategy<Value = TicTacToeState> {
    (0usize..9, arb_seed()).prop_map(|(num_moves, seed)| {
        let mut state = TicTacToeState::new();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for _ in 0..num_moves {
            let actions = state.legal_actions();
            if actions.is_empty() {
                break;
            }
            let idx = rand::Rng::gen_range(&mut rng, 0..actions.len());
            state = state.apply(actions[idx]);
        }
        state
    })
}

fn baseline(iterations: usize, seed: u64) -> Mcts<ChaCha8Rng> {
    Mcts::new(MctsConfig::baseline(iterations), ChaCha8Rng::seed_from_u64(seed))
}

// =============================================================================
// Visit distributions
// =============================================================================

proptest! {
    #[test]
    fn prop_distribution_sums_to_one(
        seed in arb_seed(),
        iterations in arb_iterations(),
        state in arb_tictactoe_position(),
        temperature in 0.05f32..2.0,
    ) {
        prop_assume!(!state.is_terminal());

        let result = baseline(iterations, seed).search(&state).unwrap();
        let distribution = result.distribution(temperature);

        prop_assert_eq!(distribution.len(), 9);
        let sum: f32 = distribution.iter().sum();
        prop_assert!(
            (sum - 1.0).abs() < POLICY_SUM_TOLERANCE,
            "Distribution sum {} is not 1.0",
            sum
        );
        prop_assert!(distribution.iter().all(|p| *p >= 0.0));
    }

    #[test]
    fn prop_distribution_only_legal_actions(
        seed in arb_seed(),
        iterations in arb_iterations(),
        state in arb_tictactoe_position(),
    ) {
        prop_assume!(!state.is_terminal());

        let result = baseline(iterations, seed).search(&state).unwrap();
        let distribution = result.distribution(1.0);
        let legal = state.legal_actions();

        for action in state.all_actions() {
            if !legal.contains(&action) {
                let i = state.action_index(action).unwrap();
                prop_assert!(
                    distribution[i] == 0.0,
                    "Mass {} on illegal action {:?}",
                    distribution[i],
                    action
                );
            }
        }
    }

    #[test]
    fn prop_unit_temperature_matches_visit_share(
        seed in arb_seed(),
        iterations in arb_iterations(),
        state in arb_tictactoe_position(),
    ) {
        prop_assume!(!state.is_terminal());

        let result = baseline(iterations, seed).search(&state).unwrap();
        let distribution = result.distribution(1.0);
        let total: u32 = result.visit_counts().iter().map(|(_, c)| *c).sum();
        prop_assume!(total > 0);

        for (action, count) in result.visit_counts() {
            let i = state.action_index(action).unwrap();
            let expected = count as f32 / total as f32;
            prop_assert!(
                (distribution[i] - expected).abs() < 1e-5,
                "Action {:?}: expected {}, got {}",
                action,
                expected,
                distribution[i]
            );
        }
    }

    #[test]
    fn prop_zero_temperature_is_one_hot_on_best_action(
        seed in arb_seed(),
        iterations in arb_iterations(),
        state in arb_tictactoe_position(),
    ) {
        prop_assume!(!state.is_terminal());

        let result = baseline(iterations, seed).search(&state).unwrap();
        let best = result.best_action().unwrap();
        let distribution = result.distribution(0.0);

        let i = state.action_index(best).unwrap();
        prop_assert_eq!(distribution[i], 1.0);
        prop_assert_eq!(distribution.iter().filter(|p| **p > 0.0).count(), 1);
    }
}

// =============================================================================
// Tree statistics
// =============================================================================

proptest! {
    #[test]
    fn prop_each_iteration_is_one_root_visit(
        seed in arb_seed(),
        iterations in arb_iterations(),
        state in arb_tictactoe_position(),
    ) {
        prop_assume!(!state.is_terminal());

        let result = baseline(iterations, seed).search(&state).unwrap();

        prop_assert!(result.iterations() <= iterations);
        prop_assert_eq!(result.root_visits() as usize, result.iterations());
        let children: u32 = result.visit_counts().iter().map(|(_, c)| *c).sum();
        prop_assert_eq!(children, result.root_visits());
    }

    #[test]
    fn prop_best_action_wins_or_has_max_visits(
        seed in arb_seed(),
        iterations in arb_iterations(),
        state in arb_tictactoe_position(),
    ) {
        prop_assume!(!state.is_terminal());

        let result = baseline(iterations, seed).search(&state).unwrap();
        let counts = result.visit_counts();
        let max = counts.iter().map(|(_, c)| *c).max().unwrap();
        let best = result.best_action().unwrap();
        let best_count = counts.iter().find(|(a, _)| *a == best).map(|(_, c)| *c);

        // A move that wins on the spot is played regardless of visits.
        let next = state.apply(best);
        let wins = next.is_terminal() && next.reward(state.current_player()).unwrap() > 0.0;
        prop_assert!(wins || best_count == Some(max), "best {:?} has {:?} of {} visits", best, best_count, max);
    }

    #[test]
    fn prop_root_value_in_range(
        seed in arb_seed(),
        iterations in arb_iterations(),
        state in arb_tictactoe_position(),
    ) {
        prop_assume!(!state.is_terminal());

        let result = baseline(iterations, seed).search(&state).unwrap();
        let value = result.root_value();
        prop_assert!((-1.0..=1.0).contains(&value), "Root value {} out of range", value);

        let mut az = AlphaZeroMcts::new(
            MctsConfig::alphazero(iterations),
            UniformEvaluator,
            ChaCha8Rng::seed_from_u64(seed),
        );
        let value = az.search(&state).unwrap().root_value();
        prop_assert!((-1.0..=1.0).contains(&value), "Root value {} out of range", value);
    }
}

// =============================================================================
// Reward shaping
// =============================================================================

proptest! {
    #[test]
    fn prop_shaped_rewards_fade_with_depth(
        max_depth in 1usize..40,
        a in 0usize..40,
        b in 0usize..40,
    ) {
        let (near, far) = if a <= b { (a, b) } else { (b, a) };

        let win_near = shape_reward(1.0, near, max_depth);
        let win_far = shape_reward(1.0, far, max_depth);
        prop_assert!(win_near >= win_far);
        prop_assert!(win_far >= 0.2 - 1e-6 && win_near <= 1.0 + 1e-6);

        let loss_near = shape_reward(-1.0, near, max_depth);
        let loss_far = shape_reward(-1.0, far, max_depth);
        prop_assert!(loss_near <= loss_far);
        prop_assert!(loss_near >= -1.0 - 1e-6 && loss_far <= -0.2 + 1e-6);

        prop_assert_eq!(shape_reward(0.0, near, max_depth), 0.0);
    }
}

// =============================================================================
// Determinism
// =============================================================================

proptest! {
    #[test]
    fn prop_deterministic(
        seed in arb_seed(),
        iterations in arb_iterations(),
        state in arb_tictactoe_position(),
    ) {
        prop_assume!(!state.is_terminal());

        let first = baseline(iterations, seed).search(&state).unwrap();
        let second = baseline(iterations, seed).search(&state).unwrap();

        prop_assert_eq!(first.best_action(), second.best_action());
        prop_assert_eq!(first.visit_counts(), second.visit_counts());
        prop_assert_eq!(first.distribution(1.0), second.distribution(1.0));
        prop_assert!((first.root_value() - second.root_value()).abs() < 1e-6);
    }
}
