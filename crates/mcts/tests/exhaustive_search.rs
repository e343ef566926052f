//! Searches on positions small enough to be closed completely.
//!
//! Once every line below the root is decided the drivers stop early, so
//! these tests check the iteration count against the size of the game tree.

use arbor_core::{GameState, Player};
use arbor_mcts::games::{Countdown, TicTacToeAction, TicTacToeState};
use arbor_mcts::{AlphaZeroMcts, HeuristicMcts, Mcts, MctsConfig, UniformEvaluator};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Positions with at most four empty cells.
fn arb_late_position() -> impl Strategy<Value = TicTacToeState> {
    (5usize..9, any::<u64>()).prop_map(|(num_moves, seed)| {
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

proptest! {
    /// Every baseline iteration adds exactly one node until the whole
    /// tree is built.
    #[test]
    fn prop_baseline_exhausts_with_one_node_per_iteration(
        seed in any::<u64>(),
        state in arb_late_position(),
    ) {
        prop_assume!(!state.is_terminal());

        let mut mcts = Mcts::new(MctsConfig::baseline(10_000), ChaCha8Rng::seed_from_u64(seed));
        let result = mcts.search(&state).unwrap();

        prop_assert!(result.is_exhausted());
        prop_assert_eq!(result.iterations(), result.tree().len() - 1);
    }

    #[test]
    fn prop_alphazero_exhausts_small_positions(
        seed in any::<u64>(),
        state in arb_late_position(),
    ) {
        prop_assume!(!state.is_terminal());

        let mut mcts = AlphaZeroMcts::new(
            MctsConfig::alphazero(10_000),
            UniformEvaluator,
            ChaCha8Rng::seed_from_u64(seed),
        );
        let result = mcts.search(&state).unwrap();

        prop_assert!(result.is_exhausted());
        prop_assert!(result.iterations() < 10_000);
    }
}

#[test]
fn test_heuristic_search_exhausts_forced_line() {
    let result = HeuristicMcts::new(MctsConfig::heuristic(1_000), 9)
        .search(&Countdown::new(6))
        .unwrap();
    assert!(result.is_exhausted());
    assert!(result.iterations() < 1_000);
}

#[test]
fn test_searchers_finish_a_game_with_legal_moves() {
    let mut x = Mcts::new(MctsConfig::baseline(300), ChaCha8Rng::seed_from_u64(1));
    let o = HeuristicMcts::new(MctsConfig::heuristic(300), 2);

    let mut state = TicTacToeState::new();
    let mut plies = 0;
    while !state.is_terminal() {
        let action: TicTacToeAction = match state.current_player() {
            Player::First => x.best_action(&state).unwrap(),
            Player::Second => o.best_action(&state).unwrap(),
        };
        assert!(state.legal_actions().contains(&action));
        state = state.apply(action);
        plies += 1;
    }

    assert!(plies <= 9);
    let reward = state.reward(Player::First).unwrap();
    assert!([-1.0, 0.0, 1.0].contains(&reward));
}
