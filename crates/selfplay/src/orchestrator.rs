//! Concurrent self-play.
//!
//! Each game runs on its own worker with its own trees and random streams;
//! only the evaluator is shared. Examples within a game are in move order.

use crate::config::{ActionSelection, SelfPlayConfig};
use crate::error::{Result, SelfPlayError};
use crate::example::{backfill_td_lambda, TrainingExample};
use arbor_core::{GameState, Player};
use arbor_mcts::{AlphaZeroMcts, Evaluator, SearchError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A finished self-play game.
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub index: usize,
    /// One example per move, values back-filled.
    pub examples: Vec<TrainingExample>,
    pub moves: usize,
    /// Final result for the first player.
    pub outcome: f32,
}

impl GameRecord {
    pub fn winner(&self) -> Option<Player> {
        if self.outcome > 0.0 {
            Some(Player::First)
        } else if self.outcome < 0.0 {
            Some(Player::Second)
        } else {
            None
        }
    }
}

/// A game that was abandoned.
#[derive(Debug)]
pub struct GameFailure {
    pub index: usize,
    pub error: SelfPlayError,
}

/// Everything a run produced, games in index order.
#[derive(Debug, Default)]
pub struct SelfPlayReport {
    pub games: Vec<GameRecord>,
    pub failures: Vec<GameFailure>,
}

impl SelfPlayReport {
    /// All examples, game by game.
    pub fn examples(&self) -> impl Iterator<Item = &TrainingExample> {
        self.games.iter().flat_map(|g| g.examples.iter())
    }

    pub fn total_examples(&self) -> usize {
        self.games.iter().map(|g| g.examples.len()).sum()
    }

    /// (first player wins, second player wins, draws)
    pub fn outcomes(&self) -> (usize, usize, usize) {
        let mut tally = (0, 0, 0);
        for game in &self.games {
            match game.winner() {
                Some(Player::First) => tally.0 += 1,
                Some(Player::Second) => tally.1 += 1,
                None => tally.2 += 1,
            }
        }
        tally
    }
}

/// Self-play driver around an AlphaZero-style search and a shared
/// evaluator.
pub struct SelfPlay<E> {
    config: SelfPlayConfig,
    evaluator: E,
}

impl<E> SelfPlay<E> {
    /// # Errors
    /// `SelfPlayError::Config` if the configuration does not validate.
    pub fn new(config: SelfPlayConfig, evaluator: E) -> Result<Self> {
        config.validate().map_err(SelfPlayError::Config)?;
        Ok(Self { config, evaluator })
    }

    pub fn config(&self) -> &SelfPlayConfig {
        &self.config
    }

    fn game_seed(&self, game_index: usize) -> u64 {
        self.config
            .seed
            .wrapping_add((game_index as u64).wrapping_mul(1000))
    }

    /// Play one game from `initial` to the end.
    ///
    /// Each move searches a fresh tree from the current state with the
    /// mover's iteration budget, records the visit distribution at the
    /// move's temperature, then plays the chosen action. Values are
    /// back-filled once the game ends.
    pub fn play_game<S>(&self, initial: &S, game_index: usize) -> Result<GameRecord>
    where
        S: GameState,
        E: Evaluator<S>,
    {
        let seed = self.game_seed(game_index);
        let mut search_rng = ChaCha8Rng::seed_from_u64(seed);
        let mut move_rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(1));
        let start = Instant::now();

        let mut state = initial.clone();
        let mut examples = Vec::new();
        let mut moves = 0;

        while !state.is_terminal() {
            if moves >= self.config.max_moves {
                return Err(SelfPlayError::MoveLimit(self.config.max_moves));
            }

            let mover = state.current_player();
            let config = self
                .config
                .mcts
                .clone()
                .with_iterations(self.config.iterations_for(mover.index()));
            let mut mcts = AlphaZeroMcts::new(config, &self.evaluator, &mut search_rng);
            let result = mcts.search(&state)?;

            let temperature = self.config.mcts.effective_temperature(moves);
            examples.push(TrainingExample::pending(
                state.encode_board(),
                result.distribution(temperature),
                mover.sign(),
            ));

            let action = match self.config.action_selection {
                ActionSelection::Greedy => result.best_action(),
                ActionSelection::Sample => result.select_action(temperature, &mut move_rng),
            }
            .ok_or_else(|| SearchError::CorruptTree("searched root has no children".to_string()))?;

            debug!(game = game_index, moves, ?action, temperature, "move played");
            state = state.apply(action);
            moves += 1;
        }

        // The player to move at the end is not the one who moved last.
        let last_mover = state.current_player().opponent();
        backfill_td_lambda(
            &mut examples,
            state.reward(last_mover)?,
            self.config.td_lambda,
            self.config.discount,
        );
        let outcome = state.reward(Player::First)?;

        info!(
            game = game_index,
            moves,
            outcome,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "self-play game finished"
        );
        Ok(GameRecord {
            index: game_index,
            examples,
            moves,
            outcome,
        })
    }

    /// Play `config.games` games concurrently on a dedicated pool.
    ///
    /// A failed game is logged and reported; the others still complete.
    ///
    /// # Errors
    /// Only if the worker pool cannot be built.
    pub fn run<S>(&self, initial: &S) -> Result<SelfPlayReport>
    where
        S: GameState,
        E: Evaluator<S>,
    {
        let workers = self.config.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;
        info!(games = self.config.games, workers, "starting self-play");

        let results: Vec<(usize, Result<GameRecord>)> = pool.install(|| {
            (0..self.config.games)
                .into_par_iter()
                .map(|i| (i, self.play_game(initial, i)))
                .collect()
        });

        let mut report = SelfPlayReport::default();
        for (index, result) in results {
            match result {
                Ok(record) => report.games.push(record),
                Err(error) => {
                    warn!(game = index, %error, "self-play game failed");
                    report.failures.push(GameFailure { index, error });
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_mcts::games::{Countdown, TicTacToeState};
    use arbor_mcts::{Evaluation, EvaluatorError, MctsConfig, RolloutEvaluator, UniformEvaluator};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(games: usize, iterations: usize) -> SelfPlayConfig {
        SelfPlayConfig {
            games,
            player_iterations: [iterations, iterations],
            workers: Some(2),
            mcts: MctsConfig::alphazero(iterations),
            ..Default::default()
        }
    }

    #[test]
    fn test_countdown_game_has_one_example_per_move() {
        let selfplay = SelfPlay::new(config(1, 20), UniformEvaluator).unwrap();
        let record = selfplay.play_game(&Countdown::new(5), 0).unwrap();

        assert_eq!(record.moves, 5);
        assert_eq!(record.examples.len(), 5);
        // Five plies: the first player moves last and wins.
        assert_eq!(record.outcome, 1.0);
        assert_eq!(record.winner(), Some(Player::First));

        let players: Vec<i32> = record.examples.iter().map(|e| e.current_player).collect();
        assert_eq!(players, vec![1, -1, 1, -1, 1]);
        assert_eq!(record.examples[4].value, 1.0);
        assert!(record.examples.iter().all(|e| e.policy == vec![1.0]));
        // Values alternate in sign down the line.
        for pair in record.examples.windows(2) {
            assert!(pair[0].value * pair[1].value < 0.0);
        }
    }

    #[test]
    fn test_tictactoe_game_examples_are_well_formed() {
        let selfplay = SelfPlay::new(config(1, 30), UniformEvaluator).unwrap();
        let record = selfplay.play_game(&TicTacToeState::new(), 0).unwrap();

        assert!(record.moves >= 5 && record.moves <= 9);
        for example in &record.examples {
            assert_eq!(example.board.len(), 3);
            assert_eq!(example.policy.len(), 9);
            assert!((example.policy.iter().sum::<f32>() - 1.0).abs() < 1e-4);
            assert!((-1.0..=1.0).contains(&example.value));
        }
    }

    #[test]
    fn test_move_limit_abandons_game() {
        let selfplay = SelfPlay::new(
            SelfPlayConfig {
                max_moves: 3,
                ..config(1, 5)
            },
            UniformEvaluator,
        )
        .unwrap();
        let err = selfplay.play_game(&Countdown::new(10), 0).unwrap_err();
        assert!(matches!(err, SelfPlayError::MoveLimit(3)));
    }

    #[test]
    fn test_run_collects_every_game() {
        let selfplay = SelfPlay::new(config(4, 10), UniformEvaluator).unwrap();
        let report = selfplay.run(&Countdown::new(4)).unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(report.games.len(), 4);
        assert_eq!(report.total_examples(), 16);
        assert_eq!(report.outcomes(), (0, 4, 0));
        let indices: Vec<usize> = report.games.iter().map(|g| g.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    /// Succeeds for the first `fail_after` calls, then rejects everything.
    struct FlakyEvaluator {
        calls: AtomicUsize,
        fail_after: usize,
    }

    impl<S: GameState> Evaluator<S> for FlakyEvaluator {
        fn evaluate(&self, state: &S) -> std::result::Result<Evaluation, EvaluatorError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.fail_after {
                return Err(EvaluatorError::Rejected("overloaded".to_string()));
            }
            UniformEvaluator.evaluate(state)
        }
    }

    #[test]
    fn test_failed_game_is_reported() {
        let evaluator = FlakyEvaluator {
            calls: AtomicUsize::new(0),
            fail_after: 0,
        };
        let selfplay = SelfPlay::new(config(2, 5), evaluator).unwrap();
        let report = selfplay.run(&TicTacToeState::new()).unwrap();

        assert!(report.games.is_empty());
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(
            report.failures[0].error,
            SelfPlayError::Search(SearchError::Evaluator(_))
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = SelfPlay::new(
            SelfPlayConfig {
                td_lambda: 2.0,
                ..Default::default()
            },
            UniformEvaluator,
        )
        .err()
        .unwrap();
        assert!(matches!(err, SelfPlayError::Config(_)));
    }

    #[test]
    fn test_same_seed_same_game() {
        let selfplay = SelfPlay::new(
            SelfPlayConfig {
                action_selection: ActionSelection::Sample,
                ..config(1, 20)
            },
            UniformEvaluator,
        )
        .unwrap();
        let first = selfplay.play_game(&TicTacToeState::new(), 3).unwrap();
        let second = selfplay.play_game(&TicTacToeState::new(), 3).unwrap();
        assert_eq!(first.examples, second.examples);
    }

    #[test]
    fn test_parallel_run_with_shared_rollouts_is_reproducible() {
        let run = || {
            let selfplay = SelfPlay::new(
                SelfPlayConfig {
                    workers: Some(8),
                    action_selection: ActionSelection::Sample,
                    ..config(8, 15)
                },
                Arc::new(RolloutEvaluator::new(43, 9)),
            )
            .unwrap();
            selfplay.run(&TicTacToeState::new()).unwrap()
        };

        let first = run();
        assert_eq!(first.games.len(), 8);
        for _ in 0..4 {
            let again = run();
            for (a, b) in first.games.iter().zip(&again.games) {
                assert_eq!(a.examples, b.examples, "game {}", a.index);
            }
        }
    }
}
