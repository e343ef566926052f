//! Self-play configuration.

use arbor_mcts::MctsConfig;

/// How the move actually played is chosen from a finished search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ActionSelection {
    /// The search's best action: an immediate win, else the most visited.
    #[default]
    Greedy,

    /// Sample from the temperature-scaled visit distribution.
    Sample,
}

/// Parameters for a batch of self-play games.
#[derive(Clone, Debug)]
pub struct SelfPlayConfig {
    /// Number of independent games to play.
    pub games: usize,

    /// Search iterations per move for the first and second player.
    pub player_iterations: [usize; 2],

    /// TD(lambda) weight of the discounted outcome against the bootstrap.
    pub td_lambda: f32,

    /// Per-ply decay applied to the outcome term.
    pub discount: f32,

    /// Worker threads; `None` uses the available parallelism.
    pub workers: Option<usize>,

    /// A game still running after this many moves is abandoned.
    pub max_moves: usize,

    /// Base seed; each game derives its own streams from it.
    pub seed: u64,

    pub action_selection: ActionSelection,

    /// Search parameters shared by both players. `num_iterations` is
    /// replaced per move by `player_iterations`.
    pub mcts: MctsConfig,
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            games: 1,
            player_iterations: [100, 100],
            td_lambda: 0.8,
            discount: 0.9,
            workers: None,
            max_moves: 512,
            seed: 42,
            action_selection: ActionSelection::Greedy,
            mcts: MctsConfig::alphazero(100),
        }
    }
}

impl SelfPlayConfig {
    /// Iterations for the player with seat `index` (0 or 1).
    pub fn iterations_for(&self, index: usize) -> usize {
        self.player_iterations[index.min(1)]
    }

    /// Worker count actually used for a run.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Check the parameters make sense.
    ///
    /// # Errors
    /// A description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.player_iterations.contains(&0) {
            return Err("each player needs at least one search iteration".to_string());
        }
        if !(0.0..=1.0).contains(&self.td_lambda) {
            return Err(format!("td_lambda {} is outside [0, 1]", self.td_lambda));
        }
        if !(0.0..=1.0).contains(&self.discount) {
            return Err(format!("discount {} is outside [0, 1]", self.discount));
        }
        if self.workers == Some(0) {
            return Err("workers must be at least 1".to_string());
        }
        if self.max_moves == 0 {
            return Err("max_moves must be at least 1".to_string());
        }
        if self.mcts.temperature < 0.0 || self.mcts.late_temperature < 0.0 {
            return Err("temperatures must be non-negative".to_string());
        }
        Ok(())
    }
}
