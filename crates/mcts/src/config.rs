//! MCTS configuration parameters.
//!
//! One struct covers all three search variants; the named presets pick the
//! defaults each variant expects.

use std::time::Duration;

/// What happens to virtual loss once the real result of an iteration lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum VirtualLossMode {
    /// Penalty stays in the statistics and damps revisits for the rest of
    /// the search.
    #[default]
    Persistent,

    /// Penalty is removed on the same backpropagation pass that records the
    /// real result.
    Compensated,
}

/// MCTS configuration parameters.
#[derive(Clone, Debug)]
pub struct MctsConfig {
    /// Number of search iterations per search.
    pub num_iterations: usize,

    /// Optional wall-clock budget; the search stops at whichever of the
    /// iteration count or the deadline comes first.
    pub time_budget: Option<Duration>,

    /// UCT exploration weight `w` in `exploitation + w * sqrt(ln N / n)`.
    pub exploration_weight: f32,

    /// PUCT exploration constant.
    pub c_puct: f32,

    /// Progressive widening coefficient for the heuristic variant.
    pub widening_coefficient: f32,

    /// Minimum visits before a node can be marked fully explored.
    /// 0 disables the gate.
    pub visit_threshold: u32,

    /// Plies of win/block lookahead at the start of a heuristic rollout.
    pub heuristic_depth: usize,

    /// Virtual loss penalty (and fractional visit) per touched node.
    pub virtual_loss: f32,

    pub virtual_loss_mode: VirtualLossMode,

    /// Dirichlet noise alpha (for root exploration).
    pub dirichlet_alpha: f32,

    /// Fraction of prior replaced with Dirichlet noise at root.
    /// 0 = no exploration noise.
    pub exploration_fraction: f32,

    /// Temperature for visit distributions early in a game.
    pub temperature: f32,

    /// Moves after this number use `late_temperature`.
    /// Set to 0 to always use the configured temperature.
    pub temperature_drop_move: usize,

    /// Temperature once past `temperature_drop_move`.
    pub late_temperature: f32,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            num_iterations: 1000,
            time_budget: None,
            exploration_weight: std::f32::consts::SQRT_2,
            c_puct: 2.0,
            widening_coefficient: 0.7,
            visit_threshold: 0,
            heuristic_depth: 3,
            virtual_loss: 0.1,
            virtual_loss_mode: VirtualLossMode::Persistent,
            dirichlet_alpha: 0.3,
            exploration_fraction: 0.0,
            temperature: 1.0,
            temperature_drop_move: 15,
            late_temperature: 0.1,
        }
    }
}

impl MctsConfig {
    /// Baseline UCT defaults with the given iteration budget.
    pub fn baseline(num_iterations: usize) -> Self {
        Self {
            num_iterations,
            ..Default::default()
        }
    }

    /// Heuristic rollout + virtual loss defaults.
    pub fn heuristic(num_iterations: usize) -> Self {
        Self::baseline(num_iterations)
    }

    /// AlphaZero-style defaults: full exploration is gated on 10 visits.
    pub fn alphazero(num_iterations: usize) -> Self {
        Self {
            num_iterations,
            visit_threshold: 10,
            ..Default::default()
        }
    }

    pub fn with_iterations(mut self, num_iterations: usize) -> Self {
        self.num_iterations = num_iterations;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn with_virtual_loss_mode(mut self, mode: VirtualLossMode) -> Self {
        self.virtual_loss_mode = mode;
        self
    }

    pub fn with_root_noise(mut self, alpha: f32, fraction: f32) -> Self {
        self.dirichlet_alpha = alpha;
        self.exploration_fraction = fraction;
        self
    }

    /// Get the effective temperature for a given move number.
    pub fn effective_temperature(&self, move_number: usize) -> f32 {
        if self.temperature_drop_move > 0 && move_number > self.temperature_drop_move {
            self.late_temperature
        } else {
            self.temperature
        }
    }
}
