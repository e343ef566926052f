//! Monte Carlo Tree Search for two-player zero-sum games.
//!
//! This crate provides three search drivers over one arena tree, usable
//! with any game implementing `arbor_core::GameState`.
//!
//! # Features
//!
//! - **UCT**: baseline search with random playouts and depth-shaped rewards
//! - **Heuristic**: concurrent iterations on the rayon pool, steered apart by
//!   virtual loss, with progressive widening and win/block-biased playouts
//! - **AlphaZero**: PUCT selection over priors from an [`Evaluator`], with
//!   optional Dirichlet noise at the root
//! - **Subtree pruning**: decided lines are marked fully explored and skipped
//! - **Temperature**: visit distributions over the global action space
//!
//! # Example
//!
//! ```
//! use arbor_mcts::{games::TicTacToeState, Mcts, MctsConfig};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let state = TicTacToeState::new();
//! let mut mcts = Mcts::new(MctsConfig::baseline(200), ChaCha8Rng::seed_from_u64(42));
//!
//! let result = mcts.search(&state).expect("search");
//! println!("Best action: {:?}", result.best_action());
//! println!("Root value: {}", result.root_value());
//!
//! let policy = result.typed_policy(1.0).expect("valid policy");
//! assert_eq!(policy.len(), 9);
//! ```

pub mod alphazero;
pub mod backprop;
pub mod config;
pub mod evaluator;
pub mod games;
pub mod heuristic;
pub mod node;
pub mod rollout;
pub mod search;
pub mod selection;
pub mod tree;
pub mod uct;

pub use alphazero::AlphaZeroMcts;
pub use config::{MctsConfig, VirtualLossMode};
pub use evaluator::{Evaluation, Evaluator, EvaluatorError, RolloutEvaluator, UniformEvaluator};
pub use heuristic::HeuristicMcts;
pub use node::{Node, NodeId, NodeStats};
pub use search::{SearchError, SearchResult};
pub use tree::{Tree, ValuePerspective, MIN_TEMPERATURE};
pub use uct::Mcts;
