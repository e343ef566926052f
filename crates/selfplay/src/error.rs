use arbor_core::ArborError;
use arbor_mcts::SearchError;
use thiserror::Error;

/// Errors raised while generating or writing self-play data.
#[derive(Error, Debug)]
pub enum SelfPlayError {
    #[error("Search failed: {0}")]
    Search(#[from] SearchError),

    #[error(transparent)]
    Game(#[from] ArborError),

    #[error("Game did not finish within {0} moves")]
    MoveLimit(usize),

    #[error("Invalid self-play configuration: {0}")]
    Config(String),

    #[error("Failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("Sink I/O failure: {0}")]
    Sink(#[from] std::io::Error),

    #[error("Failed to encode example: {0}")]
    Encode(String),
}

/// Convenience Result type for self-play operations
pub type Result<T> = std::result::Result<T, SelfPlayError>;
