use thiserror::Error;

/// Errors raised by game states and domain types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArborError {
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Game is not terminal")]
    NotTerminal,

    #[error("No legal actions available")]
    NoLegalActions,

    #[error("Illegal action: {0}")]
    IllegalAction(String),

    #[error("Invalid position: {0}")]
    InvalidPosition(String),
}

/// Convenience Result type for arbor operations
pub type Result<T> = std::result::Result<T, ArborError>;
