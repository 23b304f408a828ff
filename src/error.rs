//! Error types for the LP reader.

use thiserror::Error;

/// Errors that can occur while reading an LP file.
///
/// Every variant is a form of malformed input; the split follows the
/// pipeline stage that detected the problem. No partial model is ever
/// returned alongside an error.
#[derive(Error, Debug)]
pub enum LpError {
    /// Unrecognized character with no viable number or identifier
    #[error("unrecognized input at line {line}, column {col}")]
    Lex { line: usize, col: usize },

    /// Raw token sequence matches no classifier pattern
    #[error("unexpected {0}")]
    Classify(String),

    /// Section structure violated (duplicate section, unbalanced brackets, trailing tokens)
    #[error("malformed section: {0}")]
    Structural(String),

    /// Grammar rule violated (strict comparison, non-constant right-hand side, bad exponent)
    #[error("invalid construct: {0}")]
    Semantic(String),

    /// Underlying byte source failed
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for LP reading operations.
pub type LpResult<T> = Result<T, LpError>;
