//! Error types for the notation pipeline
//!
//! Each stage has its own error enum; [`NotationError`] wraps whichever one
//! stopped a line. All of them carry a byte offset into the line as typed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::builder::BuildError;
use super::expand::ExpansionError;
use super::tokens::TokenizationError;

/// Top-level error for parsing one line
#[derive(Error, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum NotationError {
    #[error("expansion failed: {0}")]
    Expansion(#[from] ExpansionError),

    #[error("tokenization failed: {0}")]
    Tokenization(#[from] TokenizationError),

    #[error("{0}")]
    Build(#[from] BuildError),
}

impl NotationError {
    /// Byte offset in the original line
    pub fn offset(&self) -> usize {
        match self {
            NotationError::Expansion(e) => e.offset,
            NotationError::Tokenization(e) => e.offset(),
            NotationError::Build(e) => e.offset(),
        }
    }

    /// Kind identifier for diagnostics (e.g. "unbalanced_open", "bar_length")
    pub fn kind(&self) -> &'static str {
        match self {
            NotationError::Expansion(e) => e.kind.name(),
            NotationError::Tokenization(e) => e.kind(),
            NotationError::Build(e) => e.kind(),
        }
    }
}
