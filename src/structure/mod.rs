//! Score structure: bars in order, and the operations that edit and lay
//! them out
//!
//! ## Modules
//!
//! - `arena`: bar storage by stable id plus the score order
//! - `operations`: the `Score` facade running the per-bar pipeline

pub mod arena;
pub mod operations;

// Re-exports for convenience
pub use arena::BarArena;
pub use operations::{BarLayout, Score, ScoreError};
