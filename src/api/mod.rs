//! Music Notation WASM API
//!
//! This module provides the JavaScript-facing API for the notation core.
//!
//! # Module Structure
//!
//! - `helpers`: Shared utilities for serialization, validation, error handling, and logging
//! - `core`: Score storage and the exported functions

pub mod helpers;
pub mod core;

// Re-export all public functions to keep a flat public API
pub use core::*;
