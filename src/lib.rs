//! Music Notation WASM Module
//!
//! Live notation core: a line typed for one instrument in one bar goes
//! through repetition expansion, tokenizing and event building, is linked
//! to its neighbouring bars, and is laid out into engraving geometry.

pub mod api;
pub mod diagnostics;
pub mod layout;
pub mod models;
pub mod parse;
pub mod structure;

// Re-export commonly used types
pub use diagnostics::{DiagnosticMark, DiagnosticSeverity, Diagnostics};
pub use layout::{LayoutConfig, LayoutContext, LayoutEngine, LayoutRecord};
pub use models::*;
pub use parse::{parse_bars, parse_line, MacroCursor, NotationError};
pub use structure::{BarLayout, Score, ScoreError};

use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    #[cfg(feature = "console_log")]
    if console_log::init_with_level(log::Level::Debug).is_err() {
        api::helpers::log_warn("logger was already initialized");
    }

    log::info!("🎼 Notation WASM module initialized");
}
