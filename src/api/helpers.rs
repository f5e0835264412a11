//! Shared helpers for WASM API operations
//!
//! Console logging, serde conversion to and from `JsValue`, and the
//! conversion of score errors into diagnostics JavaScript can draw.

use wasm_bindgen::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::diagnostics::{error_mark, DiagnosticMark, DiagnosticSeverity, Diagnostics};
use crate::models::BarId;
use crate::structure::ScoreError;

// ============================================================================
// Console Logging Functions
// ============================================================================

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);

    #[wasm_bindgen(js_namespace = console)]
    fn info(s: &str);

    #[wasm_bindgen(js_namespace = console)]
    fn warn(s: &str);

    #[wasm_bindgen(js_namespace = console)]
    fn error(s: &str);
}

// ============================================================================
// Logging Macros
// ============================================================================

/// Log a debug message with [WASM] prefix
#[macro_export]
macro_rules! wasm_log {
    ($($arg:tt)*) => {
        $crate::api::helpers::log_debug(&format!($($arg)*))
    };
}

/// Log an info message with [WASM] prefix
#[macro_export]
macro_rules! wasm_info {
    ($($arg:tt)*) => {
        $crate::api::helpers::log_info(&format!($($arg)*))
    };
}

/// Log a warning message with [WASM] ⚠️ prefix
#[macro_export]
macro_rules! wasm_warn {
    ($($arg:tt)*) => {
        $crate::api::helpers::log_warn(&format!($($arg)*))
    };
}

/// Log an error message with [WASM] ❌ prefix
#[macro_export]
macro_rules! wasm_error {
    ($($arg:tt)*) => {
        $crate::api::helpers::log_error(&format!($($arg)*))
    };
}

// ============================================================================
// Logging Helper Functions (called by macros)
// ============================================================================

pub fn log_debug(msg: &str) {
    log(&format!("[WASM] {}", msg));
}

pub fn log_info(msg: &str) {
    info(&format!("[WASM] {}", msg));
}

pub fn log_warn(msg: &str) {
    warn(&format!("[WASM] ⚠️ {}", msg));
}

pub fn log_error(msg: &str) {
    error(&format!("[WASM] ❌ {}", msg));
}

// ============================================================================
// Serialization/Deserialization Helpers
// ============================================================================

/// Deserialize a value from JavaScript with automatic error handling
pub fn deserialize<T: DeserializeOwned>(
    value: JsValue,
    error_context: &str,
) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| {
        let msg = format!("{}: {}", error_context, e);
        log_error(&msg);
        JsValue::from_str(&msg)
    })
}

/// Serialize a value to JavaScript with automatic error handling
pub fn serialize<T: Serialize>(value: &T, error_context: &str) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| {
        let msg = format!("{}: {}", error_context, e);
        log_error(&msg);
        JsValue::from_str(&msg)
    })
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a bar position is within the score (or one past the end)
pub fn validate_position(position: usize, bar_count: usize) -> Result<(), String> {
    if position > bar_count {
        return Err(format!(
            "Bar position {} out of bounds (max: {})",
            position, bar_count
        ));
    }

    Ok(())
}

/// Validate an instrument name coming from JavaScript
pub fn validate_instrument_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Instrument name must not be empty".to_string());
    }
    Ok(())
}

// ============================================================================
// Result Conversion Helpers
// ============================================================================

/// Convert a validation error to a JsValue
pub fn validation_error(msg: impl Into<String>) -> JsValue {
    let msg = msg.into();
    log_error(&msg);
    JsValue::from_str(&msg)
}

/// Convert a score error into a JsValue carrying serialized diagnostics
///
/// Parse failures become an error mark at the offending offset; anything
/// else is passed through as a plain message. `bar` is None when the
/// failing line was headed for a bar that does not exist yet.
pub fn score_error(error: &ScoreError, bar: Option<BarId>, instrument: &str) -> JsValue {
    log_warn(&format!("{}: {}", instrument, error));
    match error.notation() {
        Some(notation) => {
            let mark = match bar {
                Some(bar) => error_mark(bar, instrument, notation),
                None => DiagnosticMark::new(
                    notation.offset(),
                    DiagnosticSeverity::Error,
                    notation.kind(),
                    notation.to_string(),
                )
                .for_instrument(instrument),
            };
            serialize(&Diagnostics::single(mark), "Failed to serialize diagnostics").unwrap_or_else(|e| e)
        }
        None => JsValue::from_str(&error.to_string()),
    }
}
