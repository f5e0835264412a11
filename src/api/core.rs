//! JavaScript-facing score API
//!
//! The score lives in WASM-owned storage; JavaScript addresses bars by the
//! opaque ids handed back from `insertBar` and `declareBars`, and asks for
//! geometry one bar at a time.

use std::sync::{Mutex, MutexGuard};

use lazy_static::lazy_static;
use wasm_bindgen::prelude::*;

use super::helpers::{deserialize, score_error, serialize, validate_instrument_name, validate_position, validation_error};
use crate::layout::{LayoutConfig, LayoutEngine};
use crate::models::{BarId, InstrumentRegistry};
use crate::parse::expand;
use crate::structure::Score;
use crate::{wasm_error, wasm_info, wasm_log, wasm_warn};

// WASM-owned score storage (canonical source of truth)
lazy_static! {
    static ref SCORE: Mutex<Option<Score>> = Mutex::new(None);
    static ref ENGINE: Mutex<LayoutEngine> = Mutex::new(LayoutEngine::default());
}

fn lock_score() -> Result<MutexGuard<'static, Option<Score>>, JsValue> {
    SCORE.lock().map_err(|_| validation_error("Score storage is poisoned"))
}

fn with_score<T>(f: impl FnOnce(&mut Score) -> Result<T, JsValue>) -> Result<T, JsValue> {
    let mut guard = lock_score()?;
    match guard.as_mut() {
        Some(score) => f(score),
        None => {
            wasm_warn!("No score loaded");
            Err(JsValue::from_str("No score loaded"))
        }
    }
}

/// Create an empty score for the instruments in a YAML registry
///
/// # Returns
/// The registry as parsed, so the UI can list instrument names
#[wasm_bindgen(js_name = loadInstruments)]
pub fn load_instruments(yaml: &str) -> Result<JsValue, JsValue> {
    wasm_info!("loadInstruments called ({} bytes)", yaml.len());

    let registry = InstrumentRegistry::from_yaml(yaml).map_err(|e| {
        wasm_error!("Instrument registry error: {}", e);
        JsValue::from_str(&e.to_string())
    })?;

    let mut guard = lock_score()?;
    match guard.as_mut() {
        Some(score) => score.set_registry(registry.clone()),
        None => *guard = Some(Score::new(registry.clone())),
    }

    wasm_info!("loadInstruments completed: {} instruments", registry.len());
    serialize(&registry, "Failed to serialize registry")
}

/// Insert an empty bar at a score position
///
/// # Returns
/// The new bar's id
#[wasm_bindgen(js_name = insertBar)]
pub fn insert_bar(position: usize) -> Result<u32, JsValue> {
    wasm_log!("insertBar called: position={}", position);
    with_score(|score| {
        validate_position(position, score.bars().len()).map_err(validation_error)?;
        Ok(score.insert_bar(position).0)
    })
}

#[wasm_bindgen(js_name = removeBar)]
pub fn remove_bar(bar_id: u32) -> Result<(), JsValue> {
    wasm_log!("removeBar called: bar_id={}", bar_id);
    with_score(|score| {
        score
            .remove_bar(BarId(bar_id))
            .map(|_| ())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    })
}

/// Bar ids in score order
#[wasm_bindgen(js_name = getBarOrder)]
pub fn get_bar_order() -> Result<js_sys::Uint32Array, JsValue> {
    with_score(|score| {
        let ids: Vec<u32> = score.bars().order().iter().map(|id| id.0).collect();
        Ok(js_sys::Uint32Array::from(&ids[..]))
    })
}

/// Parse one instrument's line for one bar
///
/// # Returns
/// The parsed melodic line. On failure the bar is unchanged and the error
/// value is a serialized `Diagnostics` with one error mark.
#[wasm_bindgen(js_name = setLine)]
pub fn set_line(bar_id: u32, instrument: &str, text: &str) -> Result<JsValue, JsValue> {
    wasm_info!("setLine called: bar={}, instrument='{}', text='{}'", bar_id, instrument, text);
    validate_instrument_name(instrument).map_err(validation_error)?;

    let bar = BarId(bar_id);
    with_score(|score| match score.set_line(bar, instrument, text) {
        Ok(line) => serialize(line, "Failed to serialize line"),
        Err(e) => Err(score_error(&e, Some(bar), instrument)),
    })
}

/// Fill consecutive bars from a `\bars a | b | c` declaration
///
/// # Returns
/// The ids of the bars written, in order
#[wasm_bindgen(js_name = declareBars)]
pub fn declare_bars(instrument: &str, position: usize, text: &str) -> Result<JsValue, JsValue> {
    wasm_info!("declareBars called: instrument='{}', position={}", instrument, position);
    validate_instrument_name(instrument).map_err(validation_error)?;

    with_score(|score| {
        validate_position(position, score.bars().len()).map_err(validation_error)?;
        let mut cursor = score.cursor(instrument, position);
        let at = score.bars().at(position);
        match score.declare_bars(instrument, text, &mut cursor) {
            Ok(ids) => serialize(&ids, "Failed to serialize bar ids"),
            Err(e) => Err(score_error(&e, at, instrument)),
        }
    })
}

/// Replace the layout configuration; missing fields take their defaults
#[wasm_bindgen(js_name = setLayoutConfig)]
pub fn set_layout_config(config_js: JsValue) -> Result<(), JsValue> {
    let config: LayoutConfig = deserialize(config_js, "Invalid layout config")?;
    let mut engine = ENGINE.lock().map_err(|_| validation_error("Layout engine is poisoned"))?;
    *engine = LayoutEngine::new(config);
    wasm_log!("setLayoutConfig applied");
    Ok(())
}

/// Compute the geometry of one bar of one instrument
///
/// `visible` is the list of bar ids currently drawn, in display order; only
/// those neighbours are consulted for ties, slurs and deferred naturals.
#[wasm_bindgen(js_name = layoutBar)]
pub fn layout_bar(bar_id: u32, instrument: &str, visible_js: JsValue) -> Result<JsValue, JsValue> {
    wasm_log!("layoutBar called: bar={}, instrument='{}'", bar_id, instrument);
    let visible: Vec<BarId> = deserialize(visible_js, "Invalid visible bar list")?;
    let engine = ENGINE
        .lock()
        .map_err(|_| validation_error("Layout engine is poisoned"))?
        .clone();

    with_score(|score| {
        let layout = score
            .layout_bar(BarId(bar_id), instrument, &visible, &engine)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        if !layout.diagnostics.is_empty() {
            wasm_warn!("{} {}: {} open links", layout.bar, instrument, layout.diagnostics.marks.len());
        }
        serialize(&layout, "Failed to serialize layout")
    })
}

/// Current snapshot of one bar
#[wasm_bindgen(js_name = getBar)]
pub fn get_bar(bar_id: u32) -> Result<JsValue, JsValue> {
    with_score(|score| {
        let bar = score
            .bar(BarId(bar_id))
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        serialize(bar, "Failed to serialize bar")
    })
}

/// Expand repetition shorthand only, for previewing what a line becomes
#[wasm_bindgen(js_name = expandLine)]
pub fn expand_line(text: &str) -> Result<String, JsValue> {
    expand(text).map(|expansion| expansion.text).map_err(|e| {
        wasm_warn!("expandLine failed: {}", e);
        JsValue::from_str(&e.to_string())
    })
}
