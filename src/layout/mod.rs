//! Layout of one bar of one instrument
//!
//! The engine runs a fixed sequence of passes over a melodic line, each pass
//! reading the ink extents left by the earlier ones:
//!
//! 1. placement: slot x positions, noteheads and ledger lines
//! 2. stems: stem directions, beam groups and stem tips
//! 3. accidentals
//! 4. tuplet brackets
//! 5. articulations, then slurs, ties and glissandi
//! 6. ottava brackets
//! 7. text annotations
//! 8. dynamics and hairpins

pub mod accidentals;
pub mod articulations;
pub mod curves;
pub mod dynamics;
pub mod engine;
pub mod ottava;
pub mod placement;
pub mod record;
pub mod stems;
pub mod text;
pub mod tuplets;

// Re-export commonly used types
pub use engine::{LayoutContext, LayoutEngine};
pub use record::*;

use serde::{Deserialize, Serialize};

/// Configuration for layout calculations
///
/// All values are pixels. Missing fields fall back to the defaults, so a
/// partial JSON or YAML object is enough to override one setting.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Distance between two staff lines
    pub staff_space: f32,

    /// Width of one bar
    pub bar_width: f32,

    /// Space before the first slot
    pub left_padding: f32,

    /// Space after the last onset
    pub right_padding: f32,

    pub notehead_width: f32,
    pub stem_length: f32,

    pub accidental_width: f32,
    /// Gap between an accidental and its notehead
    pub accidental_gap: f32,

    /// Largest rise of a sloped beam per slot it spans
    pub beam_slope_step: f32,
    pub beam_thickness: f32,

    /// Clearance between ink and a tuplet bracket
    pub tuplet_gap: f32,
    /// Width left open in the bracket for the numeral
    pub tuplet_numeral_width: f32,
    pub tuplet_numeral_height: f32,

    pub articulation_gap: f32,
    /// Height of a single articulation glyph
    pub articulation_height: f32,

    pub slur_gap: f32,
    pub slur_min_height: f32,
    pub tie_height: f32,

    pub ottava_gap: f32,
    pub ottava_label_width: f32,
    pub ottava_height: f32,
    pub ottava_tick: f32,

    pub text_gap: f32,
    pub text_height: f32,

    pub dynamic_gap: f32,
    pub dynamic_width: f32,
    pub dynamic_height: f32,
    /// Gap between a hairpin and an abutting dynamic
    pub hairpin_gap: f32,
    pub hairpin_opening: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            staff_space: 8.0,
            bar_width: 240.0,
            left_padding: 12.0,
            right_padding: 8.0,
            notehead_width: 9.0,
            stem_length: 28.0,
            accidental_width: 8.0,
            accidental_gap: 2.0,
            beam_slope_step: 2.0,
            beam_thickness: 4.0,
            tuplet_gap: 6.0,
            tuplet_numeral_width: 8.0,
            tuplet_numeral_height: 8.0,
            articulation_gap: 4.0,
            articulation_height: 6.0,
            slur_gap: 4.0,
            slur_min_height: 6.0,
            tie_height: 4.0,
            ottava_gap: 6.0,
            ottava_label_width: 18.0,
            ottava_height: 10.0,
            ottava_tick: 6.0,
            text_gap: 4.0,
            text_height: 10.0,
            dynamic_gap: 8.0,
            dynamic_width: 14.0,
            dynamic_height: 10.0,
            hairpin_gap: 3.0,
            hairpin_opening: 8.0,
        }
    }
}

impl LayoutConfig {
    /// y of the middle staff line
    pub fn middle_y(&self) -> f32 {
        self.staff_space * 2.0
    }

    /// y of the bottom staff line
    pub fn bottom_y(&self) -> f32 {
        self.staff_space * 4.0
    }

    /// Vertical distance of one diatonic step
    pub fn step_height(&self) -> f32 {
        self.staff_space / 2.0
    }
}

/// Build a line for layout tests
#[cfg(test)]
pub(crate) fn test_line(text: &str, meter: crate::models::Meter, instrument: &crate::models::Instrument) -> crate::models::MelodicLine {
    use crate::parse::{build_line, expand, tokenize, BarContext};

    let tokens = tokenize(&expand(text).unwrap()).unwrap();
    let context = BarContext {
        meter,
        tempo: Default::default(),
    };
    build_line(&tokens, instrument, &Default::default(), context).unwrap().line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LayoutConfig = serde_json::from_str(r#"{"bar_width": 320}"#).unwrap();
        assert_eq!(config.bar_width, 320.0);
        assert_eq!(config.staff_space, 8.0);
        assert_eq!(config.bottom_y(), 32.0);
    }

    #[test]
    fn test_config_from_yaml() {
        let config: LayoutConfig = serde_yaml::from_str("staff_space: 10\nstem_length: 35\n").unwrap();
        assert_eq!(config.middle_y(), 20.0);
        assert_eq!(config.stem_length, 35.0);
    }
}
