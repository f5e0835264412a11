//! Pitch representation
//!
//! A pitch keeps two views of itself: the diatonic `natural` index used for
//! staff placement, and the `sounding` semitone value that also folds in the
//! instrument transposition and any accidental carried forward in the bar.

use serde::{Deserialize, Serialize};

/// Note letters in diatonic order
pub const LETTERS: [char; 7] = ['c', 'd', 'e', 'f', 'g', 'a', 'b'];

/// Semitone offset of each diatonic step above c
const PITCH_CLASSES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Semitone value of the reference octave's c (LilyPond's unmarked `c`)
const REFERENCE_C: i32 = 48;

/// How an accidental was written in the source text
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AccidentalMark {
    /// No suffix: takes whatever the bar has established for this step
    #[default]
    Default,
    /// One or two suffixes (`is`, `es`, `ih`, `eh`)
    Explicit,
    /// `!` suffix: always shows its accidental, natural included
    Forced,
}

/// What the renderer should draw in front of a notehead
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AccidentalDisplay {
    #[default]
    Hidden,
    /// Draw the glyph for this alteration (0 = natural sign)
    Shown(i8),
    /// Natural sign depends on the visually adjacent preceding bar
    Deferred,
}

/// Accidental glyphs, quarter-tones included
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum AccidentalGlyph {
    DoubleFlat,
    ThreeQuarterFlat,
    Flat,
    QuarterFlat,
    Natural,
    QuarterSharp,
    Sharp,
    ThreeQuarterSharp,
    DoubleSharp,
}

impl AccidentalGlyph {
    /// Glyph for an alteration in quarter-tones
    pub fn from_alteration(quarters: i8) -> Self {
        match quarters {
            i8::MIN..=-4 => AccidentalGlyph::DoubleFlat,
            -3 => AccidentalGlyph::ThreeQuarterFlat,
            -2 => AccidentalGlyph::Flat,
            -1 => AccidentalGlyph::QuarterFlat,
            0 => AccidentalGlyph::Natural,
            1 => AccidentalGlyph::QuarterSharp,
            2 => AccidentalGlyph::Sharp,
            3 => AccidentalGlyph::ThreeQuarterSharp,
            _ => AccidentalGlyph::DoubleSharp,
        }
    }
}

/// A single pitch
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Pitch {
    /// Diatonic step, 0 = c .. 6 = b
    pub step: i8,

    /// Alteration in quarter-tones (+2 = sharp)
    pub alteration: i8,

    /// Octave relative to the reference octave (`c'` = +1)
    pub octave: i8,

    /// How the accidental was written
    pub accidental: AccidentalMark,

    /// What the renderer draws in front of the notehead
    #[serde(default)]
    pub display: AccidentalDisplay,

    /// Diatonic staff index (`step + 7 * octave`), notation only
    pub natural: i32,

    /// Sounding value in semitones (c = 48), transposition included
    pub sounding: f32,
}

impl Pitch {
    pub fn new(step: i8, alteration: i8, octave: i8, accidental: AccidentalMark) -> Self {
        let mut pitch = Self {
            step,
            alteration,
            octave,
            accidental,
            display: AccidentalDisplay::Hidden,
            natural: step as i32 + 7 * octave as i32,
            sounding: 0.0,
        };
        pitch.refresh_sounding(0);
        pitch
    }

    /// Pitch used for pitchless durations on rhythm staves (middle line b')
    pub fn rhythm() -> Self {
        Self::new(6, 0, 1, AccidentalMark::Default)
    }

    /// Letter name of the step
    pub fn letter(&self) -> char {
        LETTERS[self.step.clamp(0, 6) as usize]
    }

    /// Alteration in semitones (quarter-tones give halves)
    pub fn semitones(&self) -> f32 {
        self.alteration as f32 / 2.0
    }

    /// Key used for accidental bookkeeping within a bar
    pub fn staff_key(&self) -> (i8, i8) {
        (self.step, self.octave)
    }

    /// Recompute `sounding` after alteration or transposition changes
    pub fn refresh_sounding(&mut self, transposition: i8) {
        let base = REFERENCE_C
            + PITCH_CLASSES[self.step.clamp(0, 6) as usize]
            + 12 * self.octave as i32
            + transposition as i32;
        self.sounding = base as f32 + self.semitones();
    }

    /// LilyPond-style spelling, e.g. `cis''`
    pub fn spelling(&self) -> String {
        let mut text = String::new();
        text.push(self.letter());
        let mut remaining = self.alteration;
        while remaining >= 2 {
            text.push_str("is");
            remaining -= 2;
        }
        while remaining <= -2 {
            text.push_str("es");
            remaining += 2;
        }
        match remaining {
            1 => text.push_str("ih"),
            -1 => text.push_str("eh"),
            _ => {}
        }
        let marks = if self.octave >= 0 { '\'' } else { ',' };
        for _ in 0..self.octave.unsigned_abs() {
            text.push(marks);
        }
        text
    }
}
