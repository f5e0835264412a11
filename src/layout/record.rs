//! Layout record: the geometry of one bar of one instrument
//!
//! Coordinates are pixels. `x` runs from the left edge of the bar; `y` grows
//! downwards with 0 on the top staff line, so "above" means a smaller `y`.
//! Anything that may be absent is an `Option`.

use serde::{Deserialize, Serialize};

use crate::models::{AccidentalGlyph, Articulation, Placement, RampDirection};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StemDirection {
    Up,
    Down,
}

impl StemDirection {
    /// -1 for up (towards smaller y), +1 for down
    pub fn sign(self) -> f32 {
        match self {
            StemDirection::Up => -1.0,
            StemDirection::Down => 1.0,
        }
    }
}

/// Vertical range already covered by ink at a slot (`top <= bottom`)
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct InkExtent {
    pub top: f32,
    pub bottom: f32,
}

impl InkExtent {
    pub fn new(top: f32, bottom: f32) -> Self {
        Self { top, bottom }
    }

    /// Grow to include `y`
    pub fn include(&mut self, y: f32) {
        self.top = self.top.min(y);
        self.bottom = self.bottom.max(y);
    }

    /// Outer edge on one side
    pub fn edge(&self, above: bool) -> f32 {
        if above {
            self.top
        } else {
            self.bottom
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Notehead {
    pub y: f32,
    /// Diatonic index as displayed (ottava already taken out)
    pub staff_index: i32,
    /// Accidental drawn before the head, if any
    pub accidental: Option<AccidentalGlyph>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SlotGeometry {
    pub x: f32,
    /// Heads in written order; empty for rests
    pub heads: Vec<Notehead>,
    /// Centre of the rest glyph
    pub rest_y: Option<f32>,
    pub stem: Option<StemDirection>,
    pub stem_tip: Option<f32>,
    /// Beams (or flags when unbeamed) carried by the stem
    pub beam_count: u8,
    pub ledger_above: u8,
    pub ledger_below: u8,
    pub ink: InkExtent,
}

impl SlotGeometry {
    pub fn is_rest(&self) -> bool {
        self.heads.is_empty()
    }

    /// Highest (smallest y) and lowest notehead positions
    pub fn head_span(&self) -> Option<(f32, f32)> {
        let top = self.heads.iter().map(|h| h.y).fold(None, |acc: Option<f32>, y| Some(acc.map_or(y, |a| a.min(y))))?;
        let bottom = self.heads.iter().map(|h| h.y).fold(top, f32::max);
        Some((top, bottom))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BeamGroup {
    /// First and last slot, inclusive
    pub start: usize,
    pub end: usize,
    pub direction: StemDirection,
    pub levels: u8,
    pub x_start: f32,
    pub x_end: f32,
    pub y_start: f32,
    pub y_end: f32,
}

impl BeamGroup {
    /// Height of the beam line at `x`
    pub fn y_at(&self, x: f32) -> f32 {
        if (self.x_end - self.x_start).abs() < f32::EPSILON {
            return self.y_start;
        }
        self.y_start + (self.y_end - self.y_start) * (x - self.x_start) / (self.x_end - self.x_start)
    }

    pub fn is_flat(&self) -> bool {
        (self.y_end - self.y_start).abs() < f32::EPSILON
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AccidentalPlacement {
    pub slot: usize,
    /// Index into the slot's heads
    pub head: usize,
    pub glyph: AccidentalGlyph,
    pub x: f32,
    pub y: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TupletBracket {
    pub start: usize,
    pub end: usize,
    pub numeral: String,
    pub above: bool,
    /// False when the numeral alone is drawn (the range is one beam group)
    pub bracket: bool,
    pub x_start: f32,
    pub x_end: f32,
    pub y_start: f32,
    pub y_end: f32,
    /// The bracket line is broken between these x positions for the numeral
    pub gap_start: f32,
    pub gap_end: f32,
    pub numeral_x: f32,
    pub numeral_y: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ArticulationPlacement {
    pub slot: usize,
    pub articulation: Articulation,
    pub x: f32,
    pub y: f32,
    pub above: bool,
}

/// Cubic Bézier used for slurs and ties
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Curve {
    /// Slots joined; `None` runs to the bar edge
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub above: bool,
    pub x0: f32,
    pub y0: f32,
    pub cp1x: f32,
    pub cp1y: f32,
    pub cp2x: f32,
    pub cp2y: f32,
    pub x1: f32,
    pub y1: f32,
}

/// Straight glissando line between two noteheads
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GlissandoLine {
    pub slot: usize,
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OttavaBracket {
    pub start: usize,
    pub end: usize,
    pub level: i8,
    pub label: String,
    pub above: bool,
    pub x_start: f32,
    pub line_start: f32,
    pub x_end: f32,
    pub y: f32,
    /// Signed length of the closing tick (towards the staff)
    pub tick: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TextPlacement {
    pub slot: usize,
    pub text: String,
    pub placement: Placement,
    pub x: f32,
    /// Baseline
    pub y: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DynamicPlacement {
    pub slot: usize,
    pub name: String,
    pub x: f32,
    /// Vertical centre
    pub y: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Hairpin {
    pub direction: RampDirection,
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub x_start: f32,
    pub x_end: f32,
    pub y_start: f32,
    pub y_end: f32,
    /// Opening at the wide end
    pub opening: f32,
}

/// Complete geometry for one bar of one instrument
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct LayoutRecord {
    pub width: f32,
    pub slots: Vec<SlotGeometry>,
    pub beams: Vec<BeamGroup>,
    pub accidentals: Vec<AccidentalPlacement>,
    pub tuplets: Vec<TupletBracket>,
    pub articulations: Vec<ArticulationPlacement>,
    pub slurs: Vec<Curve>,
    pub ties: Vec<Curve>,
    pub glissandi: Vec<GlissandoLine>,
    pub ottavas: Vec<OttavaBracket>,
    pub texts: Vec<TextPlacement>,
    pub dynamics: Vec<DynamicPlacement>,
    pub hairpins: Vec<Hairpin>,
}

impl LayoutRecord {
    /// Beam group containing `slot`
    pub fn beam_of(&self, slot: usize) -> Option<&BeamGroup> {
        self.beams.iter().find(|b| (b.start..=b.end).contains(&slot))
    }

    /// Overall ink extent of the bar
    pub fn extent(&self) -> Option<InkExtent> {
        let mut slots = self.slots.iter();
        let first = slots.next()?.ink;
        Some(slots.fold(first, |mut acc, slot| {
            acc.include(slot.ink.top);
            acc.include(slot.ink.bottom);
            acc
        }))
    }
}
