//! Note events: one vertical onset (slot) of a melodic line

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::duration::NoteLength;
use super::pitch::Pitch;

/// Content of a slot
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum SlotContent {
    Rest,
    Single(Pitch),
    Chord(Vec<Pitch>),
}

impl SlotContent {
    /// Pitches of the slot, lowest index first as written
    pub fn pitches(&self) -> &[Pitch] {
        match self {
            SlotContent::Rest => &[],
            SlotContent::Single(pitch) => std::slice::from_ref(pitch),
            SlotContent::Chord(pitches) => pitches,
        }
    }

    pub fn pitches_mut(&mut self) -> &mut [Pitch] {
        match self {
            SlotContent::Rest => Default::default(),
            SlotContent::Single(pitch) => std::slice::from_mut(pitch),
            SlotContent::Chord(pitches) => pitches,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, SlotContent::Rest)
    }
}

/// Articulation marks, serialised as their numeric code (1..7)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde_repr::Serialize_repr, serde_repr::Deserialize_repr)]
#[repr(u8)]
pub enum Articulation {
    /// `-.`
    Staccato = 1,
    /// `--`
    Tenuto = 2,
    /// `->`
    Accent = 3,
    /// `-^`
    Marcato = 4,
    /// `-!`
    Staccatissimo = 5,
    /// `-+`
    Stopped = 6,
    /// `-_` (tenuto line plus staccato dot)
    Portato = 7,
}

impl Articulation {
    /// Articulation for the symbol following `-`
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '.' => Some(Articulation::Staccato),
            '-' => Some(Articulation::Tenuto),
            '>' => Some(Articulation::Accent),
            '^' => Some(Articulation::Marcato),
            '!' => Some(Articulation::Staccatissimo),
            '+' => Some(Articulation::Stopped),
            '_' => Some(Articulation::Portato),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Number of stacked glyphs used to draw the mark
    pub fn glyph_count(self) -> u8 {
        match self {
            Articulation::Portato => 2,
            _ => 1,
        }
    }
}

/// Absolute dynamic names with their coarse level (0..7)
static DYNAMIC_LEVELS: Lazy<HashMap<&'static str, u8>> = Lazy::new(|| {
    [
        ("ppp", 0),
        ("pp", 1),
        ("p", 2),
        ("mp", 3),
        ("mf", 4),
        ("f", 5),
        ("ff", 6),
        ("fff", 7),
        ("sfz", 6),
    ]
    .into_iter()
    .collect()
});

/// Fine sounding loudness (velocity scale) for each coarse level
pub const LOUDNESS: [f32; 8] = [16.0, 33.0, 49.0, 64.0, 80.0, 96.0, 112.0, 127.0];

/// Level in effect before any dynamic is written
pub const DEFAULT_LEVEL: u8 = 4;

pub const MAX_LEVEL: u8 = 7;

/// An absolute dynamic mark such as `\mf`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Dynamic {
    pub name: String,
    pub level: u8,
}

impl Dynamic {
    /// Look up a dynamic by its name without the backslash
    pub fn from_name(name: &str) -> Option<Self> {
        DYNAMIC_LEVELS.get(name).map(|&level| Self {
            name: name.to_string(),
            level,
        })
    }

    pub fn loudness(&self) -> f32 {
        LOUDNESS[self.level.min(MAX_LEVEL) as usize]
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RampDirection {
    Crescendo,
    Diminuendo,
}

impl RampDirection {
    /// Level reached by a ramp stopped with `\!`
    pub fn default_target(self, from: u8) -> u8 {
        match self {
            RampDirection::Crescendo => (from + 1).min(MAX_LEVEL),
            RampDirection::Diminuendo => from.saturating_sub(1),
        }
    }
}

/// Role a slot plays in a dynamic ramp
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RampRole {
    Start,
    End,
    /// Ends one ramp and starts the next
    Both,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Placement {
    Above,
    Below,
}

impl Placement {
    /// +1 above the staff, -1 below
    pub fn sign(self) -> i8 {
        match self {
            Placement::Above => 1,
            Placement::Below => -1,
        }
    }
}

/// Free text attached with `^"..."`, `_"..."` or `-"..."`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Annotation {
    pub text: String,
    pub placement: Placement,
}

/// One slot of a melodic line
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NoteEvent {
    pub content: SlotContent,

    /// Duration in units, dot- and tuplet-adjusted
    pub duration: u32,

    /// Duration with the tuplet adjustment undone (for rendering)
    pub display_duration: u32,

    /// Written length (undotted base plus dots)
    pub length: NoteLength,

    pub dots: u8,

    /// A glissando starts at this slot
    #[serde(default)]
    pub glissando: bool,

    /// Octave shift level in effect (0 = none, 1 = 8va, -1 = 8vb, 2 = 15ma)
    #[serde(default)]
    pub ottava: i8,

    /// Indices into the line's slurs opened at this slot
    #[serde(default)]
    pub slur_open: Vec<usize>,

    /// Indices into the line's slurs closed at this slot
    #[serde(default)]
    pub slur_close: Vec<usize>,

    /// Tied to the next slot
    #[serde(default)]
    pub tie: bool,

    #[serde(default)]
    pub articulations: Vec<Articulation>,

    #[serde(default)]
    pub dynamic: Option<Dynamic>,

    #[serde(default)]
    pub ramp: Option<RampRole>,

    #[serde(default)]
    pub annotation: Option<Annotation>,

    /// Coarse display level 0..7 after ramp interpolation
    pub level: u8,

    /// Fine sounding loudness after ramp interpolation
    pub loudness: f32,

    /// Byte offset of the slot's token in the original line
    pub offset: usize,
}

impl NoteEvent {
    pub fn new(content: SlotContent, length: NoteLength, offset: usize) -> Self {
        let units = length.units();
        Self {
            content,
            duration: units,
            display_duration: units,
            length,
            dots: length.dots,
            glissando: false,
            ottava: 0,
            slur_open: Vec::new(),
            slur_close: Vec::new(),
            tie: false,
            articulations: Vec::new(),
            dynamic: None,
            ramp: None,
            annotation: None,
            level: DEFAULT_LEVEL,
            loudness: LOUDNESS[DEFAULT_LEVEL as usize],
            offset,
        }
    }

    /// Articulation code of the first mark (0 = none)
    pub fn articulation(&self) -> u8 {
        self.articulations.first().map(|a| a.code()).unwrap_or(0)
    }

    pub fn is_rest(&self) -> bool {
        self.content.is_rest()
    }

    /// Mark this slot as a ramp boundary, merging with an existing role
    pub fn add_ramp_role(&mut self, role: RampRole) {
        self.ramp = Some(match (self.ramp, role) {
            (None, role) => role,
            (Some(RampRole::Both), _) => RampRole::Both,
            (Some(existing), role) if existing == role => existing,
            _ => RampRole::Both,
        });
    }
}
