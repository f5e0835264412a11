//! Music model for the notation core
//!
//! Bars own one melodic line per instrument; lines are sequences of note
//! events (slots) plus the tuplet, slur, tie and ramp ranges between them.

pub mod bar;
pub mod duration;
pub mod event;
pub mod instrument;
pub mod line;
pub mod pitch;

// Re-export commonly used types
pub use bar::{Bar, BarId};
pub use duration::{Meter, NoteLength, Tempo, MINDUR, QUARTER};
pub use event::{
    Annotation, Articulation, Dynamic, NoteEvent, Placement, RampDirection, RampRole, SlotContent,
};
pub use instrument::{Clef, Instrument, InstrumentRegistry, InstrumentState, RegistryError};
pub use line::{DynamicRamp, MelodicLine, SlurLink, TupletRange};
pub use pitch::{AccidentalDisplay, AccidentalGlyph, AccidentalMark, Pitch};
