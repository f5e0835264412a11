//! Melodic lines and the cross-references between their slots

use num_rational::Ratio;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::duration::{Meter, NoteLength};
use super::event::{NoteEvent, RampDirection, SlotContent};
use super::instrument::{Clef, Instrument, InstrumentState};

/// Contiguous slot interval `[start, end]` played at `ratio` (actual : normal)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TupletRange {
    pub start: usize,
    pub end: usize,
    pub ratio: Ratio<u32>,
}

impl TupletRange {
    pub fn contains(&self, slot: usize) -> bool {
        (self.start..=self.end).contains(&slot)
    }

    /// Numeral printed on the bracket (the "actual" count)
    pub fn numeral(&self) -> String {
        self.ratio.numer().to_string()
    }
}

/// Slur or tie between two slots
///
/// An absent end continues into (or from) an adjacent bar.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlurLink {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl SlurLink {
    pub fn is_open_ended(&self) -> bool {
        self.start.is_none() || self.end.is_none()
    }
}

/// Crescendo or diminuendo between two slots
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DynamicRamp {
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub direction: RampDirection,
    pub from_level: u8,
    pub to_level: u8,
}

/// One instrument's content in one bar
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MelodicLine {
    pub events: Vec<NoteEvent>,

    #[serde(default)]
    pub tuplets: Vec<TupletRange>,

    #[serde(default)]
    pub slurs: Vec<SlurLink>,

    #[serde(default)]
    pub ties: Vec<SlurLink>,

    #[serde(default)]
    pub ramps: Vec<DynamicRamp>,

    pub clef: Clef,

    #[serde(default)]
    pub rhythm: bool,

    /// State handed to the next bar of the same instrument
    #[serde(default)]
    pub closing: InstrumentState,

    /// Generated full-bar rest rather than parsed text
    #[serde(default)]
    pub filler: bool,
}

impl MelodicLine {
    pub fn new(instrument: &Instrument) -> Self {
        Self {
            events: Vec::new(),
            tuplets: Vec::new(),
            slurs: Vec::new(),
            ties: Vec::new(),
            ramps: Vec::new(),
            clef: instrument.clef,
            rhythm: instrument.rhythm,
            closing: InstrumentState::default(),
            filler: false,
        }
    }

    /// A single rest lasting the whole bar
    pub fn full_rest(meter: Meter, instrument: &Instrument) -> Self {
        let mut line = Self::new(instrument);
        let units = meter.bar_duration();
        let mut rest = NoteEvent::new(SlotContent::Rest, NoteLength::new(units, 0), 0);
        rest.duration = units;
        rest.display_duration = units;
        line.events.push(rest);
        line.filler = true;
        line
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sum of slot durations in units
    pub fn total_duration(&self) -> u32 {
        self.events.iter().map(|e| e.duration).sum()
    }

    /// Onset of every slot from the bar start, in units
    pub fn onsets(&self) -> Vec<u32> {
        let mut onset = 0;
        self.events
            .iter()
            .map(|event| {
                let current = onset;
                onset += event.duration;
                current
            })
            .collect()
    }

    /// Tuplet range containing `slot`
    pub fn tuplet_at(&self, slot: usize) -> Option<&TupletRange> {
        self.tuplets.iter().find(|t| t.contains(slot))
    }

    /// Alteration in effect at the end of the bar for each (step, octave)
    pub fn final_alterations(&self) -> BTreeMap<(i8, i8), i8> {
        let mut state = BTreeMap::new();
        for event in &self.events {
            for pitch in event.content.pitches() {
                state.insert(pitch.staff_key(), pitch.alteration);
            }
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_rest_fills_the_bar() {
        let meter = Meter::parse("3/4").unwrap();
        let line = MelodicLine::full_rest(meter, &Instrument::new("viola"));
        assert_eq!(line.len(), 1);
        assert!(line.events[0].is_rest());
        assert_eq!(line.total_duration(), 192);
        assert!(line.filler);
    }

    #[test]
    fn test_tuplet_numeral_keeps_written_ratio() {
        let range = TupletRange {
            start: 0,
            end: 5,
            ratio: Ratio::new_raw(6, 4),
        };
        assert_eq!(range.numeral(), "6");
        assert!(range.contains(5));
        assert!(!range.contains(6));
    }
}
