//! Event builder
//!
//! Interprets a token stream into one bar's melodic line. The builder is a
//! pure function of (tokens, instrument, prior instrument state, bar meter):
//! on error nothing is returned and the caller keeps the bar as it was.
//!
//! Slur, ramp and tuplet positions are recorded against token indices while
//! scanning and rebased into slot indices through the [`ControlLedger`] once
//! the line is complete.

use num_rational::Ratio;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::note::PostEvent;
use super::resolve::{resolve_accidentals, ControlLedger};
use super::tokens::{Token, TokenKind};
use crate::models::event::LOUDNESS;
use crate::models::{
    Clef, DynamicRamp, Instrument, InstrumentState, Meter, MelodicLine, NoteEvent, NoteLength, Pitch, RampDirection,
    RampRole, SlotContent, SlurLink, Tempo, TupletRange,
};

#[derive(Error, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum BuildError {
    #[error("no duration to carry into the first note")]
    MissingDuration { offset: usize },

    #[error("a bare duration needs a rhythm instrument")]
    DurationWithoutPitch { offset: usize },

    #[error("chord notes take their duration after '>'")]
    DurationInsideChord { offset: usize },

    #[error("rests cannot be part of a chord")]
    RestInsideChord { offset: usize },

    #[error("chord has no notes")]
    EmptyChord { offset: usize },

    #[error("chord is missing its closing '>'")]
    UnterminatedChord { offset: usize },

    #[error("nothing before this to attach to")]
    DanglingPostEvent { offset: usize },

    #[error("slur closed but never opened")]
    UnmatchedSlurClose { offset: usize },

    #[error("\\! without an open crescendo or diminuendo")]
    UnmatchedRampStop { offset: usize },

    #[error("tuplet is missing its '{{' group")]
    TupletWithoutGroup { offset: usize },

    #[error("tuplets cannot be nested")]
    NestedTuplet { offset: usize },

    #[error("tuplet group is missing its '}}'")]
    UnterminatedTuplet { offset: usize },

    #[error("tuplet group has no notes")]
    EmptyTuplet { offset: usize },

    #[error("tuplet refers to slots the bar does not have")]
    TupletOutOfRange { offset: usize },

    #[error("'{{' outside a tuplet")]
    StrayGroupOpen { offset: usize },

    #[error("'}}' without an open group")]
    StrayGroupClose { offset: usize },

    #[error("'|' only separates bars in a multi-bar declaration")]
    BarSeparatorInLine { offset: usize },

    #[error("bar lasts {actual} units but the meter needs {expected}")]
    BarLength { expected: u32, actual: u32, offset: usize },

    #[error("\\time {meter} conflicts with the other instruments' {existing}")]
    MeterConflict { meter: Meter, existing: Meter, offset: usize },
}

impl BuildError {
    /// Byte offset in the original line
    pub fn offset(&self) -> usize {
        match self {
            BuildError::MissingDuration { offset }
            | BuildError::DurationWithoutPitch { offset }
            | BuildError::DurationInsideChord { offset }
            | BuildError::RestInsideChord { offset }
            | BuildError::EmptyChord { offset }
            | BuildError::UnterminatedChord { offset }
            | BuildError::DanglingPostEvent { offset }
            | BuildError::UnmatchedSlurClose { offset }
            | BuildError::UnmatchedRampStop { offset }
            | BuildError::TupletWithoutGroup { offset }
            | BuildError::NestedTuplet { offset }
            | BuildError::UnterminatedTuplet { offset }
            | BuildError::EmptyTuplet { offset }
            | BuildError::TupletOutOfRange { offset }
            | BuildError::StrayGroupOpen { offset }
            | BuildError::StrayGroupClose { offset }
            | BuildError::BarSeparatorInLine { offset }
            | BuildError::BarLength { offset, .. }
            | BuildError::MeterConflict { offset, .. } => *offset,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BuildError::MissingDuration { .. } => "missing_duration",
            BuildError::DurationWithoutPitch { .. } => "duration_without_pitch",
            BuildError::DurationInsideChord { .. } => "duration_inside_chord",
            BuildError::RestInsideChord { .. } => "rest_inside_chord",
            BuildError::EmptyChord { .. } => "empty_chord",
            BuildError::UnterminatedChord { .. } => "unterminated_chord",
            BuildError::DanglingPostEvent { .. } => "dangling_post_event",
            BuildError::UnmatchedSlurClose { .. } => "slur_orphan_end",
            BuildError::UnmatchedRampStop { .. } => "ramp_orphan_end",
            BuildError::TupletWithoutGroup { .. } => "tuplet_without_group",
            BuildError::NestedTuplet { .. } => "nested_tuplet",
            BuildError::UnterminatedTuplet { .. } => "unterminated_tuplet",
            BuildError::EmptyTuplet { .. } => "empty_tuplet",
            BuildError::TupletOutOfRange { .. } => "tuplet_out_of_range",
            BuildError::StrayGroupOpen { .. } => "stray_group_open",
            BuildError::StrayGroupClose { .. } => "stray_group_close",
            BuildError::BarSeparatorInLine { .. } => "bar_separator",
            BuildError::BarLength { .. } => "bar_length",
            BuildError::MeterConflict { .. } => "meter_conflict",
        }
    }
}

/// Meter and tempo the bar had before this line was read
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarContext {
    pub meter: Meter,
    pub tempo: Tempo,
}

/// Result of building one line
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BuiltLine {
    pub line: MelodicLine,
    /// Meter after any `\time` in the line
    pub meter: Meter,
    /// Tempo after any `\tempo` in the line
    pub tempo: Tempo,
    /// Offset of the `\time` directive, when the line has one
    pub time_offset: Option<usize>,
    pub tempo_changed: bool,
}

#[derive(Clone, Copy, Debug)]
struct RawLink {
    start: Option<usize>,
    end: Option<usize>,
}

#[derive(Clone, Copy, Debug)]
struct RawRamp {
    start: Option<usize>,
    end: Option<usize>,
    direction: RampDirection,
    from_level: u8,
    to_level: Option<u8>,
}

struct OpenChord {
    head: usize,
    offset: usize,
    pitches: Vec<Pitch>,
    post: Vec<PostEvent>,
}

/// Build a melodic line from tokens
pub fn build_line(
    tokens: &[Token],
    instrument: &Instrument,
    prior: &InstrumentState,
    context: BarContext,
) -> Result<BuiltLine, BuildError> {
    let ledger = ControlLedger::scan(tokens);
    let tuplets = scan_tuplets(tokens, &ledger)?;
    let mut builder = LineBuilder::new(instrument, prior, context);

    for (index, token) in tokens.iter().enumerate() {
        builder.accept(index, token)?;
    }

    builder.finish(tokens, &ledger, tuplets)
}

/// Collect tuplet ranges up front, in slot space
fn scan_tuplets(tokens: &[Token], ledger: &ControlLedger) -> Result<Vec<(TupletRange, usize)>, BuildError> {
    let mut ranges = Vec::new();
    // (directive token index, actual, normal, origin)
    let mut open: Option<(usize, u32, u32, usize)> = None;

    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Tuplet { actual, normal } => {
                if open.is_some() {
                    return Err(BuildError::NestedTuplet { offset: token.origin });
                }
                if !matches!(tokens.get(index + 1).map(|t| &t.kind), Some(TokenKind::GroupOpen)) {
                    return Err(BuildError::TupletWithoutGroup { offset: token.origin });
                }
                open = Some((index, actual, normal, token.origin));
            }
            TokenKind::GroupOpen => match open {
                Some((directive, ..)) if directive + 1 == index => {}
                Some(_) => return Err(BuildError::NestedTuplet { offset: token.origin }),
                None => return Err(BuildError::StrayGroupOpen { offset: token.origin }),
            },
            TokenKind::GroupClose => {
                let (directive, actual, normal, origin) =
                    open.take().ok_or(BuildError::StrayGroupClose { offset: token.origin })?;
                let mut heads = (directive + 2..index).filter(|&t| !ledger.is_removed(t));
                let first = heads.next().ok_or(BuildError::EmptyTuplet { offset: origin })?;
                let last = heads.last().unwrap_or(first);
                ranges.push((
                    TupletRange {
                        start: ledger.rebase(first),
                        end: ledger.rebase(last),
                        ratio: Ratio::new_raw(actual, normal),
                    },
                    origin,
                ));
            }
            _ => {}
        }
    }

    if let Some((.., origin)) = open {
        return Err(BuildError::UnterminatedTuplet { offset: origin });
    }
    Ok(ranges)
}

struct LineBuilder<'a> {
    instrument: &'a Instrument,
    prior: &'a InstrumentState,
    events: Vec<NoteEvent>,
    /// Token index heading each slot
    heads: Vec<usize>,
    last_length: Option<NoteLength>,
    ottava: i8,
    level: u8,
    slurs: Vec<RawLink>,
    open_slurs: Vec<usize>,
    carried_slurs: usize,
    ramps: Vec<RawRamp>,
    open_ramp: Option<usize>,
    chord: Option<OpenChord>,
    clef: Clef,
    meter: Meter,
    tempo: Tempo,
    time_offset: Option<usize>,
    tempo_changed: bool,
}

impl<'a> LineBuilder<'a> {
    fn new(instrument: &'a Instrument, prior: &'a InstrumentState, context: BarContext) -> Self {
        let mut ramps = Vec::new();
        let mut open_ramp = None;
        if let Some(direction) = prior.open_ramp {
            ramps.push(RawRamp {
                start: None,
                end: None,
                direction,
                from_level: prior.level,
                to_level: None,
            });
            open_ramp = Some(0);
        }

        Self {
            instrument,
            prior,
            events: Vec::new(),
            heads: Vec::new(),
            last_length: prior.last_length,
            ottava: 0,
            level: prior.level,
            slurs: Vec::new(),
            open_slurs: Vec::new(),
            carried_slurs: prior.open_slurs,
            ramps,
            open_ramp,
            chord: None,
            clef: instrument.clef,
            meter: context.meter,
            tempo: context.tempo,
            time_offset: None,
            tempo_changed: false,
        }
    }

    fn accept(&mut self, index: usize, token: &Token) -> Result<(), BuildError> {
        let offset = token.origin;

        match &token.kind {
            TokenKind::Note(word) => {
                let pitch = Pitch::new(word.step, word.alteration, word.octave, word.mark);
                if let Some(chord) = self.chord.as_mut() {
                    if word.suffix.length.is_some() {
                        return Err(BuildError::DurationInsideChord { offset });
                    }
                    chord.pitches.push(pitch);
                    chord.post.extend(word.suffix.post.iter().cloned());
                } else {
                    let length = self.length(word.suffix.length, offset)?;
                    self.push_slot(index, SlotContent::Single(pitch), length, offset);
                    self.attach(&word.suffix.post, offset)?;
                }
            }
            TokenKind::Rest(suffix) => {
                if self.chord.is_some() {
                    return Err(BuildError::RestInsideChord { offset });
                }
                let length = self.length(suffix.length, offset)?;
                self.push_slot(index, SlotContent::Rest, length, offset);
                self.attach(&suffix.post, offset)?;
            }
            TokenKind::Duration(suffix) => {
                if !self.instrument.rhythm {
                    return Err(BuildError::DurationWithoutPitch { offset });
                }
                if self.chord.is_some() {
                    return Err(BuildError::DurationInsideChord { offset });
                }
                let length = self.length(suffix.length, offset)?;
                self.push_slot(index, SlotContent::Single(Pitch::rhythm()), length, offset);
                self.attach(&suffix.post, offset)?;
            }
            TokenKind::ChordStart => {
                self.chord = Some(OpenChord {
                    head: index,
                    offset,
                    pitches: Vec::new(),
                    post: Vec::new(),
                });
            }
            TokenKind::ChordEnd(suffix) => {
                let chord = self.chord.take().ok_or(BuildError::EmptyChord { offset })?;
                if chord.pitches.is_empty() {
                    return Err(BuildError::EmptyChord { offset: chord.offset });
                }
                let length = self.length(suffix.length, offset)?;
                let content = if chord.pitches.len() == 1 {
                    SlotContent::Single(chord.pitches[0].clone())
                } else {
                    SlotContent::Chord(chord.pitches)
                };
                self.push_slot(chord.head, content, length, chord.offset);
                self.attach(&chord.post, offset)?;
                self.attach(&suffix.post, offset)?;
            }
            TokenKind::PostEvent(post) => {
                if let Some(chord) = self.chord.as_mut() {
                    chord.post.extend(post.iter().cloned());
                } else {
                    if self.events.is_empty() {
                        return Err(BuildError::DanglingPostEvent { offset });
                    }
                    self.attach(post, offset)?;
                }
            }
            TokenKind::Ottava(level) => self.ottava = *level,
            TokenKind::Clef(clef) => self.clef = *clef,
            TokenKind::Time(meter) => {
                self.meter = *meter;
                self.time_offset = Some(offset);
            }
            TokenKind::Tempo(tempo) => {
                self.tempo = *tempo;
                self.tempo_changed = true;
            }
            TokenKind::BarSeparator => return Err(BuildError::BarSeparatorInLine { offset }),
            // Tuplet structure was collected before the scan
            TokenKind::Tuplet { .. } | TokenKind::GroupOpen | TokenKind::GroupClose => {}
        }
        Ok(())
    }

    /// Written length, or the carried one
    fn length(&mut self, written: Option<NoteLength>, offset: usize) -> Result<NoteLength, BuildError> {
        match written {
            Some(length) => {
                self.last_length = Some(length);
                Ok(length)
            }
            None => self.last_length.ok_or(BuildError::MissingDuration { offset }),
        }
    }

    fn push_slot(&mut self, head: usize, content: SlotContent, length: NoteLength, offset: usize) {
        let mut event = NoteEvent::new(content, length, offset);
        event.ottava = self.ottava;
        self.events.push(event);
        self.heads.push(head);
    }

    /// Attach post-events to the most recent slot
    fn attach(&mut self, post: &[PostEvent], offset: usize) -> Result<(), BuildError> {
        if post.is_empty() {
            return Ok(());
        }
        let slot = self.events.len().checked_sub(1).ok_or(BuildError::DanglingPostEvent { offset })?;
        let head = self.heads[slot];

        for event in post {
            match event {
                PostEvent::Tie => self.events[slot].tie = true,
                PostEvent::SlurOpen => {
                    let id = self.slurs.len();
                    self.slurs.push(RawLink {
                        start: Some(head),
                        end: None,
                    });
                    self.open_slurs.push(id);
                    self.events[slot].slur_open.push(id);
                }
                PostEvent::SlurClose => {
                    let id = match self.open_slurs.pop() {
                        Some(id) => {
                            self.slurs[id].end = Some(head);
                            id
                        }
                        None if self.carried_slurs > 0 => {
                            self.carried_slurs -= 1;
                            self.slurs.push(RawLink {
                                start: None,
                                end: Some(head),
                            });
                            self.slurs.len() - 1
                        }
                        None => return Err(BuildError::UnmatchedSlurClose { offset }),
                    };
                    self.events[slot].slur_close.push(id);
                }
                PostEvent::Dynamic(dynamic) => {
                    self.events[slot].dynamic = Some(dynamic.clone());
                    self.close_ramp(slot, head, Some(dynamic.level));
                    self.level = dynamic.level;
                }
                PostEvent::RampStart(direction) => {
                    self.close_ramp(slot, head, None);
                    self.ramps.push(RawRamp {
                        start: Some(head),
                        end: None,
                        direction: *direction,
                        from_level: self.level,
                        to_level: None,
                    });
                    self.open_ramp = Some(self.ramps.len() - 1);
                    self.events[slot].add_ramp_role(RampRole::Start);
                }
                PostEvent::RampStop => {
                    if self.open_ramp.is_none() {
                        return Err(BuildError::UnmatchedRampStop { offset });
                    }
                    self.close_ramp(slot, head, None);
                }
                PostEvent::Articulation(articulation) => self.events[slot].articulations.push(*articulation),
                PostEvent::Text(annotation) => self.events[slot].annotation = Some(annotation.clone()),
                PostEvent::Glissando => self.events[slot].glissando = true,
            }
        }
        Ok(())
    }

    /// End the open ramp at `slot`; without an explicit target it moves one level
    fn close_ramp(&mut self, slot: usize, head: usize, target: Option<u8>) {
        let Some(id) = self.open_ramp.take() else {
            return;
        };
        let ramp = &mut self.ramps[id];
        let to_level = target.unwrap_or_else(|| ramp.direction.default_target(ramp.from_level));
        ramp.end = Some(head);
        ramp.to_level = Some(to_level);
        self.level = to_level;
        self.events[slot].add_ramp_role(RampRole::End);
    }

    fn finish(
        mut self,
        tokens: &[Token],
        ledger: &ControlLedger,
        tuplets: Vec<(TupletRange, usize)>,
    ) -> Result<BuiltLine, BuildError> {
        if let Some(chord) = &self.chord {
            return Err(BuildError::UnterminatedChord { offset: chord.offset });
        }
        let last_offset = tokens.last().map(|t| t.origin).unwrap_or(0);

        let mut line = if self.events.is_empty() {
            let mut rest = MelodicLine::full_rest(self.meter, self.instrument);
            rest.filler = false;
            rest
        } else {
            MelodicLine::new(self.instrument)
        };
        line.clef = self.clef;

        if !self.events.is_empty() {
            for (range, origin) in &tuplets {
                if range.end >= self.events.len() || range.start > range.end {
                    return Err(BuildError::TupletOutOfRange { offset: *origin });
                }
            }

            resolve_accidentals(&mut self.events, self.instrument.transposition);
            let tuplets: Vec<TupletRange> = tuplets.into_iter().map(|(range, _)| range).collect();
            scale_tuplets(&mut self.events, &tuplets);

            let actual: u32 = self.events.iter().map(|e| e.duration).sum();
            let expected = self.meter.bar_duration();
            if actual != expected {
                return Err(BuildError::BarLength {
                    expected,
                    actual,
                    offset: last_offset,
                });
            }

            // Slurs carried in from before and never closed run through the bar
            for _ in 0..self.carried_slurs {
                self.slurs.push(RawLink { start: None, end: None });
            }

            let len = self.events.len();
            line.ties = (0..len)
                .filter(|&i| self.events[i].tie)
                .map(|i| SlurLink {
                    start: Some(i),
                    end: (i + 1 < len).then_some(i + 1),
                })
                .collect();
            line.slurs = self
                .slurs
                .iter()
                .map(|raw| SlurLink {
                    start: raw.start.map(|t| ledger.rebase(t)),
                    end: raw.end.map(|t| ledger.rebase(t)),
                })
                .collect();
            line.ramps = self
                .ramps
                .iter()
                .map(|raw| DynamicRamp {
                    start: raw.start.map(|t| ledger.rebase(t)),
                    end: raw.end.map(|t| ledger.rebase(t)),
                    direction: raw.direction,
                    from_level: raw.from_level,
                    to_level: raw.to_level.unwrap_or_else(|| raw.direction.default_target(raw.from_level)),
                })
                .collect();
            line.tuplets = tuplets;

            interpolate_levels(&mut self.events, &line.ramps, self.prior.level);
            line.events = self.events;
        }

        let open_ramp = self.open_ramp.map(|id| self.ramps[id].direction);
        line.closing = InstrumentState {
            last_length: self.last_length,
            level: self.level,
            open_slurs: self.open_slurs.len() + self.carried_slurs,
            open_ramp,
        };

        log::debug!(
            "built {} slots for '{}' ({} tuplets, {} slurs, {} ramps)",
            line.events.len(),
            self.instrument.name,
            line.tuplets.len(),
            line.slurs.len(),
            line.ramps.len()
        );

        Ok(BuiltLine {
            line,
            meter: self.meter,
            tempo: self.tempo,
            time_offset: self.time_offset,
            tempo_changed: self.tempo_changed,
        })
    }
}

/// Scale every tuplet range by normal/actual
///
/// Each slot is truncated; what the truncation loses across the range goes
/// to the range's first slot so the range keeps its exact total.
fn scale_tuplets(events: &mut [NoteEvent], tuplets: &[TupletRange]) {
    for range in tuplets {
        let actual = *range.ratio.numer();
        let normal = *range.ratio.denom();
        let slots = &mut events[range.start..=range.end];

        let written: u32 = slots.iter().map(|e| e.display_duration).sum();
        let expected = written * normal / actual;
        let mut truncated = 0;
        for event in slots.iter_mut() {
            event.duration = event.display_duration * normal / actual;
            truncated += event.duration;
        }
        slots[0].duration += expected - truncated;
    }
}

/// Fill `level` and `loudness` for every slot
///
/// Absolute dynamics and ramp targets set the level from their slot on;
/// slots inside a ramp are interpolated, the coarse level by slot index and
/// rounded, the fine loudness by onset time.
fn interpolate_levels(events: &mut [NoteEvent], ramps: &[DynamicRamp], start_level: u8) {
    let len = events.len();
    if len == 0 {
        return;
    }

    let targets: HashMap<usize, u8> = ramps
        .iter()
        .filter_map(|r| r.end.map(|end| (end, r.to_level)))
        .collect();

    let mut level = start_level;
    for (slot, event) in events.iter_mut().enumerate() {
        if let Some(dynamic) = &event.dynamic {
            level = dynamic.level;
        } else if let Some(&target) = targets.get(&slot) {
            level = target;
        }
        event.level = level;
        event.loudness = LOUDNESS[level as usize];
    }

    let mut onsets = Vec::with_capacity(len);
    let mut onset = 0u32;
    for event in events.iter() {
        onsets.push(onset);
        onset += event.duration;
    }
    let total = onset;

    for ramp in ramps {
        let from = ramp.from_level as f32;
        let to = ramp.to_level as f32;
        let from_loud = LOUDNESS[ramp.from_level as usize];
        let to_loud = LOUDNESS[ramp.to_level as usize];

        let (a, a_onset) = match ramp.start {
            Some(s) => (s as f32, onsets[s]),
            None => (-1.0, 0),
        };
        let (b, b_onset) = match ramp.end {
            Some(e) => (e as f32, onsets[e]),
            None => (len as f32, total),
        };
        let first = ramp.start.map(|s| s + 1).unwrap_or(0);
        let last = ramp.end.unwrap_or(len);

        for slot in first..last {
            let t = (slot as f32 - a) / (b - a);
            let coarse = (from + (to - from) * t).round().clamp(0.0, 7.0);
            events[slot].level = coarse as u8;

            let span = b_onset.saturating_sub(a_onset);
            let u = if span == 0 {
                t
            } else {
                onsets[slot].saturating_sub(a_onset) as f32 / span as f32
            };
            events[slot].loudness = from_loud + (to_loud - from_loud) * u;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccidentalDisplay, Articulation, Placement};
    use crate::parse::expand::expand;
    use crate::parse::tokens::tokenize;

    fn build_with(line: &str, instrument: &Instrument, prior: &InstrumentState) -> Result<BuiltLine, BuildError> {
        let tokens = tokenize(&expand(line).unwrap()).unwrap();
        build_line(
            &tokens,
            instrument,
            prior,
            BarContext {
                meter: Meter::default(),
                tempo: Tempo::default(),
            },
        )
    }

    fn build(line: &str) -> Result<BuiltLine, BuildError> {
        build_with(line, &Instrument::new("violin"), &InstrumentState::default())
    }

    fn durations(line: &MelodicLine) -> Vec<u32> {
        line.events.iter().map(|e| e.duration).collect()
    }

    #[test]
    fn test_four_quarters_fill_the_bar() {
        let built = build("c4 d4 e4 f4").unwrap();
        assert_eq!(durations(&built.line), vec![64, 64, 64, 64]);
        assert_eq!(built.line.total_duration(), 256);
    }

    #[test]
    fn test_duration_carries_forward() {
        let built = build("c4 d e8 f g4").unwrap();
        assert_eq!(durations(&built.line), vec![64, 64, 32, 32, 64]);
        assert_eq!(built.line.closing.last_length, Some(NoteLength::new(64, 0)));
    }

    #[test]
    fn test_first_slot_uses_prior_length() {
        let prior = InstrumentState {
            last_length: Some(NoteLength::new(64, 0)),
            ..InstrumentState::default()
        };
        let built = build_with("c d e f", &Instrument::new("violin"), &prior).unwrap();
        assert_eq!(built.line.total_duration(), 256);
        assert!(matches!(build("c d e f"), Err(BuildError::MissingDuration { offset: 0 })));
    }

    #[test]
    fn test_dots() {
        let built = build("c4. d8 e2").unwrap();
        assert_eq!(durations(&built.line), vec![96, 32, 128]);
    }

    #[test]
    fn test_chord_is_one_slot_with_backfilled_duration() {
        let built = build("<c e g>2 <d f>4. r8").unwrap();
        assert_eq!(built.line.len(), 3);
        assert_eq!(built.line.events[0].content.pitches().len(), 3);
        assert_eq!(built.line.events[0].duration, 128);
        assert_eq!(built.line.events[1].duration, 96);
        assert!(built.line.events[2].is_rest());
    }

    #[test]
    fn test_triplet_remainder_goes_to_first_slot() {
        let built = build("\\tuplet 3/2 { c8 d e } f4 g2").unwrap();
        assert_eq!(durations(&built.line), vec![22, 21, 21, 64, 128]);
        let range = &built.line.tuplets[0];
        assert_eq!((range.start, range.end), (0, 2));
        assert_eq!(built.line.events[0].display_duration, 32);
    }

    #[test]
    fn test_tuplet_range_rebased_past_control_tokens() {
        let built = build("\\ottava 1 c4 \\f \\tuplet 3/2 { <d f>4 e4 f4 } g4").unwrap();
        let range = &built.line.tuplets[0];
        assert_eq!((range.start, range.end), (1, 3));
        assert_eq!(built.line.events[1].ottava, 1);
    }

    #[test]
    fn test_tuplet_errors() {
        assert!(matches!(build("\\tuplet 3/2 { c4 d4"), Err(BuildError::UnterminatedTuplet { offset: 0 })));
        assert!(matches!(
            build("\\tuplet 3/2 { c8 \\tuplet 3/2 { d8 } }"),
            Err(BuildError::NestedTuplet { .. })
        ));
        assert!(matches!(build("c4 } d"), Err(BuildError::StrayGroupClose { offset: 3 })));
        assert!(matches!(build("{ c4 }"), Err(BuildError::StrayGroupOpen { .. })));
        assert!(matches!(build("\\tuplet 3/2 { } c1"), Err(BuildError::EmptyTuplet { .. })));
    }

    #[test]
    fn test_bar_length_mismatch() {
        match build("c4 d4 e4") {
            Err(BuildError::BarLength { expected, actual, .. }) => {
                assert_eq!(expected, 256);
                assert_eq!(actual, 192);
            }
            other => panic!("expected bar length error, got {:?}", other),
        }
    }

    #[test]
    fn test_time_directive_changes_meter() {
        let built = build("\\time 3/4 c4 d e").unwrap();
        assert!(built.time_offset.is_some());
        assert_eq!(built.meter.bar_duration(), 192);
    }

    #[test]
    fn test_slurs_and_ties() {
        let built = build("c4( d e) f~").unwrap();
        assert_eq!(built.line.slurs, vec![SlurLink { start: Some(0), end: Some(2) }]);
        assert_eq!(built.line.events[0].slur_open, vec![0]);
        assert_eq!(built.line.events[2].slur_close, vec![0]);
        assert_eq!(built.line.ties, vec![SlurLink { start: Some(3), end: None }]);
    }

    #[test]
    fn test_open_slur_carries_to_next_bar() {
        let first = build("c4 d e f(").unwrap();
        assert_eq!(first.line.closing.open_slurs, 1);

        let second = build_with("g4 a) b c", &Instrument::new("violin"), &first.line.closing).unwrap();
        assert_eq!(second.line.slurs, vec![SlurLink { start: None, end: Some(1) }]);
        assert_eq!(second.line.closing.open_slurs, 0);

        assert!(matches!(build("c4 d) e f"), Err(BuildError::UnmatchedSlurClose { offset: 3 })));
    }

    #[test]
    fn test_crescendo_interpolates_between_dynamics() {
        let built = build("c8\\p\\< d e f g\\f r4.").unwrap();
        let levels: Vec<u8> = built.line.events.iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![2, 3, 4, 4, 5, 5]);

        let ramp = built.line.ramps[0];
        assert_eq!((ramp.start, ramp.end), (Some(0), Some(4)));
        assert_eq!((ramp.from_level, ramp.to_level), (2, 5));
        assert_eq!(built.line.events[0].ramp, Some(RampRole::Start));
        assert_eq!(built.line.events[4].ramp, Some(RampRole::End));

        let loudness: Vec<f32> = built.line.events.iter().map(|e| e.loudness).collect();
        assert!(loudness.windows(2).take(4).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_ramp_stop_moves_one_level() {
        let built = build("c4\\mf\\> d e\\! f").unwrap();
        let ramp = built.line.ramps[0];
        assert_eq!(ramp.to_level, 3);
        assert_eq!(built.line.events[3].level, 3);
        assert!(matches!(build("c4 d\\! e f"), Err(BuildError::UnmatchedRampStop { .. })));
    }

    #[test]
    fn test_open_ramp_crosses_the_bar() {
        let first = build("c4\\p\\< d e f").unwrap();
        assert_eq!(first.line.closing.open_ramp, Some(RampDirection::Crescendo));
        assert_eq!(first.line.ramps[0].end, None);

        let second = build_with("g4 a b c\\f", &Instrument::new("violin"), &first.line.closing).unwrap();
        let ramp = second.line.ramps[0];
        assert_eq!((ramp.start, ramp.end), (None, Some(3)));
        assert_eq!(ramp.to_level, 5);
    }

    #[test]
    fn test_post_events_attach_to_previous_slot() {
        let built = build("c4 -. d4 ^\"dolce\" e4->-. f4\\glissando").unwrap();
        assert_eq!(built.line.events[0].articulations, vec![Articulation::Staccato]);
        assert_eq!(
            built.line.events[1].annotation.as_ref().map(|a| a.placement),
            Some(Placement::Above)
        );
        assert_eq!(built.line.events[2].articulation(), 3);
        assert_eq!(built.line.events[2].articulations.len(), 2);
        assert!(built.line.events[3].glissando);
        assert!(matches!(build("\\f c1"), Err(BuildError::DanglingPostEvent { offset: 0 })));
    }

    #[test]
    fn test_rhythm_durations() {
        let drums = Instrument::new("drums").rhythm();
        let built = build_with("4 8 8 2", &drums, &InstrumentState::default()).unwrap();
        assert_eq!(built.line.len(), 4);
        assert!(built.line.rhythm);
        assert!(matches!(build("4 4 4 4"), Err(BuildError::DurationWithoutPitch { .. })));
    }

    #[test]
    fn test_accidental_carry_within_bar() {
        let built = build("cis4 c4 d2").unwrap();
        let first = &built.line.events[0].content.pitches()[0];
        let second = &built.line.events[1].content.pitches()[0];
        assert_eq!(first.display, AccidentalDisplay::Shown(2));
        assert_eq!(second.display, AccidentalDisplay::Hidden);
        assert_eq!(second.sounding, first.sounding);
    }

    #[test]
    fn test_transposition_applies_to_sounding() {
        let clarinet = Instrument::new("clarinet").with_transposition(-2);
        let built = build_with("d'1", &clarinet, &InstrumentState::default()).unwrap();
        let pitch = &built.line.events[0].content.pitches()[0];
        assert_eq!(pitch.sounding, 60.0);
        assert_eq!(pitch.natural, 8);
    }

    #[test]
    fn test_empty_line_is_a_full_rest() {
        let built = build("").unwrap();
        assert_eq!(built.line.len(), 1);
        assert!(built.line.events[0].is_rest());
        assert!(!built.line.filler);
    }

    #[test]
    fn test_bar_separator_needs_multi_bar_declaration() {
        assert!(matches!(build("c1 | d1"), Err(BuildError::BarSeparatorInLine { offset: 3 })));
    }
}
