//! Cross-reference resolution
//!
//! - [`ControlLedger`] maps token indices to slot indices once control
//!   tokens (directives, braces, chord-internal notes, post-event words) are
//!   stripped from the slot stream
//! - [`resolve_accidentals`] applies the in-bar accidental carry
//! - [`deferred_display`] settles natural signs against the bar drawn
//!   immediately to the left, which is only known at layout time
//! - [`resolve_links`] pairs open-ended slurs, ties and ramps with the
//!   neighbouring bars of a visible window

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::tokens::{Token, TokenKind};
use crate::models::{AccidentalDisplay, AccidentalMark, MelodicLine, NoteEvent, Pitch};

/// Token indices that do not start a slot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControlLedger {
    removed: Vec<usize>,
}

impl ControlLedger {
    /// Record every token that is not a slot head
    ///
    /// A chord is one slot headed by its `<`; its notes and `>` are removed.
    pub fn scan(tokens: &[Token]) -> Self {
        let mut removed = Vec::new();
        let mut in_chord = false;

        for (index, token) in tokens.iter().enumerate() {
            let head = match token.kind {
                TokenKind::ChordStart => {
                    in_chord = true;
                    true
                }
                TokenKind::ChordEnd(_) => {
                    in_chord = false;
                    false
                }
                TokenKind::Note(_) | TokenKind::Rest(_) | TokenKind::Duration(_) => !in_chord,
                _ => false,
            };
            if !head {
                removed.push(index);
            }
        }

        Self { removed }
    }

    pub fn is_removed(&self, token: usize) -> bool {
        self.removed.binary_search(&token).is_ok()
    }

    /// Number of removed tokens strictly before `token`
    pub fn removed_before(&self, token: usize) -> usize {
        self.removed.partition_point(|&r| r < token)
    }

    /// Slot index of the slot headed by `token`
    pub fn rebase(&self, token: usize) -> usize {
        token - self.removed_before(token)
    }

    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// Apply the in-bar accidental carry and decide what each notehead shows
///
/// A bare pitch takes the alteration last written for the same step and
/// octave in this bar and shows nothing. With no such pitch its natural
/// sign is deferred to layout. Written accidentals show unless they repeat
/// the carried one; forced ones always show.
pub fn resolve_accidentals(events: &mut [NoteEvent], transposition: i8) {
    let mut carried: HashMap<(i8, i8), i8> = HashMap::new();

    for event in events.iter_mut() {
        for pitch in event.content.pitches_mut() {
            let key = pitch.staff_key();
            let previous = carried.get(&key).copied();

            pitch.display = match pitch.accidental {
                AccidentalMark::Default => match previous {
                    Some(alteration) => {
                        pitch.alteration = alteration;
                        AccidentalDisplay::Hidden
                    }
                    None => AccidentalDisplay::Deferred,
                },
                AccidentalMark::Explicit if previous == Some(pitch.alteration) => AccidentalDisplay::Hidden,
                AccidentalMark::Explicit | AccidentalMark::Forced => AccidentalDisplay::Shown(pitch.alteration),
            };

            carried.insert(key, pitch.alteration);
            pitch.refresh_sounding(transposition);
        }
    }
}

/// Final display of a pitch once the bar to its left is known
///
/// `previous` holds the alterations standing at the end of the bar drawn
/// immediately before this one, if any.
pub fn deferred_display(pitch: &Pitch, previous: Option<&BTreeMap<(i8, i8), i8>>) -> AccidentalDisplay {
    match pitch.display {
        AccidentalDisplay::Deferred => {
            let altered = previous
                .and_then(|finals| finals.get(&pitch.staff_key()))
                .map(|&alteration| alteration != pitch.alteration)
                .unwrap_or(false);
            if altered {
                AccidentalDisplay::Shown(pitch.alteration)
            } else {
                AccidentalDisplay::Hidden
            }
        }
        other => other,
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Slur,
    Tie,
    Ramp,
}

impl LinkKind {
    fn name(self) -> &'static str {
        match self {
            LinkKind::Slur => "slur",
            LinkKind::Tie => "tie",
            LinkKind::Ramp => "hairpin",
        }
    }
}

/// A link left open at a bar edge with nothing to meet it in the window
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ResolutionWarning {
    pub link: LinkKind,
    /// Slot the open end belongs to
    pub slot: usize,
    /// Byte offset of that slot in the original line
    pub offset: usize,
    /// True when the link comes in from the left, false when it leaves to the right
    pub incoming: bool,
}

impl ResolutionWarning {
    pub fn kind(&self) -> String {
        let side = if self.incoming { "end" } else { "begin" };
        format!("{}_orphan_{}", self.link.name(), side)
    }

    pub fn message(&self) -> String {
        if self.incoming {
            format!("{} continues from a bar that is not shown before this one", self.link.name())
        } else {
            format!("{} continues into a bar that is not shown after this one", self.link.name())
        }
    }
}

/// Pair the open-ended links of `line` with its neighbours in a window
///
/// Links pair like nested brackets: the most recently opened link meets the
/// first incoming one of the next bar, so surplus outgoing links are the
/// earliest opened and surplus incoming links are the last closed.
pub fn resolve_links(
    previous: Option<&MelodicLine>,
    line: &MelodicLine,
    next: Option<&MelodicLine>,
) -> Vec<ResolutionWarning> {
    let mut warnings = Vec::new();
    let slot_offset = |slot: usize| line.events.get(slot).map(|e| e.offset).unwrap_or(0);
    let mut warn = |link: LinkKind, slot: usize, incoming: bool| {
        warnings.push(ResolutionWarning {
            link,
            slot,
            offset: slot_offset(slot),
            incoming,
        });
    };

    // Slurs
    let outgoing: Vec<usize> = line
        .slurs
        .iter()
        .filter(|s| s.end.is_none())
        .map(|s| s.start.unwrap_or(0))
        .collect();
    let met = next.map(incoming_slurs).unwrap_or(0);
    for &slot in outgoing.iter().take(outgoing.len().saturating_sub(met)) {
        warn(LinkKind::Slur, slot, false);
    }

    let incoming: Vec<usize> = line
        .slurs
        .iter()
        .filter(|s| s.start.is_none())
        .map(|s| s.end.unwrap_or(line.events.len().saturating_sub(1)))
        .collect();
    let available = previous.map(outgoing_slurs).unwrap_or(0);
    for &slot in incoming.iter().skip(available) {
        warn(LinkKind::Slur, slot, true);
    }

    // Ties leaving the last slot need a shared pitch on the next bar's first slot
    for tie in line.ties.iter().filter(|t| t.end.is_none()) {
        let Some(start) = tie.start else { continue };
        let continues = match (line.events.get(start), next.and_then(|n| n.events.first())) {
            (Some(from), Some(to)) => shares_pitch(from, to),
            _ => false,
        };
        if !continues {
            warn(LinkKind::Tie, start, false);
        }
    }

    // Ramps
    for ramp in &line.ramps {
        if ramp.end.is_none() {
            let met = next
                .map(|n| n.ramps.iter().any(|r| r.start.is_none() && r.direction == ramp.direction))
                .unwrap_or(false);
            if !met {
                warn(LinkKind::Ramp, ramp.start.unwrap_or(0), false);
            }
        }
        if ramp.start.is_none() {
            let met = previous
                .map(|p| p.ramps.iter().any(|r| r.end.is_none() && r.direction == ramp.direction))
                .unwrap_or(false);
            if !met {
                warn(LinkKind::Ramp, ramp.end.unwrap_or(0), true);
            }
        }
    }

    warnings
}

/// The last slot of `previous` ties into the first slot of the current bar
pub fn tied_in(previous: Option<&MelodicLine>, line: &MelodicLine) -> bool {
    let Some(previous) = previous else {
        return false;
    };
    let outgoing = previous.ties.iter().any(|t| t.end.is_none());
    match (previous.events.last(), line.events.first()) {
        (Some(from), Some(to)) if outgoing => shares_pitch(from, to),
        _ => false,
    }
}

fn outgoing_slurs(line: &MelodicLine) -> usize {
    line.slurs.iter().filter(|s| s.end.is_none()).count()
}

fn incoming_slurs(line: &MelodicLine) -> usize {
    line.slurs.iter().filter(|s| s.start.is_none()).count()
}

fn shares_pitch(from: &NoteEvent, to: &NoteEvent) -> bool {
    from.content
        .pitches()
        .iter()
        .any(|a| to.content.pitches().iter().any(|b| a.sounding == b.sounding))
}
