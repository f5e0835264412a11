//! Score operations: the per-bar pipeline over the bar arena
//!
//! Every edit is all-or-nothing: a line is parsed against a snapshot of the
//! bar and only written back once it has parsed completely.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::arena::BarArena;
use crate::diagnostics::{warning_marks, Diagnostics};
use crate::layout::{LayoutContext, LayoutEngine, LayoutRecord};
use crate::models::{Bar, BarId, Instrument, InstrumentRegistry, InstrumentState, MelodicLine, Meter, RegistryError, Tempo};
use crate::parse::resolve::{resolve_links, tied_in};
use crate::parse::{parse_bars, parse_line, BarContext, BuildError, BuiltLine, MacroCursor, NotationError};

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error(transparent)]
    Notation(#[from] NotationError),

    #[error("no bar with id {0}")]
    UnknownBar(BarId),

    #[error("instrument '{0}' is not registered")]
    UnknownInstrument(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ScoreError {
    /// Parse error behind this failure, if any
    pub fn notation(&self) -> Option<&NotationError> {
        match self {
            ScoreError::Notation(error) => Some(error),
            _ => None,
        }
    }
}

/// Geometry and warnings for one bar of one instrument
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BarLayout {
    pub bar: BarId,
    pub instrument: String,
    pub record: LayoutRecord,
    pub diagnostics: Diagnostics,
}

/// All bars of a piece together with its instruments
#[derive(Clone, Debug, Default)]
pub struct Score {
    registry: InstrumentRegistry,
    bars: BarArena,
}

impl Score {
    pub fn new(registry: InstrumentRegistry) -> Self {
        Self {
            registry,
            bars: BarArena::new(),
        }
    }

    pub fn registry(&self) -> &InstrumentRegistry {
        &self.registry
    }

    /// Replace the instruments; lines of dropped instruments are removed and
    /// new instruments get rests in every bar
    pub fn set_registry(&mut self, registry: InstrumentRegistry) {
        for bar in self.bars.iter_mut() {
            bar.lines.retain(|name, _| registry.get(name).is_some());
            bar.complete(&registry);
        }
        log::info!("🎻 {} instruments registered", registry.len());
        self.registry = registry;
    }

    pub fn bars(&self) -> &BarArena {
        &self.bars
    }

    pub fn bar(&self, id: BarId) -> Result<&Bar, ScoreError> {
        self.bars.get(id).ok_or(ScoreError::UnknownBar(id))
    }

    pub fn instrument(&self, name: &str) -> Result<&Instrument, ScoreError> {
        self.registry
            .get(name)
            .ok_or_else(|| ScoreError::UnknownInstrument(name.to_string()))
    }

    /// Insert an empty bar; it takes meter and tempo from the bar before it
    pub fn insert_bar(&mut self, position: usize) -> BarId {
        let (meter, tempo) = self.context_at(position);
        let id = self.bars.insert(position, meter, tempo);
        if let Some(bar) = self.bars.get_mut(id) {
            bar.complete(&self.registry);
        }
        log::debug!("inserted {} at {}", id, position);
        id
    }

    pub fn remove_bar(&mut self, id: BarId) -> Result<Bar, ScoreError> {
        let bar = self.bars.remove(id).ok_or(ScoreError::UnknownBar(id))?;
        log::debug!("removed {}", id);
        Ok(bar)
    }

    /// State an instrument carries into `id` from the bar before it
    pub fn prior_state(&self, id: BarId, instrument: &str) -> InstrumentState {
        self.bars
            .previous(id)
            .and_then(|bar| bar.line(instrument))
            .map(|line| line.closing.clone())
            .unwrap_or_default()
    }

    /// Parse `text` as the line of `instrument` in bar `id`
    ///
    /// On error the bar keeps its previous contents.
    pub fn set_line(&mut self, id: BarId, instrument: &str, text: &str) -> Result<&MelodicLine, ScoreError> {
        let spec = self.instrument(instrument)?.clone();
        let bar = self.bar(id)?;
        let prior = self.prior_state(id, instrument);
        let context = BarContext {
            meter: bar.meter,
            tempo: bar.tempo,
        };

        let built = parse_line(text, &spec, &prior, context)?;
        check_meter(bar, instrument, &built)?;

        let bar = self.bars.get_mut(id).ok_or(ScoreError::UnknownBar(id))?;
        commit(bar, instrument, built, &self.registry);
        log::info!("🎼 {} {} updated", id, instrument);

        self.bar(id)?
            .line(instrument)
            .ok_or_else(|| ScoreError::UnknownInstrument(instrument.to_string()))
    }

    /// Cursor for a multi-bar declaration starting at score `position`
    pub fn cursor(&self, instrument: &str, position: usize) -> MacroCursor {
        let state = match self.bars.at(position) {
            Some(id) => self.prior_state(id, instrument),
            None => position
                .checked_sub(1)
                .and_then(|p| self.bars.at(p))
                .and_then(|id| self.bars.get(id))
                .and_then(|bar| bar.line(instrument))
                .map(|line| line.closing.clone())
                .unwrap_or_default(),
        };
        let (meter, tempo) = match self.bars.at(position).and_then(|id| self.bars.get(id)) {
            Some(bar) => (bar.meter, bar.tempo),
            None => self.context_at(position),
        };
        MacroCursor::new(position, state, BarContext { meter, tempo })
    }

    /// Apply `\bars a | b | c` for one instrument from the cursor onwards
    ///
    /// Bars past the end of the score are created. Either every bar is
    /// written or none is, and the cursor only advances on success.
    pub fn declare_bars(&mut self, instrument: &str, text: &str, cursor: &mut MacroCursor) -> Result<Vec<BarId>, ScoreError> {
        let spec = self.instrument(instrument)?.clone();
        let mut working = cursor.clone();
        let start = working.position;
        let built = parse_bars(text, &spec, &mut working)?;

        for (index, line) in built.iter().enumerate() {
            let existing = self.bars.at(start + index).and_then(|id| self.bars.get(id));
            if let Some(bar) = existing {
                check_meter(bar, instrument, line)?;
            }
        }

        let mut ids = Vec::with_capacity(built.len());
        for (index, line) in built.into_iter().enumerate() {
            let position = start + index;
            let id = match self.bars.at(position) {
                Some(id) => id,
                None => self.bars.insert(position, line.meter, line.tempo),
            };
            let bar = self.bars.get_mut(id).ok_or(ScoreError::UnknownBar(id))?;
            commit(bar, instrument, line, &self.registry);
            ids.push(id);
        }

        log::info!("🎼 {} bars declared for {}", ids.len(), instrument);
        *cursor = working;
        Ok(ids)
    }

    /// Lay out one bar of one instrument within a window of visible bars
    ///
    /// The bar drawn just before `id` in `visible` settles deferred naturals
    /// and incoming ties; links that find no partner among the visible
    /// neighbours are drawn open-ended and reported as warnings.
    pub fn layout_bar(&self, id: BarId, instrument: &str, visible: &[BarId], engine: &LayoutEngine) -> Result<BarLayout, ScoreError> {
        let bar = self.bar(id)?;
        let line = bar
            .line(instrument)
            .ok_or_else(|| ScoreError::UnknownInstrument(instrument.to_string()))?;

        let index = visible.iter().position(|other| *other == id);
        let neighbour = |position: Option<usize>| {
            position
                .and_then(|p| visible.get(p))
                .and_then(|other| self.bars.get(*other))
                .and_then(|bar| bar.line(instrument))
        };
        let previous = neighbour(index.and_then(|i| i.checked_sub(1)));
        let next = neighbour(index.map(|i| i + 1));

        let context = LayoutContext {
            previous_finals: previous.map(|line| line.final_alterations()),
            tied_in: tied_in(previous, line),
        };
        let record = engine.layout(line, bar.meter, &context);

        let warnings = resolve_links(previous, line, next);
        if !warnings.is_empty() {
            log::warn!("{} {}: {} open links", id, instrument, warnings.len());
        }
        let mut diagnostics = Diagnostics::new();
        diagnostics.extend(warning_marks(id, instrument, &warnings));

        Ok(BarLayout {
            bar: id,
            instrument: instrument.to_string(),
            record,
            diagnostics,
        })
    }

    /// Meter and tempo a new bar at `position` inherits
    fn context_at(&self, position: usize) -> (Meter, Tempo) {
        position
            .checked_sub(1)
            .and_then(|p| self.bars.at(p.min(self.bars.len().saturating_sub(1))))
            .and_then(|id| self.bars.get(id))
            .map(|bar| (bar.meter, bar.tempo))
            .unwrap_or_default()
    }
}

/// A `\time` change may not break other instruments' lines
fn check_meter(bar: &Bar, instrument: &str, built: &BuiltLine) -> Result<(), NotationError> {
    match built.time_offset {
        Some(offset) if built.meter != bar.meter && bar.has_other_content(instrument) => Err(BuildError::MeterConflict {
            meter: built.meter,
            existing: bar.meter,
            offset,
        }
        .into()),
        _ => Ok(()),
    }
}

fn commit(bar: &mut Bar, instrument: &str, built: BuiltLine, registry: &InstrumentRegistry) {
    bar.meter = built.meter;
    bar.tempo = built.tempo;
    bar.lines.insert(instrument.to_string(), built.line);
    bar.complete(registry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticSeverity;
    use crate::models::{AccidentalGlyph, Clef};

    fn score() -> Score {
        let mut registry = InstrumentRegistry::new();
        registry.insert(Instrument::new("flute"));
        registry.insert(Instrument::new("cello").with_clef(Clef::Bass));
        Score::new(registry)
    }

    #[test]
    fn test_new_bars_are_complete_and_inherit_meter() {
        let mut score = score();
        let first = score.insert_bar(0);
        score.set_line(first, "flute", "\\time 3/4 c'2.").unwrap();

        let second = score.insert_bar(1);
        let bar = score.bar(second).unwrap();
        assert_eq!(bar.meter, Meter::new(3, 4).unwrap());
        assert!(bar.is_complete(score.registry()));
        assert_eq!(bar.line("cello").unwrap().total_duration(), 192);
    }

    #[test]
    fn test_failed_line_leaves_bar_unchanged() {
        let mut score = score();
        let id = score.insert_bar(0);
        score.set_line(id, "flute", "c'4 d' e' f'").unwrap();
        let before = score.bar(id).unwrap().clone();

        let err = score.set_line(id, "flute", "\\tuplet 3/2 { c'8 d' e'").unwrap_err();
        assert_eq!(err.notation().map(|e| e.kind()), Some("unterminated_tuplet"));
        assert_eq!(score.bar(id).unwrap(), &before);
    }

    #[test]
    fn test_meter_conflict_with_other_instruments() {
        let mut score = score();
        let id = score.insert_bar(0);
        score.set_line(id, "flute", "c'1").unwrap();

        let err = score.set_line(id, "cello", "\\time 3/4 c2.").unwrap_err();
        assert_eq!(err.notation().map(|e| e.kind()), Some("meter_conflict"));
        assert_eq!(err.notation().map(|e| e.offset()), Some(0));

        // With only rests elsewhere the meter may change
        let other = score.insert_bar(1);
        score.set_line(other, "cello", "\\time 3/4 c2.").unwrap();
        assert_eq!(score.bar(other).unwrap().line("flute").unwrap().total_duration(), 192);
    }

    #[test]
    fn test_state_carries_from_previous_bar() {
        let mut score = score();
        let first = score.insert_bar(0);
        let second = score.insert_bar(1);
        score.set_line(first, "flute", "g'2( c'8 d' e' f'").unwrap();
        let line = score.set_line(second, "flute", "a' b' c''4) r2").unwrap();

        // Eighths carried in; the slur closes without an opening here
        assert_eq!(line.events[0].length.base, 32);
        assert_eq!(line.slurs[0].start, None);
    }

    #[test]
    fn test_declare_bars_creates_and_fills() {
        let mut score = score();
        score.insert_bar(0);
        let mut cursor = score.cursor("cello", 0);
        let ids = score.declare_bars("cello", "\\bars c1 | d1 | e2 f", &mut cursor).unwrap();

        assert_eq!(ids.len(), 3);
        assert_eq!(score.bars().len(), 3);
        assert_eq!(cursor.position, 3);
        assert!(score.bars().iter().all(|bar| bar.is_complete(score.registry())));

        let mut cursor = score.cursor("cello", 3);
        assert!(score.declare_bars("cello", "g1 | a2", &mut cursor).is_err());
        assert_eq!(score.bars().len(), 3);
        assert_eq!(cursor.position, 3);
    }

    #[test]
    fn test_layout_uses_visible_neighbour() {
        let mut score = score();
        let first = score.insert_bar(0);
        let second = score.insert_bar(1);
        let third = score.insert_bar(2);
        score.set_line(first, "flute", "fis'1").unwrap();
        score.set_line(second, "flute", "g'1").unwrap();
        score.set_line(third, "flute", "f'1").unwrap();
        let engine = LayoutEngine::default();

        // Drawn next to the sharp, f' needs its natural
        let beside = score.layout_bar(third, "flute", &[first, third], &engine).unwrap();
        assert_eq!(beside.record.accidentals[0].glyph, AccidentalGlyph::Natural);

        let in_order = score.layout_bar(third, "flute", &[first, second, third], &engine).unwrap();
        assert!(in_order.record.accidentals.is_empty());
    }

    #[test]
    fn test_layout_reports_open_links() {
        let mut score = score();
        let first = score.insert_bar(0);
        let second = score.insert_bar(1);
        score.set_line(first, "flute", "c'2 d'~").unwrap();
        score.set_line(second, "flute", "d'1").unwrap();
        let engine = LayoutEngine::default();

        let alone = score.layout_bar(first, "flute", &[first], &engine).unwrap();
        assert_eq!(alone.diagnostics.marks.len(), 1);
        assert_eq!(alone.diagnostics.marks[0].kind, "tie_orphan_begin");
        assert_eq!(alone.diagnostics.marks[0].severity, DiagnosticSeverity::Warning);

        let joined = score.layout_bar(second, "flute", &[first, second], &engine).unwrap();
        assert!(joined.diagnostics.is_empty());
        assert_eq!(joined.record.ties.len(), 1);
    }

    #[test]
    fn test_unknown_ids() {
        let mut score = score();
        assert!(matches!(score.remove_bar(BarId(9)), Err(ScoreError::UnknownBar(_))));
        let id = score.insert_bar(0);
        assert!(matches!(score.set_line(id, "tuba", "c1"), Err(ScoreError::UnknownInstrument(_))));
    }

    #[test]
    fn test_registry_change_recompletes_bars() {
        let mut score = score();
        let id = score.insert_bar(0);
        let mut registry = InstrumentRegistry::new();
        registry.insert(Instrument::new("flute"));
        registry.insert(Instrument::new("snare").rhythm());
        score.set_registry(registry);

        let bar = score.bar(id).unwrap();
        assert!(bar.line("cello").is_none());
        assert!(bar.line("snare").is_some());
    }
}
