//! Bars: meter, tempo and one melodic line per instrument

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::duration::{Meter, Tempo};
use super::instrument::InstrumentRegistry;
use super::line::MelodicLine;

/// Stable opaque bar identifier
///
/// Identifiers survive insertion and deletion of other bars; the position of
/// a bar in the score is kept separately by the bar order list.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BarId(pub u32);

impl std::fmt::Display for BarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bar#{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Bar {
    pub id: BarId,
    pub meter: Meter,
    pub tempo: Tempo,
    pub lines: BTreeMap<String, MelodicLine>,
}

impl Bar {
    pub fn new(id: BarId, meter: Meter, tempo: Tempo) -> Self {
        Self {
            id,
            meter,
            tempo,
            lines: BTreeMap::new(),
        }
    }

    pub fn line(&self, instrument: &str) -> Option<&MelodicLine> {
        self.lines.get(instrument)
    }

    /// Whether any instrument other than `instrument` has parsed content
    pub fn has_other_content(&self, instrument: &str) -> bool {
        self.lines
            .iter()
            .any(|(name, line)| name != instrument && !line.filler)
    }

    /// Give every registered instrument without a line a full-bar rest
    ///
    /// Fillers are regenerated so they follow meter changes.
    pub fn complete(&mut self, registry: &InstrumentRegistry) {
        for instrument in registry.iter() {
            let needs_filler = match self.lines.get(&instrument.name) {
                None => true,
                Some(line) => line.filler && line.total_duration() != self.meter.bar_duration(),
            };
            if needs_filler {
                self.lines.insert(
                    instrument.name.clone(),
                    MelodicLine::full_rest(self.meter, instrument),
                );
            }
        }
    }

    /// Every registered instrument has a line of the right length
    pub fn is_complete(&self, registry: &InstrumentRegistry) -> bool {
        registry.iter().all(|instrument| {
            self.lines
                .get(&instrument.name)
                .map(|line| line.total_duration() == self.meter.bar_duration())
                .unwrap_or(false)
        })
    }
}
