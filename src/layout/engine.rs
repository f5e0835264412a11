//! Layout engine: runs the passes in order over one melodic line

use std::collections::BTreeMap;

use super::accidentals::place_accidentals;
use super::articulations::place_articulations;
use super::curves::{place_glissandi, place_slurs, place_ties};
use super::dynamics::place_dynamics;
use super::ottava::place_ottavas;
use super::placement::place_slots;
use super::record::LayoutRecord;
use super::stems::assign_stems;
use super::text::place_texts;
use super::tuplets::place_tuplets;
use super::LayoutConfig;
use crate::models::{Meter, MelodicLine};

/// What a bar needs to know about its visible neighbours
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutContext {
    /// Alterations standing at the end of the bar drawn immediately before
    pub previous_finals: Option<BTreeMap<(i8, i8), i8>>,

    /// The bar drawn before ends with a tie into this one
    pub tied_in: bool,
}

/// Main layout engine for computing bar geometry
#[derive(Clone, Debug, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Compute the complete geometry of one bar of one instrument
    ///
    /// The result depends only on the line, the meter, the context and the
    /// configuration, so laying out the same input twice gives identical
    /// records.
    pub fn layout(&self, line: &MelodicLine, meter: Meter, context: &LayoutContext) -> LayoutRecord {
        let config = &self.config;
        let width = config.bar_width;

        let mut record = LayoutRecord {
            width,
            slots: place_slots(line, meter, config),
            ..Default::default()
        };

        record.beams = assign_stems(line, meter, &mut record.slots, config);
        record.accidentals = place_accidentals(line, &mut record.slots, context.previous_finals.as_ref(), config);
        record.tuplets = place_tuplets(line, &record.beams, &mut record.slots, config);
        record.articulations = place_articulations(line, &mut record.slots, config);
        record.slurs = place_slurs(line, &mut record.slots, width, config);
        record.ties = place_ties(line, &mut record.slots, context.tied_in, width, config);
        record.glissandi = place_glissandi(line, &record.slots, width, config);
        record.ottavas = place_ottavas(line, &mut record.slots, config);
        record.texts = place_texts(line, &mut record.slots, config);
        let (dynamics, hairpins) = place_dynamics(line, &mut record.slots, width, config);
        record.dynamics = dynamics;
        record.hairpins = hairpins;

        log::debug!(
            "layout: {} slots, {} beams, {} tuplets, {} slurs, {} ties",
            record.slots.len(),
            record.beams.len(),
            record.tuplets.len(),
            record.slurs.len(),
            record.ties.len()
        );

        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::test_line;
    use crate::models::Instrument;

    const BUSY: &str = "\\tuplet 3/2 { c'8\\p\\<( d' e' } f'4-.-> \\ottava 1 g'''8^\"espr.\" a''' \\ottava 0 b'4\\f)";

    #[test]
    fn test_layout_is_deterministic() {
        let engine = LayoutEngine::default();
        let line = test_line(BUSY, Meter::default(), &Instrument::new("flute"));
        let context = LayoutContext::default();

        let first = engine.layout(&line, Meter::default(), &context);
        let second = engine.layout(&line, Meter::default(), &context);
        assert_eq!(first, second);
        assert_eq!(serde_json::to_string(&first).unwrap(), serde_json::to_string(&second).unwrap());
    }

    #[test]
    fn test_every_pass_contributes() {
        let engine = LayoutEngine::default();
        let line = test_line(BUSY, Meter::default(), &Instrument::new("flute"));
        let record = engine.layout(&line, Meter::default(), &LayoutContext::default());

        assert_eq!(record.slots.len(), 7);
        assert_eq!(record.beams.len(), 2);
        assert_eq!(record.tuplets.len(), 1);
        assert_eq!(record.articulations.len(), 2);
        assert_eq!(record.slurs.len(), 1);
        assert_eq!(record.ottavas.len(), 1);
        assert_eq!(record.texts.len(), 1);
        assert_eq!(record.dynamics.len(), 2);
        assert_eq!(record.hairpins.len(), 1);
        assert_eq!(record.width, engine.config().bar_width);
    }

    #[test]
    fn test_context_changes_accidentals_and_ties() {
        let engine = LayoutEngine::default();
        let line = test_line("f'1", Meter::default(), &Instrument::new("flute"));

        let plain = engine.layout(&line, Meter::default(), &LayoutContext::default());
        assert!(plain.accidentals.is_empty());
        assert!(plain.ties.is_empty());

        let mut finals = BTreeMap::new();
        finals.insert((3, 1), 2);
        let context = LayoutContext {
            previous_finals: Some(finals),
            tied_in: true,
        };
        let joined = engine.layout(&line, Meter::default(), &context);
        assert_eq!(joined.accidentals.len(), 1);
        assert_eq!(joined.ties.len(), 1);
    }

    #[test]
    fn test_later_passes_sit_outside_earlier_ink() {
        let engine = LayoutEngine::default();
        let line = test_line("c'''4-^_\"sub.\"\\ff r2.", Meter::default(), &Instrument::new("flute"));
        let record = engine.layout(&line, Meter::default(), &LayoutContext::default());

        let articulation = &record.articulations[0];
        let text = &record.texts[0];
        let dynamic = &record.dynamics[0];
        assert!(articulation.above);
        assert!(text.y > record.slots[0].stem_tip.unwrap());
        assert!(dynamic.y > text.y);
    }
}
