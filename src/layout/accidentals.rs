//! Pass 3: accidentals
//!
//! Deferred naturals are settled here against the final alterations of the
//! bar drawn to the left. Within a chord, an accidental whose neighbouring
//! chord tone above is a second away moves one column further left.

use std::collections::BTreeMap;

use super::record::{AccidentalPlacement, SlotGeometry};
use super::LayoutConfig;
use crate::models::{AccidentalDisplay, AccidentalGlyph, MelodicLine};
use crate::parse::resolve::deferred_display;

pub fn place_accidentals(
    line: &MelodicLine,
    slots: &mut [SlotGeometry],
    previous: Option<&BTreeMap<(i8, i8), i8>>,
    config: &LayoutConfig,
) -> Vec<AccidentalPlacement> {
    let mut placements = Vec::new();
    if line.rhythm {
        return placements;
    }

    for (index, event) in line.events.iter().enumerate() {
        let slot = &mut slots[index];
        let pitches = event.content.pitches();

        // Top to bottom
        let mut order: Vec<usize> = (0..pitches.len()).collect();
        order.sort_by_key(|&head| std::cmp::Reverse(slot.heads[head].staff_index));

        let mut above: Option<(i32, usize)> = None;
        for head in order {
            let staff_index = slot.heads[head].staff_index;
            let column = match above {
                Some((neighbour, column)) if neighbour - staff_index == 1 => column + 1,
                _ => 0,
            };
            above = Some((staff_index, column));

            let AccidentalDisplay::Shown(alteration) = deferred_display(&pitches[head], previous) else {
                continue;
            };
            let glyph = AccidentalGlyph::from_alteration(alteration);
            let y = slot.heads[head].y;
            let x = slot.x - config.accidental_gap - config.accidental_width * (column + 1) as f32;

            slot.heads[head].accidental = Some(glyph);
            slot.ink.include(y - config.staff_space);
            slot.ink.include(y + config.staff_space);
            placements.push(AccidentalPlacement {
                slot: index,
                head,
                glyph,
                x,
                y,
            });
        }
    }

    placements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::placement::place_slots;
    use crate::layout::test_line;
    use crate::models::{Instrument, Meter};

    fn accidentals(text: &str, previous: Option<&BTreeMap<(i8, i8), i8>>) -> Vec<AccidentalPlacement> {
        let config = LayoutConfig::default();
        let line = test_line(text, Meter::default(), &Instrument::new("violin"));
        let mut slots = place_slots(&line, Meter::default(), &config);
        place_accidentals(&line, &mut slots, previous, &config)
    }

    #[test]
    fn test_carried_accidental_drawn_once() {
        let placed = accidentals("fis'4 f' f'! f'", None);
        let slots: Vec<usize> = placed.iter().map(|p| p.slot).collect();
        assert_eq!(slots, vec![0, 2]);
        assert_eq!(placed[0].glyph, AccidentalGlyph::Sharp);
        assert_eq!(placed[1].glyph, AccidentalGlyph::Natural);
    }

    #[test]
    fn test_deferred_natural_follows_previous_bar() {
        let mut finals = BTreeMap::new();
        finals.insert((3, 1), 2);
        let placed = accidentals("f'4 g' f'2", Some(&finals));
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].slot, 0);
        assert_eq!(placed[0].glyph, AccidentalGlyph::Natural);

        assert!(accidentals("f'4 g' f'2", None).is_empty());
    }

    #[test]
    fn test_seconds_in_a_chord_shift_left() {
        let config = LayoutConfig::default();
        let placed = accidentals("<fis' gis'>1", None);
        assert_eq!(placed.len(), 2);
        let gis = placed.iter().find(|p| p.head == 1).unwrap();
        let fis = placed.iter().find(|p| p.head == 0).unwrap();
        assert_eq!(gis.x - fis.x, config.accidental_width);

        let placed = accidentals("<fis' ais'>1", None);
        assert_eq!(placed[0].x, placed[1].x);
    }

    #[test]
    fn test_quarter_tones() {
        let placed = accidentals("cih''4 deh'' r2", None);
        assert_eq!(placed[0].glyph, AccidentalGlyph::QuarterSharp);
        assert_eq!(placed[1].glyph, AccidentalGlyph::QuarterFlat);
    }
}
