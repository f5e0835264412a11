//! Pass 1: horizontal positions, noteheads and ledger lines

use super::record::{InkExtent, Notehead, SlotGeometry};
use super::LayoutConfig;
use crate::models::{Meter, MelodicLine};

/// y of a diatonic index on a staff whose middle line is `middle`
pub fn staff_y(index: i32, middle: i32, config: &LayoutConfig) -> f32 {
    config.middle_y() - (index - middle) as f32 * config.step_height()
}

/// x of an onset; slots are spaced in proportion to time within the bar
pub fn onset_x(onset: u32, meter: Meter, config: &LayoutConfig) -> f32 {
    let usable = config.bar_width - config.left_padding - config.right_padding;
    let bar = meter.bar_duration().max(1) as f32;
    config.left_padding + usable * onset as f32 / bar
}

/// Ledger lines needed (above, below) for one diatonic index
pub fn ledger_lines(index: i32, middle: i32) -> (u8, u8) {
    let above = (index - (middle + 4)).max(0) / 2;
    let below = ((middle - 4) - index).max(0) / 2;
    (above as u8, below as u8)
}

pub fn place_slots(line: &MelodicLine, meter: Meter, config: &LayoutConfig) -> Vec<SlotGeometry> {
    let middle = line.clef.middle_line();
    let half_head = config.step_height();

    line.onsets()
        .into_iter()
        .zip(&line.events)
        .map(|(onset, event)| {
            let x = onset_x(onset, meter, config);

            let heads: Vec<Notehead> = event
                .content
                .pitches()
                .iter()
                .map(|pitch| {
                    // Rhythm staves put every head on the middle line
                    let index = if line.rhythm {
                        middle
                    } else {
                        pitch.natural - 7 * event.ottava as i32
                    };
                    Notehead {
                        y: staff_y(index, middle, config),
                        staff_index: index,
                        accidental: None,
                    }
                })
                .collect();

            let (mut ledger_above, mut ledger_below) = (0, 0);
            for head in &heads {
                let (above, below) = ledger_lines(head.staff_index, middle);
                ledger_above = ledger_above.max(above);
                ledger_below = ledger_below.max(below);
            }

            let (rest_y, ink) = match heads.iter().map(|h| h.y).reduce(f32::min) {
                Some(top) => {
                    let bottom = heads.iter().map(|h| h.y).fold(top, f32::max);
                    (None, InkExtent::new(top - half_head, bottom + half_head))
                }
                None => {
                    let y = config.middle_y();
                    (Some(y), InkExtent::new(y - config.staff_space, y + config.staff_space))
                }
            };

            SlotGeometry {
                x,
                heads,
                rest_y,
                stem: None,
                stem_tip: None,
                beam_count: event.length.beam_count(),
                ledger_above,
                ledger_below,
                ink,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Clef, Instrument, Meter, QUARTER};
    use crate::layout::test_line;

    fn line(text: &str, instrument: &Instrument) -> MelodicLine {
        test_line(text, Meter::default(), instrument)
    }

    #[test]
    fn test_middle_line_and_steps() {
        let config = LayoutConfig::default();
        assert_eq!(staff_y(13, 13, &config), 16.0);
        assert_eq!(staff_y(17, 13, &config), 0.0);
        assert_eq!(staff_y(9, 13, &config), 32.0);
    }

    #[test]
    fn test_ledger_lines() {
        // Treble: c' (7) needs one below, a'' (19) one above, g'' (18) none
        assert_eq!(ledger_lines(7, 13), (0, 1));
        assert_eq!(ledger_lines(19, 13), (1, 0));
        assert_eq!(ledger_lines(18, 13), (0, 0));
        assert_eq!(ledger_lines(3, 13), (0, 3));
    }

    #[test]
    fn test_slots_are_spaced_by_onset() {
        let config = LayoutConfig::default();
        let slots = place_slots(&line("c'4 d' e'2", &Instrument::new("flute")), Meter::default(), &config);
        let usable = config.bar_width - config.left_padding - config.right_padding;

        assert_eq!(slots[0].x, config.left_padding);
        assert_eq!(slots[1].x, config.left_padding + usable * QUARTER as f32 / 256.0);
        assert_eq!(slots[2].x, config.left_padding + usable / 2.0);
        assert_eq!(slots[0].ledger_below, 1);
        assert_eq!(slots[0].ink.bottom, 40.0 + 4.0);
    }

    #[test]
    fn test_ottava_lowers_the_displayed_index() {
        let config = LayoutConfig::default();
        let slots = place_slots(&line("\\ottava 1 c'''4 r2.", &Instrument::new("piccolo")), Meter::default(), &config);
        assert_eq!(slots[0].heads[0].staff_index, 14);
        assert_eq!(slots[0].ledger_above, 0);
        assert!(slots[1].is_rest());
        assert_eq!(slots[1].rest_y, Some(16.0));
    }

    #[test]
    fn test_clef_moves_the_staff() {
        let config = LayoutConfig::default();
        let cello = Instrument::new("cello").with_clef(Clef::Bass);
        let slots = place_slots(&line("d1", &cello), Meter::default(), &config);
        assert_eq!(slots[0].heads[0].y, config.middle_y());
    }
}
