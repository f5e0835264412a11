//! Pass 7: text annotations, outside the staff and every earlier mark

use super::record::{SlotGeometry, TextPlacement};
use super::LayoutConfig;
use crate::models::{MelodicLine, Placement};

pub fn place_texts(line: &MelodicLine, slots: &mut [SlotGeometry], config: &LayoutConfig) -> Vec<TextPlacement> {
    let mut placements = Vec::new();

    for (index, event) in line.events.iter().enumerate() {
        let Some(annotation) = &event.annotation else {
            continue;
        };
        let slot = &mut slots[index];
        let y = match annotation.placement {
            Placement::Above => {
                let baseline = slot.ink.top.min(0.0) - config.text_gap;
                slot.ink.top = baseline - config.text_height;
                baseline
            }
            Placement::Below => {
                let baseline = slot.ink.bottom.max(config.bottom_y()) + config.text_gap + config.text_height;
                slot.ink.bottom = baseline;
                baseline
            }
        };
        placements.push(TextPlacement {
            slot: index,
            text: annotation.text.clone(),
            placement: annotation.placement,
            x: slot.x,
            y,
        });
    }

    placements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::placement::place_slots;
    use crate::layout::test_line;
    use crate::models::{Instrument, Meter};

    #[test]
    fn test_text_clears_staff_and_ink() {
        let config = LayoutConfig::default();
        let line = test_line("b'4^\"dolce\" c'''_\"rit.\" r2", Meter::default(), &Instrument::new("flute"));
        let mut slots = place_slots(&line, Meter::default(), &config);
        let texts = place_texts(&line, &mut slots, &config);

        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].text, "dolce");
        assert_eq!(texts[0].placement, Placement::Above);
        // b' sits inside the staff, so the staff top decides
        assert_eq!(texts[0].y, -config.text_gap);
        assert_eq!(slots[0].ink.top, -config.text_gap - config.text_height);

        assert_eq!(texts[1].placement, Placement::Below);
        assert_eq!(texts[1].y, config.bottom_y() + config.text_gap + config.text_height);
    }
}
