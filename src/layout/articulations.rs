//! Pass 5: articulations, stacked outward on the notehead side

use super::record::{ArticulationPlacement, SlotGeometry, StemDirection};
use super::LayoutConfig;
use crate::models::MelodicLine;

pub fn place_articulations(line: &MelodicLine, slots: &mut [SlotGeometry], config: &LayoutConfig) -> Vec<ArticulationPlacement> {
    let mut placements = Vec::new();

    for (index, event) in line.events.iter().enumerate() {
        let slot = &mut slots[index];
        // Opposite the stem; above when there is none
        let above = slot.stem != Some(StemDirection::Up);
        let x = slot.x + config.notehead_width / 2.0;

        for &articulation in &event.articulations {
            // Portato is a dot under a line, so it takes two glyph heights
            let height = config.articulation_height * articulation.glyph_count() as f32;
            let y = if above {
                let y = slot.ink.top - config.articulation_gap - height / 2.0;
                slot.ink.top = y - height / 2.0;
                y
            } else {
                let y = slot.ink.bottom + config.articulation_gap + height / 2.0;
                slot.ink.bottom = y + height / 2.0;
                y
            };
            placements.push(ArticulationPlacement {
                slot: index,
                articulation,
                x,
                y,
                above,
            });
        }
    }

    placements
}
