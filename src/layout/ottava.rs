//! Pass 6: ottava brackets over runs of slots sharing a shift

use super::record::{OttavaBracket, SlotGeometry};
use super::LayoutConfig;
use crate::models::MelodicLine;

/// Label printed at the start of a bracket
pub fn ottava_label(level: i8) -> &'static str {
    match level {
        2 => "15ma",
        1 => "8va",
        -1 => "8vb",
        -2 => "15mb",
        _ => "",
    }
}

pub fn place_ottavas(line: &MelodicLine, slots: &mut [SlotGeometry], config: &LayoutConfig) -> Vec<OttavaBracket> {
    let mut runs: Vec<(usize, usize, i8)> = Vec::new();
    for (index, event) in line.events.iter().enumerate() {
        match runs.last_mut() {
            Some((_, end, level)) if *level == event.ottava && *end + 1 == index => *end = index,
            _ => runs.push((index, index, event.ottava)),
        }
    }

    let count = slots.len();
    runs.into_iter()
        .filter(|&(_, _, level)| level != 0)
        .filter(|&(_, end, _)| end < count)
        .map(|(start, end, level)| {
            let above = level > 0;
            let span = &mut slots[start..=end];
            let y = if above {
                let top = span.iter().map(|s| s.ink.top).fold(0.0_f32, f32::min);
                top - config.ottava_gap - config.ottava_height / 2.0
            } else {
                let bottom = span.iter().map(|s| s.ink.bottom).fold(config.bottom_y(), f32::max);
                bottom + config.ottava_gap + config.ottava_height / 2.0
            };
            for slot in span.iter_mut() {
                slot.ink.include(y - config.ottava_height / 2.0);
                slot.ink.include(y + config.ottava_height / 2.0);
            }

            let x_start = span[0].x;
            OttavaBracket {
                start,
                end,
                level,
                label: ottava_label(level).to_string(),
                above,
                x_start,
                line_start: x_start + config.ottava_label_width,
                x_end: span[span.len() - 1].x + config.notehead_width,
                y,
                tick: if above { config.ottava_tick } else { -config.ottava_tick },
            }
        })
        .collect()
}
