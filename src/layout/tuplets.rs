//! Pass 4: tuplet brackets
//!
//! The bracket sits on the side most stems point to (above when there are
//! no stems). It slants with the ink when the ink along that side rises or
//! falls steadily, and lies flat otherwise. A range that is exactly one beam
//! group shows the numeral alone.

use super::record::{BeamGroup, SlotGeometry, StemDirection, TupletBracket};
use super::LayoutConfig;
use crate::models::MelodicLine;

pub fn place_tuplets(
    line: &MelodicLine,
    beams: &[BeamGroup],
    slots: &mut [SlotGeometry],
    config: &LayoutConfig,
) -> Vec<TupletBracket> {
    let count = slots.len();
    line.tuplets
        .iter()
        .filter(|range| range.end < count && range.start <= range.end)
        .map(|range| {
            let span = &slots[range.start..=range.end];
            let (up, down) = span.iter().fold((0, 0), |(up, down), slot| match slot.stem {
                Some(StemDirection::Up) => (up + 1, down),
                Some(StemDirection::Down) => (up, down + 1),
                None => (up, down),
            });
            let above = up >= down;
            let sign = if above { -1.0 } else { 1.0 };

            let x_start = span[0].x;
            let x_end = span[span.len() - 1].x + config.notehead_width;
            let edges: Vec<(f32, f32)> = span.iter().map(|slot| (slot.x, slot.ink.edge(above))).collect();

            let (mut y_start, mut y_end) = if steady(&edges) {
                (edges[0].1, edges[edges.len() - 1].1)
            } else {
                let outer = outermost(edges.iter().map(|e| e.1), above);
                (outer, outer)
            };

            // Clear every slot on the chosen side, then add the gap
            let line_at = |x: f32, y0: f32, y1: f32| {
                if (x_end - x_start).abs() < f32::EPSILON {
                    y0
                } else {
                    y0 + (y1 - y0) * (x - x_start) / (x_end - x_start)
                }
            };
            let shift = edges
                .iter()
                .map(|&(x, edge)| edge - line_at(x, y_start, y_end))
                .fold(0.0_f32, |acc, d| if above { acc.min(d) } else { acc.max(d) });
            y_start += shift + sign * config.tuplet_gap;
            y_end += shift + sign * config.tuplet_gap;

            let numeral_x = (x_start + x_end) / 2.0;
            let numeral_y = line_at(numeral_x, y_start, y_end);
            let bracket = !beams.iter().any(|b| b.start == range.start && b.end == range.end);

            for slot in &mut slots[range.start..=range.end] {
                let y = line_at(slot.x, y_start, y_end);
                slot.ink.include(y + sign * config.tuplet_numeral_height / 2.0);
            }

            TupletBracket {
                start: range.start,
                end: range.end,
                numeral: range.numeral(),
                above,
                bracket,
                x_start,
                x_end,
                y_start,
                y_end,
                gap_start: numeral_x - config.tuplet_numeral_width / 2.0,
                gap_end: numeral_x + config.tuplet_numeral_width / 2.0,
                numeral_x,
                numeral_y,
            }
        })
        .collect()
}

/// Ink edge moves in one direction only across the range
fn steady(edges: &[(f32, f32)]) -> bool {
    if edges.len() < 2 {
        return false;
    }
    let deltas: Vec<f32> = edges.windows(2).map(|w| w[1].1 - w[0].1).collect();
    deltas.iter().all(|d| *d > 0.0) || deltas.iter().all(|d| *d < 0.0)
}

fn outermost(values: impl Iterator<Item = f32>, above: bool) -> f32 {
    values.fold(if above { f32::MAX } else { f32::MIN }, |acc, y| if above { acc.min(y) } else { acc.max(y) })
}
