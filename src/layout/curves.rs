//! Pass 5 (continued): slurs, ties and glissandi
//!
//! Curves are cubic Béziers with both control points at the same offset
//! from the chord, placed at a third and two thirds of the width. The curve
//! then rises `3/4` of the control offset at its middle, so an offset of
//! `4h/3` gives a curve of height `h`.

use super::record::{Curve, GlissandoLine, SlotGeometry, StemDirection};
use super::LayoutConfig;
use crate::models::MelodicLine;

/// Curve renderer for slurs and ties
pub struct CurveRenderer;

impl CurveRenderer {
    /// Control offset producing a curve of `height` at its middle
    pub fn control_offset(height: f32) -> f32 {
        height * 4.0 / 3.0
    }

    /// Curve from (x0, y0) to (x1, y1) bulging by `height` to one side
    pub fn arc(start: Option<usize>, end: Option<usize>, from: (f32, f32), to: (f32, f32), height: f32, above: bool) -> Curve {
        let sign = if above { -1.0 } else { 1.0 };
        let offset = sign * Self::control_offset(height);
        let width = to.0 - from.0;
        Curve {
            start,
            end,
            above,
            x0: from.0,
            y0: from.1,
            cp1x: from.0 + width / 3.0,
            cp1y: from.1 + (to.1 - from.1) / 3.0 + offset,
            cp2x: from.0 + width * 2.0 / 3.0,
            cp2y: from.1 + (to.1 - from.1) * 2.0 / 3.0 + offset,
            x1: to.0,
            y1: to.1,
        }
    }

    /// Distance of the curve from its chord at fraction `t` of the width
    pub fn bulge(curve: &Curve, t: f32) -> f32 {
        let offset = (curve.cp1y - (curve.y0 + (curve.y1 - curve.y0) / 3.0)).abs();
        3.0 * offset * t * (1.0 - t)
    }

    /// SVG path data for a curve
    pub fn svg_path(curve: &Curve) -> String {
        format!(
            "M {} {} C {} {} {} {} {} {}",
            curve.x0, curve.y0, curve.cp1x, curve.cp1y, curve.cp2x, curve.cp2y, curve.x1, curve.y1
        )
    }
}

/// Fraction of the way from x0 to x1
fn fraction(x: f32, x0: f32, x1: f32) -> f32 {
    if (x1 - x0).abs() < f32::EPSILON {
        0.5
    } else {
        ((x - x0) / (x1 - x0)).clamp(0.0, 1.0)
    }
}

pub fn place_slurs(line: &MelodicLine, slots: &mut [SlotGeometry], width: f32, config: &LayoutConfig) -> Vec<Curve> {
    let mut curves = Vec::new();

    for link in &line.slurs {
        let ends: Vec<usize> = [link.start, link.end].into_iter().flatten().filter(|&i| i < slots.len()).collect();
        // Below only when every stemmed end points up
        let stemmed: Vec<StemDirection> = ends.iter().filter_map(|&i| slots[i].stem).collect();
        let above = stemmed.is_empty() || stemmed.iter().any(|d| *d == StemDirection::Down);
        let sign = if above { -1.0 } else { 1.0 };

        let end_y = |slot: &SlotGeometry| slot.ink.edge(above) + sign * config.slur_gap;
        let fallback = if slots.is_empty() {
            if above {
                -config.slur_gap
            } else {
                config.bottom_y() + config.slur_gap
            }
        } else {
            let edge = slots
                .iter()
                .map(|s| s.ink.edge(above))
                .fold(if above { 0.0_f32 } else { config.bottom_y() }, |acc, y| if above { acc.min(y) } else { acc.max(y) });
            edge + sign * config.slur_gap
        };

        let start = link.start.and_then(|i| slots.get(i)).map(|s| (s.x + config.notehead_width / 2.0, end_y(s)));
        let end = link.end.and_then(|i| slots.get(i)).map(|s| (s.x + config.notehead_width / 2.0, end_y(s)));
        let (from, to) = match (start, end) {
            (Some(a), Some(b)) => (a, b),
            (Some(a), None) => (a, (width, a.1)),
            (None, Some(b)) => ((0.0, b.1), b),
            (None, None) => ((0.0, fallback), (width, fallback)),
        };

        // Height needed to clear every slot strictly inside the curve
        let chord_at = |t: f32| from.1 + (to.1 - from.1) * t;
        let mut height = config.slur_min_height;
        for (index, slot) in slots.iter().enumerate() {
            if Some(index) == link.start || Some(index) == link.end {
                continue;
            }
            let x = slot.x + config.notehead_width / 2.0;
            if x <= from.0 || x >= to.0 {
                continue;
            }
            let t = fraction(x, from.0, to.0);
            let clearance = (end_y(slot) - chord_at(t)) * sign;
            if clearance > 0.0 {
                // Bulge at t is 4h·t(1-t) for a middle height of h
                height = height.max(clearance / (4.0 * t * (1.0 - t)));
            }
        }

        let curve = CurveRenderer::arc(link.start, link.end, from, to, height, above);
        for slot in slots.iter_mut() {
            let x = slot.x + config.notehead_width / 2.0;
            if x < from.0 || x > to.0 {
                continue;
            }
            let t = fraction(x, from.0, to.0);
            slot.ink.include(chord_at(t) + sign * CurveRenderer::bulge(&curve, t));
        }
        curves.push(curve);
    }

    curves
}

/// Ties, one curve per notehead of the starting slot
///
/// A single head ties on the side away from its stem; in a chord the upper
/// half ties above and the lower half below.
pub fn place_ties(line: &MelodicLine, slots: &mut [SlotGeometry], tied_in: bool, width: f32, config: &LayoutConfig) -> Vec<Curve> {
    let mut curves = Vec::new();

    if tied_in {
        if let Some(first) = slots.first_mut().filter(|s| !s.is_rest()) {
            let x1 = first.x;
            tie_slot(first, None, Some(0), (0.0, x1), config, &mut curves);
        }
    }

    for link in &line.ties {
        let Some(start) = link.start.filter(|&i| i < slots.len()) else {
            continue;
        };
        let x0 = slots[start].x + config.notehead_width;
        let x1 = match link.end.and_then(|i| slots.get(i)) {
            Some(slot) => slot.x,
            None => width,
        };
        tie_slot(&mut slots[start], link.start, link.end, (x0, x1), config, &mut curves);
    }

    curves
}

fn tie_slot(
    slot: &mut SlotGeometry,
    start: Option<usize>,
    end: Option<usize>,
    (x0, x1): (f32, f32),
    config: &LayoutConfig,
    curves: &mut Vec<Curve>,
) {
    let mut order: Vec<usize> = (0..slot.heads.len()).collect();
    order.sort_by(|&a, &b| slot.heads[a].y.total_cmp(&slot.heads[b].y));
    let count = order.len();

    for (rank, &head) in order.iter().enumerate() {
        let above = if count == 1 || (count % 2 == 1 && rank == count / 2) {
            slot.stem != Some(StemDirection::Up)
        } else {
            rank < count / 2
        };
        let sign = if above { -1.0 } else { 1.0 };
        let y = slot.heads[head].y + sign * config.step_height();
        curves.push(CurveRenderer::arc(start, end, (x0, y), (x1, y), config.tie_height, above));
        slot.ink.include(y + sign * config.tie_height);
    }
}

/// Straight lines from a glissando head to the next slot (or the bar end)
pub fn place_glissandi(line: &MelodicLine, slots: &[SlotGeometry], width: f32, config: &LayoutConfig) -> Vec<GlissandoLine> {
    line.events
        .iter()
        .enumerate()
        .filter(|(_, event)| event.glissando)
        .filter_map(|(index, _)| {
            let from = slots.get(index)?.heads.first()?;
            let next = slots.get(index + 1);
            let (x1, y1) = match next.and_then(|s| s.heads.first().map(|h| (s.x, h.y))) {
                Some(target) => target,
                None => (width, from.y),
            };
            Some(GlissandoLine {
                slot: index,
                x0: slots[index].x + config.notehead_width + config.accidental_gap,
                y0: from.y,
                x1: x1 - config.accidental_gap,
                y1,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::placement::place_slots;
    use crate::layout::stems::assign_stems;
    use crate::layout::test_line;
    use crate::models::{Instrument, Meter};

    fn prepared(text: &str) -> (MelodicLine, Vec<SlotGeometry>) {
        let config = LayoutConfig::default();
        let line = test_line(text, Meter::default(), &Instrument::new("violin"));
        let mut slots = place_slots(&line, Meter::default(), &config);
        assign_stems(&line, Meter::default(), &mut slots, &config);
        (line, slots)
    }

    #[test]
    fn test_arc_height() {
        let curve = CurveRenderer::arc(Some(0), Some(1), (0.0, 10.0), (90.0, 10.0), 6.0, true);
        assert_eq!(curve.cp1y, 2.0);
        assert_eq!(curve.cp2x, 60.0);
        assert!((CurveRenderer::bulge(&curve, 0.5) - 6.0).abs() < 1e-4);
        assert!(CurveRenderer::svg_path(&curve).starts_with("M 0 10 C 30 2"));
    }

    #[test]
    fn test_slur_clears_inner_notes() {
        let config = LayoutConfig::default();
        let (line, mut slots) = prepared("c''4( g'' g'' c'')");
        let before: Vec<f32> = slots.iter().map(|s| s.ink.top).collect();
        let slurs = place_slurs(&line, &mut slots, config.bar_width, &config);

        let slur = &slurs[0];
        // Stems point down, so the slur goes above
        assert!(slur.above);
        for (slot, top) in slots[1..3].iter().zip(&before[1..3]) {
            let x = slot.x + config.notehead_width / 2.0;
            let t = (x - slur.x0) / (slur.x1 - slur.x0);
            let y = slur.y0 + (slur.y1 - slur.y0) * t - CurveRenderer::bulge(slur, t);
            assert!(y <= top - config.slur_gap + 1e-3);
        }
    }

    #[test]
    fn test_open_slur_runs_to_bar_edge() {
        let config = LayoutConfig::default();
        let (line, mut slots) = prepared("c'2 e'(");
        let slurs = place_slurs(&line, &mut slots, config.bar_width, &config);
        assert_eq!(slurs[0].end, None);
        assert_eq!(slurs[0].x1, config.bar_width);
        assert_eq!(slurs[0].y1, slurs[0].y0);
        // The only end has its stem up, so the slur hangs below
        assert!(!slurs[0].above);
    }

    #[test]
    fn test_chord_ties_split_above_and_below() {
        let config = LayoutConfig::default();
        let (line, mut slots) = prepared("<c' e' g'>2~ <c' e' g'>");
        let ties = place_ties(&line, &mut slots, false, config.bar_width, &config);
        assert_eq!(ties.len(), 3);
        assert_eq!(ties.iter().filter(|t| t.above).count(), 1);
        assert!(ties.iter().all(|t| t.end == Some(1)));
        assert_eq!(ties[0].x1, slots[1].x);
    }

    #[test]
    fn test_tie_from_previous_bar() {
        let config = LayoutConfig::default();
        let (line, mut slots) = prepared("c''1");
        let ties = place_ties(&line, &mut slots, true, config.bar_width, &config);
        assert_eq!(ties.len(), 1);
        assert_eq!(ties[0].start, None);
        assert_eq!(ties[0].x0, 0.0);
        assert_eq!(ties[0].x1, slots[0].x);
    }

    #[test]
    fn test_glissando_reaches_next_head() {
        let config = LayoutConfig::default();
        let (line, slots) = prepared("c'2\\glissando g'");
        let lines = place_glissandi(&line, &slots, config.bar_width, &config);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].y1, slots[1].heads[0].y);
        assert!(lines[0].x1 < slots[1].x);
    }
}
