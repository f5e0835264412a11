//! Pass 8: dynamics and hairpins below all other ink
//!
//! A hairpin end snaps to the height of an absolute dynamic sitting on the
//! same slot. Ends with no such dynamic are leveled to the deepest point
//! the hairpin passes over.

use super::record::{DynamicPlacement, Hairpin, SlotGeometry};
use super::LayoutConfig;
use crate::models::MelodicLine;

/// Centre line for a dynamic below `slots`
fn baseline(slots: &[SlotGeometry], config: &LayoutConfig) -> f32 {
    let bottom = slots.iter().map(|s| s.ink.bottom).fold(config.bottom_y(), f32::max);
    bottom + config.dynamic_gap + config.dynamic_height / 2.0
}

pub fn place_dynamics(
    line: &MelodicLine,
    slots: &mut [SlotGeometry],
    width: f32,
    config: &LayoutConfig,
) -> (Vec<DynamicPlacement>, Vec<Hairpin>) {
    let mut dynamics = Vec::new();
    for (index, event) in line.events.iter().enumerate() {
        let Some(dynamic) = &event.dynamic else {
            continue;
        };
        let y = baseline(&slots[index..=index], config);
        dynamics.push(DynamicPlacement {
            slot: index,
            name: dynamic.name.clone(),
            x: slots[index].x,
            y,
        });
    }
    let dynamic_at = |slot: Option<usize>| slot.and_then(|s| dynamics.iter().find(|d| d.slot == s));

    let mut hairpins = Vec::new();
    for ramp in &line.ramps {
        let first = ramp.start.unwrap_or(0).min(slots.len().saturating_sub(1));
        let last = ramp.end.unwrap_or(slots.len().saturating_sub(1)).min(slots.len().saturating_sub(1));
        if slots.is_empty() || first > last {
            continue;
        }
        let level = baseline(&slots[first..=last], config);

        let start_dynamic = dynamic_at(ramp.start);
        let end_dynamic = dynamic_at(ramp.end);

        let x_start = match (ramp.start, start_dynamic) {
            (Some(_), Some(d)) => d.x + config.dynamic_width + config.hairpin_gap,
            (Some(s), None) => slots[s].x,
            (None, _) => 0.0,
        };
        let x_end = match (ramp.end, end_dynamic) {
            (Some(_), Some(d)) => d.x - config.hairpin_gap,
            (Some(e), None) => slots[e].x + config.notehead_width,
            (None, _) => width,
        };

        hairpins.push(Hairpin {
            direction: ramp.direction,
            start: ramp.start,
            end: ramp.end,
            x_start,
            x_end: x_end.max(x_start),
            y_start: start_dynamic.map_or(level, |d| d.y),
            y_end: end_dynamic.map_or(level, |d| d.y),
            opening: config.hairpin_opening,
        });
    }

    for dynamic in &dynamics {
        slots[dynamic.slot].ink.include(dynamic.y + config.dynamic_height / 2.0);
    }
    for hairpin in &hairpins {
        let deepest = hairpin.y_start.max(hairpin.y_end) + hairpin.opening / 2.0;
        for slot in slots.iter_mut().filter(|s| s.x >= hairpin.x_start && s.x <= hairpin.x_end) {
            slot.ink.include(deepest);
        }
    }

    (dynamics, hairpins)
}
