//! Pass 2: stem directions, beam groups and stem tips
//!
//! Every notehead votes by its side of the middle line (above votes down,
//! below votes up). An even vote goes up, and a rhythm staff is always up.
//! A beam group takes one direction from the summed votes of all its heads.

use super::record::{BeamGroup, SlotGeometry, StemDirection};
use super::LayoutConfig;
use crate::models::{Meter, MelodicLine, MINDUR, QUARTER};

pub fn assign_stems(line: &MelodicLine, meter: Meter, slots: &mut [SlotGeometry], config: &LayoutConfig) -> Vec<BeamGroup> {
    let middle = line.clef.middle_line();

    let groups = beam_runs(line, meter);
    let mut beams = Vec::new();

    for &(start, end) in &groups {
        let direction = if line.rhythm {
            StemDirection::Up
        } else {
            let votes: i32 = slots[start..=end].iter().map(|slot| vote(slot, middle)).sum();
            from_votes(votes)
        };
        beams.push(beam_group(start, end, direction, slots, config));
    }

    for index in 0..line.len() {
        if !has_stem(line, index) || beams.iter().any(|b| (b.start..=b.end).contains(&index)) {
            continue;
        }
        let direction = if line.rhythm {
            StemDirection::Up
        } else {
            from_votes(vote(&slots[index], middle))
        };
        free_stem(&mut slots[index], direction, config);
    }

    beams
}

fn has_stem(line: &MelodicLine, slot: usize) -> bool {
    let event = &line.events[slot];
    !event.is_rest() && event.display_duration < MINDUR
}

/// Positive votes mean up
fn vote(slot: &SlotGeometry, middle: i32) -> i32 {
    slot.heads.iter().map(|head| (middle - head.staff_index).signum()).sum()
}

fn from_votes(votes: i32) -> StemDirection {
    if votes >= 0 {
        StemDirection::Up
    } else {
        StemDirection::Down
    }
}

/// x of the stem: right of the head going up, left going down
pub fn stem_x(slot: &SlotGeometry, direction: StemDirection, config: &LayoutConfig) -> f32 {
    match direction {
        StemDirection::Up => slot.x + config.notehead_width,
        StemDirection::Down => slot.x,
    }
}

/// Head the stem grows from (the outermost one on the stem side)
fn anchor(slot: &SlotGeometry, direction: StemDirection) -> Option<f32> {
    let (top, bottom) = slot.head_span()?;
    Some(match direction {
        StemDirection::Up => top,
        StemDirection::Down => bottom,
    })
}

fn free_stem(slot: &mut SlotGeometry, direction: StemDirection, config: &LayoutConfig) {
    let Some(anchor) = anchor(slot, direction) else {
        return;
    };
    let mut tip = anchor + direction.sign() * config.stem_length;
    // Stems always reach the middle line
    tip = match direction {
        StemDirection::Up => tip.min(config.middle_y()),
        StemDirection::Down => tip.max(config.middle_y()),
    };
    slot.stem = Some(direction);
    slot.stem_tip = Some(tip);
    slot.ink.include(tip);
}

/// Slot ranges to beam together
///
/// Consecutive slots shorter than a quarter within one beat form a run;
/// rests at either end of a run are dropped and runs of fewer than two
/// slots are not beamed.
pub fn beam_runs(line: &MelodicLine, meter: Meter) -> Vec<(usize, usize)> {
    let beat = meter.beat_duration().max(1);
    let onsets = line.onsets();

    let mut runs = Vec::new();
    let mut current: Option<(usize, usize, u32)> = None;
    for (index, event) in line.events.iter().enumerate() {
        let beamable = event.display_duration < QUARTER;
        let beat_index = onsets[index] / beat;
        match current {
            Some((start, _, b)) if beamable && b == beat_index => current = Some((start, index, b)),
            _ => {
                if let Some((start, end, _)) = current.take() {
                    runs.push((start, end));
                }
                if beamable {
                    current = Some((index, index, beat_index));
                }
            }
        }
    }
    if let Some((start, end, _)) = current {
        runs.push((start, end));
    }

    runs.into_iter()
        .filter_map(|(mut start, mut end)| {
            while start <= end && line.events[start].is_rest() {
                start += 1;
            }
            while end > start && line.events[end].is_rest() {
                end -= 1;
            }
            (end > start).then_some((start, end))
        })
        .collect()
}

fn beam_group(start: usize, end: usize, direction: StemDirection, slots: &mut [SlotGeometry], config: &LayoutConfig) -> BeamGroup {
    let sign = direction.sign();
    // (stem x, tip at natural stem length) for every note in the group
    let ideal: Vec<(usize, f32, f32)> = (start..=end)
        .filter_map(|index| {
            let slot = &slots[index];
            let anchor = anchor(slot, direction)?;
            Some((index, stem_x(slot, direction, config), anchor + sign * config.stem_length))
        })
        .collect();

    let x_start = stem_x(&slots[start], direction, config);
    let x_end = stem_x(&slots[end], direction, config);
    let first = ideal.first().map(|i| i.2).unwrap_or(config.middle_y());
    let last = ideal.last().map(|i| i.2).unwrap_or(first);

    let rise = if monotonic(&ideal) {
        let limit = config.beam_slope_step * (ideal.len().saturating_sub(1)) as f32;
        (last - first).signum() * (last - first).abs().min(limit)
    } else {
        0.0
    };

    let mut group = BeamGroup {
        start,
        end,
        direction,
        levels: (start..=end).map(|i| slots[i].beam_count).max().unwrap_or(1).max(1),
        x_start,
        x_end,
        y_start: first,
        y_end: first + rise,
    };

    // Move the line to the closest position where no stem is shorter than natural
    let shift = ideal
        .iter()
        .map(|&(_, x, tip)| tip - group.y_at(x))
        .fold(0.0_f32, |acc, d| match direction {
            StemDirection::Up => acc.min(d),
            StemDirection::Down => acc.max(d),
        });
    group.y_start += shift;
    group.y_end += shift;

    for &(index, x, _) in &ideal {
        let tip = group.y_at(x);
        let slot = &mut slots[index];
        slot.stem = Some(direction);
        slot.stem_tip = Some(tip);
        slot.ink.include(tip + sign * config.beam_thickness / 2.0);
    }

    group
}

/// Notes strictly rise or strictly fall across the group
fn monotonic(ideal: &[(usize, f32, f32)]) -> bool {
    if ideal.len() < 2 {
        return false;
    }
    let steps: Vec<f32> = ideal.windows(2).map(|w| w[1].2 - w[0].2).collect();
    steps.iter().all(|d| *d > 0.0) || steps.iter().all(|d| *d < 0.0)
}
