//! Duration arithmetic, meter and tempo
//!
//! All rhythmic values are integers in minimum-duration units. A whole note
//! is [`MINDUR`] units, so a duration digit `d` means `MINDUR / d`.

use serde::{Deserialize, Serialize};

/// Units in a whole note
pub const MINDUR: u32 = 256;

/// Units in a quarter note (shortest value that is never beamed)
pub const QUARTER: u32 = MINDUR / 4;

/// Largest duration digit accepted by the grammar
pub const MAX_DURATION_DIGIT: u32 = 128;

/// Convert a duration digit ("4" = quarter) into units
///
/// Returns `None` unless the digit is a power of two in `1..=128`.
pub fn digit_value(digit: u32) -> Option<u32> {
    if digit == 0 || digit > MAX_DURATION_DIGIT || !digit.is_power_of_two() {
        return None;
    }
    Some(MINDUR / digit)
}

/// Apply `dots` augmentation dots to a base value
///
/// Each dot adds half of the previously added increment.
pub fn dotted(base: u32, dots: u8) -> u32 {
    let mut total = base;
    let mut increment = base / 2;
    for _ in 0..dots {
        total += increment;
        increment /= 2;
    }
    total
}

/// A written note length: the undotted base value plus its dots
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NoteLength {
    /// Undotted value in units (64 for a quarter)
    pub base: u32,
    pub dots: u8,
}

impl NoteLength {
    pub fn new(base: u32, dots: u8) -> Self {
        Self { base, dots }
    }

    /// Dotted value in units, before any tuplet scaling
    pub fn units(&self) -> u32 {
        dotted(self.base, self.dots)
    }

    /// Number of beams or flags this length carries (eighth = 1)
    pub fn beam_count(&self) -> u8 {
        let mut count = 0;
        let mut value = QUARTER / 2;
        while value >= self.base && value > 0 {
            count += 1;
            value /= 2;
        }
        count
    }
}

/// Time signature
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Meter {
    pub numerator: u32,
    pub denominator: u32,
}

impl Meter {
    /// Create a meter, rejecting denominators that are not powers of two
    pub fn new(numerator: u32, denominator: u32) -> Option<Self> {
        if numerator == 0 || numerator > 64 || digit_value(denominator).is_none() {
            return None;
        }
        Some(Self { numerator, denominator })
    }

    /// Parse "3/4"
    pub fn parse(text: &str) -> Option<Self> {
        let (num, den) = text.split_once('/')?;
        Self::new(num.trim().parse().ok()?, den.trim().parse().ok()?)
    }

    /// Total bar length in units
    pub fn bar_duration(&self) -> u32 {
        self.numerator * (MINDUR / self.denominator)
    }

    /// Metrical beat length used for beam grouping
    ///
    /// Compound meters (6/8, 9/8, 12/16 ...) beat in dotted units.
    pub fn beat_duration(&self) -> u32 {
        let unit = MINDUR / self.denominator;
        if self.denominator >= 8 && self.numerator > 3 && self.numerator % 3 == 0 {
            unit * 3
        } else {
            unit
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl std::fmt::Display for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Tempo marking: `unit` is a duration digit, optionally dotted
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tempo {
    pub unit: u32,
    pub bpm: u32,
    pub dotted: bool,
}

impl Tempo {
    /// Parse "4=120", "4.=60" or "4 = 120"
    pub fn parse(text: &str) -> Option<Self> {
        let (unit, bpm) = text.split_once('=')?;
        let unit = unit.trim();
        let (unit, dotted) = match unit.strip_suffix('.') {
            Some(stripped) => (stripped, true),
            None => (unit, false),
        };
        let unit: u32 = unit.parse().ok()?;
        digit_value(unit)?;
        let bpm: u32 = bpm.trim().parse().ok()?;
        if bpm == 0 {
            return None;
        }
        Some(Self { unit, bpm, dotted })
    }

    /// Length of one tempo beat in units
    pub fn beat_units(&self) -> u32 {
        let base = MINDUR / self.unit;
        if self.dotted {
            dotted(base, 1)
        } else {
            base
        }
    }

    /// Seconds occupied by `units` at this tempo
    pub fn seconds(&self, units: u32) -> f64 {
        units as f64 / self.beat_units() as f64 * 60.0 / self.bpm as f64
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            unit: 4,
            bpm: 120,
            dotted: false,
        }
    }
}
