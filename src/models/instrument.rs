//! Instruments, clefs and the instrument registry
//!
//! The registry is the global name → (transposition, rhythm flag, clef)
//! table supplied by the host. It can be loaded from YAML:
//!
//! ```yaml
//! instruments:
//!   - name: violin
//!   - name: clarinet
//!     transposition: -2
//!   - name: drums
//!     rhythm: true
//!     clef: percussion
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use super::duration::NoteLength;
use super::event::{RampDirection, DEFAULT_LEVEL};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Clef {
    #[default]
    Treble,
    Bass,
    Alto,
    Tenor,
    Percussion,
}

impl Clef {
    /// Clef named by a line keyword (`bass`, `alto` ...)
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "treble" => Some(Clef::Treble),
            "bass" => Some(Clef::Bass),
            "alto" => Some(Clef::Alto),
            "tenor" => Some(Clef::Tenor),
            "percussion" => Some(Clef::Percussion),
            _ => None,
        }
    }

    /// Diatonic index (`step + 7 * octave`) sitting on the middle staff line
    pub fn middle_line(self) -> i32 {
        match self {
            Clef::Treble | Clef::Percussion => 13, // b'
            Clef::Alto => 7,                       // c'
            Clef::Tenor => 5,                      // a
            Clef::Bass => 1,                       // d
        }
    }
}

/// Static properties of one instrument
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Instrument {
    pub name: String,

    /// Semitones added to every written pitch to get the sounding pitch
    #[serde(default)]
    pub transposition: i8,

    /// Rhythm staves accept bare durations and always stem up
    #[serde(default)]
    pub rhythm: bool,

    #[serde(default)]
    pub clef: Clef,
}

impl Instrument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transposition: 0,
            rhythm: false,
            clef: Clef::Treble,
        }
    }

    pub fn with_transposition(mut self, semitones: i8) -> Self {
        self.transposition = semitones;
        self
    }

    pub fn with_clef(mut self, clef: Clef) -> Self {
        self.clef = clef;
        self
    }

    pub fn rhythm(mut self) -> Self {
        self.rhythm = true;
        self.clef = Clef::Percussion;
        self
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid instrument YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid instrument JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read instrument file: {0}")]
    Io(#[from] std::io::Error),

    #[error("instrument '{0}' is declared twice")]
    Duplicate(String),
}

#[derive(Deserialize)]
struct RegistryFile {
    #[serde(default)]
    instruments: Vec<Instrument>,
}

/// Name → instrument table, ordered by name
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct InstrumentRegistry {
    instruments: BTreeMap<String, Instrument>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml(text: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_yaml::from_str(text)?;
        Self::from_list(file.instruments)
    }

    pub fn from_json(text: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_json::from_str(text)?;
        Self::from_list(file.instruments)
    }

    /// Load a YAML registry file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    fn from_list(list: Vec<Instrument>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for instrument in list {
            if registry.instruments.contains_key(&instrument.name) {
                return Err(RegistryError::Duplicate(instrument.name));
            }
            registry.insert(instrument);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, instrument: Instrument) {
        self.instruments.insert(instrument.name.clone(), instrument);
    }

    pub fn get(&self, name: &str) -> Option<&Instrument> {
        self.instruments.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instruments.keys().map(|name| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.values()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

/// What an instrument's previous bar leaves behind for the next one
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InstrumentState {
    /// Length carried to a first slot written without duration digits
    pub last_length: Option<NoteLength>,

    /// Coarse dynamic level in effect
    pub level: u8,

    /// Slurs opened earlier and still waiting for their close
    pub open_slurs: usize,

    /// Ramp still open at the end of the previous bar
    pub open_ramp: Option<RampDirection>,
}

impl Default for InstrumentState {
    fn default() -> Self {
        Self {
            last_length: None,
            level: DEFAULT_LEVEL,
            open_slurs: 0,
            open_ramp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"
instruments:
  - name: violin
  - name: clarinet
    transposition: -2
  - name: cello
    clef: bass
  - name: drums
    rhythm: true
    clef: percussion
"#;

    #[test]
    fn test_registry_from_yaml() {
        let registry = InstrumentRegistry::from_yaml(REGISTRY).unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.get("clarinet").unwrap().transposition, -2);
        assert_eq!(registry.get("cello").unwrap().clef, Clef::Bass);
        assert!(registry.get("drums").unwrap().rhythm);
        assert_eq!(registry.get("violin").unwrap().clef, Clef::Treble);
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let text = "instruments:\n  - name: flute\n  - name: flute\n";
        assert!(matches!(
            InstrumentRegistry::from_yaml(text),
            Err(RegistryError::Duplicate(name)) if name == "flute"
        ));
    }

    #[test]
    fn test_registry_from_json() {
        let text = r#"{"instruments":[{"name":"horn","transposition":-7,"clef":"treble"}]}"#;
        let registry = InstrumentRegistry::from_json(text).unwrap();
        assert_eq!(registry.get("horn").unwrap().transposition, -7);
    }

    #[test]
    fn test_clef_keywords() {
        assert_eq!(Clef::from_keyword("bass"), Some(Clef::Bass));
        assert_eq!(Clef::from_keyword("b"), None);
        assert_eq!(Clef::Bass.middle_line(), 1);
    }
}
