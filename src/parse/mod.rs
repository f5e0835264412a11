//! Parsing pipeline for notation lines
//!
//! raw line → [`expand`] → [`tokenize`] → [`build_line`] → melodic line.
//! Cross-bar concerns (deferred naturals, open-ended links) are settled later
//! by [`resolve`] once the visible bars are known.

pub mod builder;
pub mod errors;
pub mod expand;
pub mod note;
pub mod resolve;
pub mod tokens;

// Re-export commonly used types
pub use builder::{build_line, BarContext, BuildError, BuiltLine};
pub use errors::NotationError;
pub use expand::{expand, Expansion, ExpansionError, ExpansionErrorKind};
pub use resolve::{ControlLedger, LinkKind, ResolutionWarning};
pub use tokens::{tokenize, Token, TokenKind, TokenizationError};

use serde::{Deserialize, Serialize};

use crate::models::{Instrument, InstrumentState};

/// Parse one bar's line for one instrument
pub fn parse_line(
    text: &str,
    instrument: &Instrument,
    prior: &InstrumentState,
    context: BarContext,
) -> Result<BuiltLine, NotationError> {
    let expansion = expand(text)?;
    let tokens = tokenize(&expansion)?;
    Ok(build_line(&tokens, instrument, prior, context)?)
}

/// Where a multi-bar declaration has got to for one instrument
///
/// Each instrument threads its own cursor through [`parse_bars`], so
/// declarations for different instruments never share state.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MacroCursor {
    /// Position in the bar order of the next bar to fill
    pub position: usize,
    /// State left by the previous bar of this instrument
    pub state: InstrumentState,
    pub meter: crate::models::Meter,
    pub tempo: crate::models::Tempo,
}

impl MacroCursor {
    pub fn new(position: usize, state: InstrumentState, context: BarContext) -> Self {
        Self {
            position,
            state,
            meter: context.meter,
            tempo: context.tempo,
        }
    }

    pub fn context(&self) -> BarContext {
        BarContext {
            meter: self.meter,
            tempo: self.tempo,
        }
    }

    fn advance(&mut self, built: &BuiltLine) {
        self.position += 1;
        self.state = built.line.closing.clone();
        self.meter = built.meter;
        self.tempo = built.tempo;
    }
}

const BARS_KEYWORD: &str = "\\bars";

/// Parse `\bars a | b | c` into consecutive bars
///
/// The whole declaration is expanded once, so a repeat may span bar
/// separators. Either every bar parses or an error is returned and the
/// cursor is left where it was.
pub fn parse_bars(
    text: &str,
    instrument: &Instrument,
    cursor: &mut MacroCursor,
) -> Result<Vec<BuiltLine>, NotationError> {
    // Blank out the keyword so offsets still match the typed line
    let trimmed = text.trim_start();
    let source = match trimmed.strip_prefix(BARS_KEYWORD) {
        Some(rest) => format!("{}{}", " ".repeat(text.len() - rest.len()), rest),
        None => text.to_string(),
    };

    let expansion = expand(&source)?;
    let tokens = tokenize(&expansion)?;

    let mut working = cursor.clone();
    let mut bars = Vec::new();
    for chunk in tokens.split(|t| t.kind == TokenKind::BarSeparator) {
        let built = build_line(chunk, instrument, &working.state, working.context())?;
        working.advance(&built);
        bars.push(built);
    }

    log::info!("🎼 declared {} bars for '{}'", bars.len(), instrument.name);
    *cursor = working;
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Meter, Tempo};

    fn context() -> BarContext {
        BarContext {
            meter: Meter::default(),
            tempo: Tempo::default(),
        }
    }

    #[test]
    fn test_parse_line_runs_the_whole_pipeline() {
        let built = parse_line("[c8 d]*2 e2", &Instrument::new("flute"), &InstrumentState::default(), context()).unwrap();
        assert_eq!(built.line.len(), 5);
        assert_eq!(built.line.total_duration(), 256);
    }

    #[test]
    fn test_parse_line_reports_original_offsets() {
        let err = parse_line("c4 d4 x4", &Instrument::new("flute"), &InstrumentState::default(), context()).unwrap_err();
        assert_eq!(err.offset(), 6);
    }

    #[test]
    fn test_parse_bars_threads_state_through_the_cursor() {
        let mut cursor = MacroCursor::new(3, InstrumentState::default(), context());
        let bars = parse_bars("\\bars c4 d e f( | g1) | \\time 3/4 a2.", &Instrument::new("oboe"), &mut cursor).unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[1].line.slurs[0].start, None);
        assert_eq!(bars[2].meter.bar_duration(), 192);
        assert_eq!(cursor.position, 6);
        assert_eq!(cursor.meter, Meter::new(3, 4).unwrap());
    }

    #[test]
    fn test_parse_bars_is_all_or_nothing() {
        let mut cursor = MacroCursor::new(0, InstrumentState::default(), context());
        let err = parse_bars("c1 | d2 | e1", &Instrument::new("oboe"), &mut cursor).unwrap_err();
        assert!(matches!(err, NotationError::Build(BuildError::BarLength { .. })));
        assert_eq!(err.offset(), 5);
        assert_eq!(cursor.position, 0);
    }
}
