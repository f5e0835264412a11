//! Marks for parse errors and unresolved cross-bar links
//!
//! An unmatched slur, tie or hairpin end is only a warning: the link is
//! drawn open-ended at the bar edge. A parse error is an error mark at the
//! offset the failing stage reported.

use crate::models::BarId;
use crate::parse::{NotationError, ResolutionWarning};

use super::{DiagnosticMark, DiagnosticSeverity};

/// Warning marks for links left open in a window of visible bars
pub fn warning_marks(bar: BarId, instrument: &str, warnings: &[ResolutionWarning]) -> Vec<DiagnosticMark> {
    warnings
        .iter()
        .map(|warning| {
            DiagnosticMark::new(warning.offset, DiagnosticSeverity::Warning, warning.kind(), warning.message())
                .at(bar, instrument)
        })
        .collect()
}

/// Error mark for a line that failed to parse
pub fn error_mark(bar: BarId, instrument: &str, error: &NotationError) -> DiagnosticMark {
    DiagnosticMark::new(error.offset(), DiagnosticSeverity::Error, error.kind(), error.to_string()).at(bar, instrument)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{BuildError, LinkKind};

    #[test]
    fn test_orphan_links_become_warnings() {
        let warnings = vec![
            ResolutionWarning {
                link: LinkKind::Slur,
                slot: 2,
                offset: 9,
                incoming: false,
            },
            ResolutionWarning {
                link: LinkKind::Tie,
                slot: 0,
                offset: 0,
                incoming: true,
            },
        ];
        let marks = warning_marks(BarId(4), "cello", &warnings);

        assert_eq!(marks.len(), 2);
        assert_eq!(marks[0].kind, "slur_orphan_begin");
        assert_eq!(marks[0].offset, 9);
        assert_eq!(marks[0].severity, DiagnosticSeverity::Warning);
        assert_eq!(marks[1].kind, "tie_orphan_end");
        assert_eq!(marks[1].bar, Some(BarId(4)));
    }

    #[test]
    fn test_parse_errors_become_error_marks() {
        let error: NotationError = BuildError::UnmatchedSlurClose { offset: 3 }.into();
        let mark = error_mark(BarId(0), "flute", &error);
        assert_eq!(mark.severity, DiagnosticSeverity::Error);
        assert_eq!(mark.offset, 3);
        assert_eq!(mark.kind, "slur_orphan_end");
        assert_eq!(mark.instrument.as_deref(), Some("flute"));
    }
}
