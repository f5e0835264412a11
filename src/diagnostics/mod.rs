//! Diagnostics for notation lines
//!
//! Parse failures and unresolved cross-bar links are both reported as
//! marks pointing at a byte offset in the line the user typed. Errors mean
//! the bar kept its previous contents; warnings mean it was drawn anyway.

pub mod links;

use serde::{Deserialize, Serialize};

use crate::models::BarId;

// Re-export commonly used types
pub use links::{error_mark, warning_marks};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

/// One highlighted span of a typed line
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DiagnosticMark {
    pub bar: Option<BarId>,
    pub instrument: Option<String>,
    /// Byte offset into the line as typed, before expansion
    pub offset: usize,
    /// Highlight width in bytes
    pub len: usize,
    pub severity: DiagnosticSeverity,
    /// Stable identifier such as "bar_length" or "tie_orphan_begin"
    pub kind: String,
    pub message: String,
}

impl DiagnosticMark {
    pub fn new(
        offset: usize,
        severity: DiagnosticSeverity,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            bar: None,
            instrument: None,
            offset,
            len: 1,
            severity,
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn with_len(mut self, len: usize) -> Self {
        self.len = len;
        self
    }

    /// Attach the bar and instrument the mark refers to
    pub fn at(mut self, bar: BarId, instrument: impl Into<String>) -> Self {
        self.bar = Some(bar);
        self.instrument = Some(instrument.into());
        self
    }

    pub fn for_instrument(mut self, instrument: impl Into<String>) -> Self {
        self.instrument = Some(instrument.into());
        self
    }
}

/// Marks gathered for one edit or one laid-out bar
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Diagnostics {
    pub marks: Vec<DiagnosticMark>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diagnostics holding a single mark
    pub fn single(mark: DiagnosticMark) -> Self {
        Self { marks: vec![mark] }
    }

    pub fn add(&mut self, mark: DiagnosticMark) {
        self.marks.push(mark);
    }

    pub fn extend(&mut self, marks: impl IntoIterator<Item = DiagnosticMark>) {
        self.marks.extend(marks);
    }

    /// An error mark means the bar kept its previous contents
    pub fn has_errors(&self) -> bool {
        self.marks.iter().any(|mark| mark.severity == DiagnosticSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticMark> {
        self.marks.iter().filter(|mark| mark.severity == DiagnosticSeverity::Warning)
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}
