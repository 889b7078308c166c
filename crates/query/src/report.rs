//! Diagnostics collected during a query and the reports handed back to the
//! caller.

use crate::condition::Mode;
use serde::Serialize;
use sheetquery_sheet::{Sheet, SheetError};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// One user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity.as_str(), self.message)
    }
}

/// Why a query produced no table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportKind {
    /// No sheet selected, or a selected sheet does not exist
    NoSelection,
    /// The selected sheets have no columns
    NoColumns,
    /// No active condition; only ever a notice
    NoConditions,
    /// Query ran but no row matched
    EmptyResult,
    /// A condition references a missing column or has a bad value
    ConditionError,
    /// Conditions on one column can never hold together
    ContradictionError,
    /// Merge requested but the sheets share no column
    MergeUnavailable,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::NoSelection => "no sheet selected",
            ReportKind::NoColumns => "no columns available",
            ReportKind::NoConditions => "no conditions",
            ReportKind::EmptyResult => "no matching data",
            ReportKind::ConditionError => "condition error",
            ReportKind::ContradictionError => "contradictory conditions",
            ReportKind::MergeUnavailable => "merge unavailable",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure report: every message gathered before giving up
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind}: {}", .messages.join("; "))]
pub struct QueryFailure {
    pub kind: ReportKind,
    pub messages: Vec<String>,
}

impl QueryFailure {
    pub fn new(kind: ReportKind, message: impl Into<String>) -> Self {
        QueryFailure {
            kind,
            messages: vec![message.into()],
        }
    }

    /// Failure carrying every collected diagnostic, in order
    pub fn from_diagnostics(kind: ReportKind, diagnostics: &[Diagnostic]) -> Self {
        QueryFailure {
            kind,
            messages: diagnostics.iter().map(|d| d.message.clone()).collect(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }
}

impl From<SheetError> for QueryFailure {
    fn from(e: SheetError) -> Self {
        QueryFailure::new(ReportKind::ConditionError, e.to_string())
    }
}

/// A successful query: the result table plus notices worth showing
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub table: Sheet,
    pub notices: Vec<Diagnostic>,
    /// Mode that actually produced the table
    pub mode: Mode,
    /// Merge was requested but the engine fell back to stacking
    pub fell_back: bool,
}

impl QueryResult {
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.notices
            .iter()
            .filter(|d| d.severity >= Severity::Warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display_joins_messages() {
        let failure = QueryFailure::new(ReportKind::ConditionError, "column 'x' not found")
            .with_message("column 'y' not found");
        assert_eq!(
            failure.to_string(),
            "condition error: column 'x' not found; column 'y' not found"
        );
    }

    #[test]
    fn test_from_diagnostics_keeps_order() {
        let diagnostics = vec![Diagnostic::warning("first"), Diagnostic::error("second")];
        let failure = QueryFailure::from_diagnostics(ReportKind::EmptyResult, &diagnostics);
        assert_eq!(failure.messages, vec!["first", "second"]);
        assert!(diagnostics[1].is_error());
        assert_eq!(diagnostics[0].to_string(), "warning: first");
    }
}
