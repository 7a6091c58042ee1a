//! Diagnostics raised while compiling a route.
//!
//! Malformed input never aborts a compile. Every problem becomes a
//! [`Diagnostic`] pushed into a [`DiagnosticSink`] and parsing continues with
//! a substituted default.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Where in the source a command came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    /// 1-based line number.
    pub line: usize,
    /// 1-based expression column on that line.
    pub column: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "at line {}, column {} in file {}",
            self.line, self.column, self.file
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Set when the message reports a referenced file that does not exist.
    pub file_not_found: bool,
    pub message: String,
    pub location: SourceLocation,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {} {}", self.severity, self.message, self.location)
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Receiver for compile diagnostics.
pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: Diagnostic);
}

/// Stores every diagnostic and mirrors it to `tracing`.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    diagnostics: Vec<Diagnostic>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Number of diagnostics at `Error` or above.
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity >= Severity::Error)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Info => tracing::debug!(location = %diagnostic.location, "{}", diagnostic.message),
            Severity::Warning => tracing::warn!(location = %diagnostic.location, "{}", diagnostic.message),
            Severity::Error | Severity::Critical => {
                tracing::error!(location = %diagnostic.location, "{}", diagnostic.message)
            }
        }
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(severity: Severity) -> Diagnostic {
        Diagnostic {
            severity,
            file_not_found: false,
            message: "m".into(),
            location: SourceLocation::new("route.csv", 3, 1),
        }
    }

    #[test]
    fn counts_by_severity() {
        let mut sink = CollectingSink::new();
        sink.emit(diag(Severity::Warning));
        sink.emit(diag(Severity::Error));
        sink.emit(diag(Severity::Critical));
        assert_eq!(sink.count(Severity::Warning), 1);
        assert_eq!(sink.error_count(), 2);
        assert_eq!(sink.diagnostics().len(), 3);
    }

    #[test]
    fn display_includes_location() {
        let text = diag(Severity::Error).to_string();
        assert!(text.contains("line 3"));
        assert!(text.contains("route.csv"));
    }
}
