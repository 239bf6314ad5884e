//! Diagnostics bus: a severity-tagged record type shared by
//! every evaluator stage, routed both to an I/O sink (stderr by default)
//! and appended to the event stream as `EV_DIAGNOSTIC`.
//!
//! Typed, structured failures rather than ad-hoc strings, kept as a flat
//! record shape so the event stream can carry them alongside build events.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
    FatalError,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Warning => "Warning",
            Severity::Error => "Error",
            Severity::FatalError => "Fatal Error",
        };
        write!(f, "{s}")
    }
}

/// One diagnostic record. `hint` is always present (possibly empty) —
/// every diagnostic carries a hint field even when there is nothing
/// useful to say, so downstream consumers never have to special-case its
/// absence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file_path: String,
    pub line: usize,
    pub col: usize,
    pub component: String,
    pub command: String,
    pub cause: String,
    pub hint: String,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        file_path: impl Into<String>,
        line: usize,
        col: usize,
        component: impl Into<String>,
        command: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            file_path: file_path.into(),
            line,
            col,
            component: component.into(),
            command: command.into(),
            cause: cause.into(),
            hint: String::new(),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} ({}): {}",
            self.file_path, self.line, self.col, self.severity, self.command, self.cause
        )?;
        if !self.hint.is_empty() {
            write!(f, "\n  hint: {}", self.hint)?;
        }
        Ok(())
    }
}

/// Append-only collector for diagnostics produced during one evaluation
/// run. `log` mirrors each record to the `log` crate at a severity-matched
/// level; the records themselves remain available for the event stream.
#[derive(Debug, Default)]
pub struct DiagnosticsBus {
    records: Vec<Diagnostic>,
}

impl DiagnosticsBus {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn emit(&mut self, diag: Diagnostic) {
        match diag.severity {
            Severity::Warning => log::warn!("{diag}"),
            Severity::Error | Severity::FatalError => log::error!("{diag}"),
        }
        self.records.push(diag);
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    pub fn has_errors(&self) -> bool {
        self.records
            .iter()
            .any(|d| d.severity >= Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.records
            .iter()
            .filter(|d| d.severity >= Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.records
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display_includes_hint_when_present() {
        let diag = Diagnostic::new(
            Severity::Error,
            "CMakeLists.txt",
            3,
            1,
            "evaluator",
            "set",
            "too many arguments",
        )
        .with_hint("set() takes at most 3 positional arguments in this form");
        let rendered = diag.to_string();
        assert!(rendered.contains("too many arguments"));
        assert!(rendered.contains("hint:"));
    }

    #[test]
    fn bus_tracks_error_and_warning_counts() {
        let mut bus = DiagnosticsBus::new();
        bus.emit(Diagnostic::new(
            Severity::Warning,
            "CMakeLists.txt",
            1,
            1,
            "evaluator",
            "if",
            "unquoted empty argument",
        ));
        bus.emit(Diagnostic::new(
            Severity::Error,
            "CMakeLists.txt",
            2,
            1,
            "evaluator",
            "include",
            "file not found",
        ));
        assert_eq!(bus.warning_count(), 1);
        assert_eq!(bus.error_count(), 1);
        assert!(bus.has_errors());
    }

    #[test]
    fn severity_ordering_treats_fatal_as_highest() {
        assert!(Severity::FatalError > Severity::Error);
        assert!(Severity::Error > Severity::Warning);
    }
}
