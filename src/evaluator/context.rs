//! The evaluator's root aggregate:
//! owns the arenas, event stream, scope stack, macro frames, user
//! commands table, known targets, and the sticky control/error state
//! that every primitive consults before doing work.
//!
//! One composed struct owns everything a command handler needs, rather
//! than threading a dozen separate parameters through every call.

use std::collections::HashSet;

use crate::arena::Arena;
use crate::diagnostics::{Diagnostic, DiagnosticsBus, Severity};
use crate::events::{Event, EventKind, EventStream, Origin};
use crate::fs::FileSystem;

use super::control_flow::ControlState;
use super::policy;
use super::scope::{MacroFrame, ScopeStack};
use super::user_commands::UserCommandTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompatProfile {
    Strict,
    CiStrict,
    Permissive,
}

impl CompatProfile {
    pub fn from_str(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "CI_STRICT" => CompatProfile::CiStrict,
            "PERMISSIVE" => CompatProfile::Permissive,
            _ => CompatProfile::Strict,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedPolicy {
    Error,
    Warn,
    NoopWarn,
}

impl UnsupportedPolicy {
    pub fn from_str(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "ERROR" => UnsupportedPolicy::Error,
            "NOOP_WARN" => UnsupportedPolicy::NoopWarn,
            _ => UnsupportedPolicy::Warn,
        }
    }
}

/// `{ error_count, warning_count }`, surfaced to the caller once a run
/// finishes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunReport {
    pub error_count: usize,
    pub warning_count: usize,
}

pub struct EvaluatorContext<'fs> {
    pub persistent_arena: Arena,
    pub temp_arena: Arena,
    pub events: EventStream,
    pub diagnostics: DiagnosticsBus,
    pub scopes: ScopeStack,
    pub user_commands: UserCommandTable,
    pub known_targets: HashSet<String>,
    pub known_commands: HashSet<String>,
    pub fs: &'fs dyn FileSystem,
    pub source_dir: String,
    pub binary_dir: String,
    pub current_file: String,
    pub control: ControlState,
    pub stop_requested: bool,
    pub oom: bool,
    pub compat_profile: CompatProfile,
    pub unsupported_policy: UnsupportedPolicy,
    pub error_budget: Option<usize>,
    pub errors_emitted: usize,
    pub continue_on_error: bool,
}

impl<'fs> EvaluatorContext<'fs> {
    pub fn new(fs: &'fs dyn FileSystem, source_dir: impl Into<String>, binary_dir: impl Into<String>) -> Self {
        let source_dir = source_dir.into();
        let binary_dir = binary_dir.into();
        let mut scopes = ScopeStack::new();
        seed_builtin_variables(&mut scopes, &source_dir, &binary_dir);

        Self {
            persistent_arena: Arena::new(),
            temp_arena: Arena::new(),
            events: EventStream::new(),
            diagnostics: DiagnosticsBus::new(),
            scopes,
            user_commands: UserCommandTable::new(),
            known_targets: HashSet::new(),
            known_commands: HashSet::new(),
            fs,
            current_file: String::new(),
            source_dir,
            binary_dir,
            control: ControlState::new(),
            stop_requested: false,
            oom: false,
            compat_profile: CompatProfile::Strict,
            unsupported_policy: UnsupportedPolicy::Warn,
            error_budget: None,
            errors_emitted: 0,
            continue_on_error: false,
        }
    }

    /// Re-reads `CMAKE_NOBIFY_*` settings out of the current scope — these
    /// are plain variables, so a nested `include()` can change them mid-run.
    pub fn refresh_settings(&mut self) {
        if let Some(v) = self.scopes.lookup("CMAKE_NOBIFY_COMPAT_PROFILE") {
            self.compat_profile = CompatProfile::from_str(&v);
        }
        if let Some(v) = self.scopes.lookup("CMAKE_NOBIFY_UNSUPPORTED_POLICY") {
            self.unsupported_policy = UnsupportedPolicy::from_str(&v);
        }
        self.error_budget = self
            .scopes
            .lookup("CMAKE_NOBIFY_ERROR_BUDGET")
            .and_then(|v| v.parse::<usize>().ok());
        self.continue_on_error = self
            .scopes
            .lookup("CMAKE_NOBIFY_CONTINUE_ON_ERROR")
            .map(|v| super::condition::eval_truthy(&v, &self.scopes))
            .unwrap_or(false);
    }

    /// True once `oom`/`stop_requested` is set — every primitive checks
    /// this on entry and returns early without doing work.
    pub fn should_short_circuit(&self) -> bool {
        self.oom || self.stop_requested
    }

    pub fn push_event(&mut self, kind: EventKind, line: usize, col: usize) {
        let origin = Origin::new(self.current_file.clone(), line, col);
        self.events.push(kind, origin);
    }

    /// Emits a diagnostic, applies the compat-profile's error/warning
    /// promotion rule, and sets `stop_requested` when the profile/error
    /// budget says this diagnostic should stop the run.
    pub fn emit_diagnostic(&mut self, mut diag: Diagnostic, line: usize, col: usize) {
        if diag.severity == Severity::Warning
            && matches!(self.compat_profile, CompatProfile::Strict | CompatProfile::CiStrict)
        {
            diag.severity = Severity::Error;
        }

        let is_error = diag.severity >= Severity::Error;
        if is_error {
            self.errors_emitted += 1;
        }

        let origin = Origin::new(self.current_file.clone(), line, col);
        self.events.push(EventKind::Diagnostic(diag.clone()), origin);
        self.diagnostics.emit(diag.clone());

        if !is_error {
            return;
        }

        if diag.severity == Severity::FatalError {
            if !self.continue_on_error {
                self.stop_requested = true;
            }
            return;
        }

        match self.compat_profile {
            CompatProfile::Strict | CompatProfile::CiStrict => {
                self.stop_requested = true;
            }
            CompatProfile::Permissive => {
                if let Some(budget) = self.error_budget {
                    if self.errors_emitted >= budget {
                        self.stop_requested = true;
                    }
                }
            }
        }
    }

    pub fn set_oom(&mut self) {
        self.oom = true;
        self.stop_requested = true;
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            error_count: self.diagnostics.error_count(),
            warning_count: self.diagnostics.warning_count(),
        }
    }

    pub fn policy_is_new(&self, id: &str) -> bool {
        policy::is_new(&self.scopes, id)
    }

    /// Pushes a macro call frame (no lexical scope push) for the duration
    /// of one `macro()` invocation.
    pub fn enter_macro(&mut self, frame: MacroFrame) {
        self.scopes.push_macro_frame(frame);
    }

    pub fn exit_macro(&mut self) {
        self.scopes.pop_macro_frame();
    }
}

/// Seeds the global scope with the synthesized constants
/// (`WIN32`, `UNIX`, `APPLE`, compiler-id/host variables, …) plus the
/// directory variables that never change for the life of a run.
fn seed_builtin_variables(scopes: &mut ScopeStack, source_dir: &str, binary_dir: &str) {
    let global = scopes.global();
    global.set("CMAKE_SOURCE_DIR", source_dir);
    global.set("CMAKE_BINARY_DIR", binary_dir);
    global.set("CMAKE_CURRENT_SOURCE_DIR", source_dir);
    global.set("CMAKE_CURRENT_BINARY_DIR", binary_dir);
    global.set("CMAKE_VERSION", "3.28.0");
    global.set("CMAKE_HOST_SYSTEM_NAME", "Linux");
    global.set("CMAKE_C_COMPILER_ID", "GNU");
    global.set("CMAKE_CXX_COMPILER_ID", "GNU");

    if cfg!(target_os = "windows") {
        global.set("WIN32", "1");
    } else if cfg!(target_os = "macos") {
        global.set("APPLE", "1");
        global.set("UNIX", "1");
    } else {
        global.set("UNIX", "1");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostic;
    use crate::fs::InMemoryFs;

    fn fatal(message: &str) -> Diagnostic {
        Diagnostic::new(Severity::FatalError, "test.cmake".to_string(), 1, 1, "evaluator", "test", message.to_string())
    }

    #[test]
    fn fatal_error_stops_the_run_by_default() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        ctx.emit_diagnostic(fatal("boom"), 1, 1);
        assert!(ctx.stop_requested);
    }

    #[test]
    fn continue_on_error_keeps_the_run_going_past_a_fatal_diagnostic() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        ctx.scopes.global().set("CMAKE_NOBIFY_CONTINUE_ON_ERROR", "ON");
        ctx.refresh_settings();
        ctx.emit_diagnostic(fatal("boom"), 1, 1);
        assert!(!ctx.stop_requested);
        assert_eq!(ctx.diagnostics.error_count(), 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    #[test]
    fn seeds_directory_variables_at_construction() {
        let fs = InMemoryFs::new();
        let ctx = EvaluatorContext::new(&fs, "/project", "/project/build");
        assert_eq!(
            ctx.scopes.lookup("CMAKE_SOURCE_DIR"),
            Some("/project".to_string())
        );
        assert_eq!(ctx.scopes.lookup("UNIX"), Some("1".to_string()));
    }

    #[test]
    fn strict_profile_stops_on_first_error() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/project", "/project/build");
        ctx.emit_diagnostic(
            Diagnostic::new(Severity::Error, "CMakeLists.txt", 1, 1, "evaluator", "foo", "bad"),
            1,
            1,
        );
        assert!(ctx.stop_requested);
    }

    #[test]
    fn permissive_profile_tolerates_errors_under_budget() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/project", "/project/build");
        ctx.compat_profile = CompatProfile::Permissive;
        ctx.error_budget = Some(2);
        ctx.emit_diagnostic(
            Diagnostic::new(Severity::Error, "CMakeLists.txt", 1, 1, "evaluator", "foo", "bad"),
            1,
            1,
        );
        assert!(!ctx.stop_requested);
        ctx.emit_diagnostic(
            Diagnostic::new(Severity::Error, "CMakeLists.txt", 2, 1, "evaluator", "foo", "bad"),
            2,
            1,
        );
        assert!(ctx.stop_requested);
    }

    #[test]
    fn strict_profile_promotes_warnings_to_errors() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/project", "/project/build");
        ctx.emit_diagnostic(
            Diagnostic::new(Severity::Warning, "CMakeLists.txt", 1, 1, "evaluator", "foo", "hmm"),
            1,
            1,
        );
        assert!(ctx.stop_requested);
        assert_eq!(ctx.diagnostics.error_count(), 1);
    }

    #[test]
    fn oom_sets_both_flags() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/project", "/project/build");
        ctx.set_oom();
        assert!(ctx.oom);
        assert!(ctx.should_short_circuit());
    }
}
