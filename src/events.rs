//! Event stream: an append-only log of structured events the
//! evaluator emits, handed off to downstream consumers (build-model
//! construction, a transpiler) once a run finishes. The variant set is
//! closed and every event carries an `Origin`.
//!
//! A plain data record rather than an exception, shaped around a closed
//! event-kind list instead of a single success/failure result.

use crate::diagnostics::Diagnostic;

/// Where an event was produced: the file being evaluated and the source
/// position of the statement that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub file_path: String,
    pub line: usize,
    pub col: usize,
}

impl Origin {
    pub fn new(file_path: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            file_path: file_path.into(),
            line,
            col,
        }
    }
}

/// `set_target_properties()` always overwrites; the variant exists for
/// parity with the other property-mutating ops downstream consumers see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropOp {
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPropSet {
    pub target: String,
    pub property: String,
    pub value: String,
    pub op: PropOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomCommandOutput {
    pub outputs: Vec<String>,
    pub command: Vec<String>,
    pub depends: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Diagnostic(Diagnostic),
    DirPush { path: String },
    DirPop,
    ProjectDeclare { name: String, languages: Vec<String> },
    TargetDeclare { name: String, target_type: String },
    TargetAddSource { target: String, sources: Vec<String> },
    TargetLinkLibraries { target: String, libraries: Vec<String> },
    TargetLinkOptions { target: String, options: Vec<String> },
    TargetLinkDirectories { target: String, directories: Vec<String> },
    TargetIncludeDirectories { target: String, directories: Vec<String> },
    TargetCompileDefinitions { target: String, definitions: Vec<String> },
    TargetCompileOptions { target: String, options: Vec<String> },
    TargetPropSet(TargetPropSet),
    DirectoryIncludeDirectories { directories: Vec<String> },
    DirectoryLinkDirectories { directories: Vec<String> },
    GlobalCompileOptions { options: Vec<String> },
    GlobalCompileDefinitions { definitions: Vec<String> },
    GlobalLinkLibraries { libraries: Vec<String> },
    GlobalLinkOptions { options: Vec<String> },
    InstallAddRule { kind: String, targets: Vec<String>, destination: String },
    CustomCommandTarget { target: String, command: Vec<String> },
    CustomCommandOutput(CustomCommandOutput),
    TestAdd { name: String, command: Vec<String> },
    TestingEnable,
    FindPackage {
        name: String,
        mode: String,
        required: bool,
        found: bool,
        version: Option<String>,
        location: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub origin: Origin,
}

/// Append-only log of emitted events. Never supports removal or mutation
/// of prior entries — downstream consumers see a frozen stream once a
/// run finishes.
#[derive(Debug, Default)]
pub struct EventStream {
    events: Vec<Event>,
}

impl EventStream {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, kind: EventKind, origin: Origin) {
        self.events.push(Event { kind, origin });
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
