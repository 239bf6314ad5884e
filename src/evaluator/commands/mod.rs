//! Command handler registry: a static dispatch table plus a
//! generic option-grammar parser shared by every handler.
//!
//! One file per command family, each validating its own arity/options
//! before performing side effects, over a shared
//! `FLAG | SINGLE | OPTIONAL_SINGLE | MULTI` keyword-option shape.

pub mod cmake_path_cmd;
pub mod core;
pub mod file_cmd;
pub mod find_package_cmd;
pub mod include_cmd;
pub mod install_cmd;
pub mod list_cmd;
pub mod math_cmd;
pub mod policy_cmd;
pub mod string_cmd;
pub mod targets;

use std::collections::HashMap;

use crate::ast::types::CommandNode;
use crate::diagnostics::{Diagnostic, Severity};

use super::context::EvaluatorContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// A bare keyword with no value, e.g. `RECURSE`.
    Flag,
    /// A keyword followed by exactly one value, e.g. `DESTINATION dir`.
    Single,
    /// Like `Single`, but the keyword may be absent entirely.
    OptionalSingle,
    /// A keyword followed by a run of values until the next known
    /// keyword or end of input, e.g. `FILES a b c`.
    Multi,
}

#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub id: u32,
    pub keyword: &'static str,
    pub kind: OptionKind,
}

/// Result of running the generic option parser over a resolved argument
/// list: leading positional arguments (those before the first recognized
/// keyword), then keyword → matched values.
#[derive(Debug, Default)]
pub struct ParsedOptions {
    pub positional: Vec<String>,
    flags: HashMap<u32, bool>,
    singles: HashMap<u32, String>,
    multis: HashMap<u32, Vec<String>>,
}

impl ParsedOptions {
    pub fn has_flag(&self, id: u32) -> bool {
        self.flags.get(&id).copied().unwrap_or(false)
    }

    pub fn single(&self, id: u32) -> Option<&str> {
        self.singles.get(&id).map(String::as_str)
    }

    pub fn multi(&self, id: u32) -> &[String] {
        self.multis.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Parses `values` against `specs`. Arguments before the first keyword
/// that matches a spec become positional arguments; every keyword match
/// consumes values per its `OptionKind` until the next recognized
/// keyword or end of input.
pub fn parse_options(values: &[String], specs: &[OptionSpec]) -> ParsedOptions {
    let mut result = ParsedOptions::default();
    let mut i = 0;
    let mut seen_keyword = false;

    let find_spec = |token: &str| specs.iter().find(|s| s.keyword == token);

    while i < values.len() {
        let token = &values[i];
        if let Some(spec) = find_spec(token) {
            seen_keyword = true;
            i += 1;
            match spec.kind {
                OptionKind::Flag => {
                    result.flags.insert(spec.id, true);
                }
                OptionKind::Single | OptionKind::OptionalSingle => {
                    if i < values.len() && find_spec(&values[i]).is_none() {
                        result.singles.insert(spec.id, values[i].clone());
                        i += 1;
                    }
                }
                OptionKind::Multi => {
                    let mut collected = Vec::new();
                    while i < values.len() && find_spec(&values[i]).is_none() {
                        collected.push(values[i].clone());
                        i += 1;
                    }
                    result.multis.entry(spec.id).or_default().extend(collected);
                }
            }
        } else if !seen_keyword {
            result.positional.push(token.clone());
            i += 1;
        } else {
            // Unrecognized token after keywords have started: fold it into
            // positional rather than erroring, matching the more permissive
            // reading used across the handlers below.
            result.positional.push(token.clone());
            i += 1;
        }
    }

    result
}

/// Shorthand used by every handler to report a usage/arity failure.
pub fn arity_error(ctx: &mut EvaluatorContext, node: &CommandNode, message: impl Into<String>) {
    let diag = Diagnostic::new(
        Severity::Error,
        ctx.current_file.clone(),
        node.line,
        node.col,
        "evaluator",
        node.name.clone(),
        message.into(),
    );
    ctx.emit_diagnostic(diag, node.line, node.col);
}

pub fn security_error(ctx: &mut EvaluatorContext, node: &CommandNode, message: impl Into<String>) {
    let diag = Diagnostic::new(
        Severity::FatalError,
        ctx.current_file.clone(),
        node.line,
        node.col,
        "sandbox",
        node.name.clone(),
        format!("Security Violation: {}", message.into()),
    );
    ctx.emit_diagnostic(diag, node.line, node.col);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_args_precede_any_keyword() {
        let specs = [OptionSpec {
            id: 1,
            keyword: "DESTINATION",
            kind: OptionKind::Single,
        }];
        let values = vec!["a.txt".to_string(), "DESTINATION".to_string(), "bin".to_string()];
        let parsed = parse_options(&values, &specs);
        assert_eq!(parsed.positional, vec!["a.txt".to_string()]);
        assert_eq!(parsed.single(1), Some("bin"));
    }

    #[test]
    fn multi_option_collects_until_next_keyword() {
        let specs = [
            OptionSpec {
                id: 1,
                keyword: "FILES",
                kind: OptionKind::Multi,
            },
            OptionSpec {
                id: 2,
                keyword: "DESTINATION",
                kind: OptionKind::Single,
            },
        ];
        let values = vec![
            "FILES".to_string(),
            "a".to_string(),
            "b".to_string(),
            "DESTINATION".to_string(),
            "bin".to_string(),
        ];
        let parsed = parse_options(&values, &specs);
        assert_eq!(parsed.multi(1), &["a".to_string(), "b".to_string()]);
        assert_eq!(parsed.single(2), Some("bin"));
    }

    #[test]
    fn flag_option_needs_no_value() {
        let specs = [OptionSpec {
            id: 1,
            keyword: "RECURSE",
            kind: OptionKind::Flag,
        }];
        let values = vec!["RECURSE".to_string()];
        let parsed = parse_options(&values, &specs);
        assert!(parsed.has_flag(1));
    }
}
