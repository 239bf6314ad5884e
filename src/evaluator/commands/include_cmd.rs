//! `include()`, `add_subdirectory()`, and `include_guard()`.
//!
//! Re-parses and replays a second script against the current evaluator
//! state, framed with directory-scope push/pop and include-guard
//! bookkeeping.

use crate::ast::types::CommandNode;
use crate::diagnostics::{Diagnostic, Severity};
use crate::events::EventKind;

use super::super::context::EvaluatorContext;
use super::super::control_flow::ControlSignal;
use super::{arity_error, parse_options, OptionKind, OptionSpec};

const OPT_OPTIONAL: u32 = 1;
const OPT_RESULT_VARIABLE: u32 = 2;

fn join_path(base: &str, part: &str) -> String {
    if part.starts_with('/') {
        part.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), part)
    }
}

/// Parses and evaluates `source` as if it were textually inlined at this
/// point, framing it with `DIR_PUSH`/`DIR_POP` events. A `return()` inside
/// the included file stops only that file, so the control signal is
/// cleared here rather than left to propagate to the includer.
fn include_file(ctx: &mut EvaluatorContext, path: &str, source: &str) {
    match crate::parser::parse(source) {
        Ok(script) => {
            let saved_file = ctx.current_file.clone();
            let saved_list_file = ctx.scopes.lookup("CMAKE_CURRENT_LIST_FILE");
            let saved_list_dir = ctx.scopes.lookup("CMAKE_CURRENT_LIST_DIR");
            ctx.current_file = path.to_string();
            super::super::set_current_list_file_vars(ctx, path);
            ctx.push_event(EventKind::DirPush { path: path.to_string() }, 0, 0);

            super::super::eval_statements(ctx, &script.statements);
            if ctx.control.signal() == ControlSignal::Return {
                ctx.control.clear();
            }

            ctx.push_event(EventKind::DirPop, 0, 0);
            ctx.current_file = saved_file;
            if let Some(v) = saved_list_file {
                ctx.scopes.global().set("CMAKE_CURRENT_LIST_FILE", v);
            }
            if let Some(v) = saved_list_dir {
                ctx.scopes.global().set("CMAKE_CURRENT_LIST_DIR", v);
            }
        }
        Err(e) => {
            let diag = Diagnostic::new(
                Severity::FatalError,
                path.to_string(),
                0,
                0,
                "parser",
                "include",
                e.to_string(),
            );
            ctx.emit_diagnostic(diag, 0, 0);
        }
    }
}

pub fn handle_include(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    let Some((name, rest)) = args.split_first() else {
        arity_error(ctx, node, "include() requires a file or module name");
        return;
    };
    let name = name.clone();

    let specs = [
        OptionSpec { id: OPT_OPTIONAL, keyword: "OPTIONAL", kind: OptionKind::Flag },
        OptionSpec { id: OPT_RESULT_VARIABLE, keyword: "RESULT_VARIABLE", kind: OptionKind::Single },
        OptionSpec { id: 3, keyword: "NO_POLICY_SCOPE", kind: OptionKind::Flag },
    ];
    let parsed = parse_options(rest, &specs);
    let optional = parsed.has_flag(OPT_OPTIONAL);

    let current_source = ctx
        .scopes
        .lookup("CMAKE_CURRENT_SOURCE_DIR")
        .unwrap_or_else(|| ctx.source_dir.clone());
    let resolved_path = if name.starts_with('/') {
        name.clone()
    } else {
        join_path(&current_source, &name)
    };

    match ctx.fs.read_file(&resolved_path) {
        Ok(source) => {
            if let Some(result_var) = parsed.single(OPT_RESULT_VARIABLE) {
                ctx.scopes.set_local(result_var, resolved_path.clone());
            }
            include_file(ctx, &resolved_path, &source);
        }
        Err(e) => {
            if let Some(result_var) = parsed.single(OPT_RESULT_VARIABLE) {
                ctx.scopes.set_local(result_var, "NOTFOUND");
            }
            if !optional {
                arity_error(ctx, node, format!("include(): could not find \"{name}\": {e}"));
            }
        }
    }
}

pub fn handle_add_subdirectory(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    let Some((sub, rest)) = args.split_first() else {
        arity_error(ctx, node, "add_subdirectory() requires a source directory");
        return;
    };
    let sub = sub.clone();
    let binary_override = rest.first().filter(|a| a.as_str() != "EXCLUDE_FROM_ALL").cloned();

    let current_source = ctx
        .scopes
        .lookup("CMAKE_CURRENT_SOURCE_DIR")
        .unwrap_or_else(|| ctx.source_dir.clone());
    let current_binary = ctx
        .scopes
        .lookup("CMAKE_CURRENT_BINARY_DIR")
        .unwrap_or_else(|| ctx.binary_dir.clone());

    let new_source = join_path(&current_source, &sub);
    let new_binary = match binary_override {
        Some(b) => join_path(&current_binary, &b),
        None => join_path(&current_binary, &sub),
    };

    let list_path = format!("{}/CMakeLists.txt", new_source.trim_end_matches('/'));
    let source = match ctx.fs.read_file(&list_path) {
        Ok(s) => s,
        Err(e) => {
            arity_error(ctx, node, format!("add_subdirectory(): could not read \"{list_path}\": {e}"));
            return;
        }
    };

    ctx.scopes.push_scope();
    ctx.scopes.set_local("CMAKE_CURRENT_SOURCE_DIR", new_source.clone());
    ctx.scopes.set_local("CMAKE_CURRENT_BINARY_DIR", new_binary);

    include_file(ctx, &list_path, &source);

    ctx.scopes.pop_scope();
}

/// `include_guard([DIRECTORY|GLOBAL])`: if this file (or, for `GLOBAL`, any
/// file) already ran an `include_guard()` with the matching scope, stops
/// processing the remainder of the current file — modeled as a `return()`
/// signal that `include_file` clears once it reaches the file boundary.
pub fn handle_include_guard(ctx: &mut EvaluatorContext, _node: &CommandNode, args: &[String]) {
    let scope_kind = args.first().map(String::as_str).unwrap_or("DIRECTORY");
    let var_name = match scope_kind {
        "GLOBAL" => format!("NOBIFY_INCLUDE_GUARD_GLOBAL::{}", ctx.current_file),
        _ => format!("NOBIFY_INCLUDE_GUARD_DIR::{}", ctx.current_file),
    };
    if ctx.scopes.is_defined(&var_name) {
        ctx.control.set_return();
        return;
    }
    ctx.scopes.global().set(&var_name, "1");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    fn node(name: &str) -> CommandNode {
        CommandNode { name: name.to_string(), args: vec![], line: 1, col: 1 }
    }

    #[test]
    fn include_reads_and_evaluates_nested_file() {
        let fs = InMemoryFs::new();
        fs.write_file_sync("/p/extra.cmake", b"set(FROM_INCLUDE 1)");
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_include(&mut ctx, &node("include"), &["extra.cmake".to_string()]);
        assert_eq!(ctx.scopes.lookup("FROM_INCLUDE"), Some("1".to_string()));
        assert_eq!(ctx.events.len(), 2);
    }

    #[test]
    fn optional_missing_include_does_not_error() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_include(&mut ctx, &node("include"), &["missing.cmake".to_string(), "OPTIONAL".to_string()]);
        assert!(!ctx.stop_requested);
    }

    #[test]
    fn add_subdirectory_pushes_current_dirs_and_pops_scope() {
        let fs = InMemoryFs::new();
        fs.mkdir_sync("/p/sub");
        fs.write_file_sync("/p/sub/CMakeLists.txt", b"set(IN_SUB 1)");
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_add_subdirectory(&mut ctx, &node("add_subdirectory"), &["sub".to_string()]);
        assert!(!ctx.scopes.is_defined("IN_SUB"));
        assert_eq!(ctx.scopes.lookup("CMAKE_CURRENT_SOURCE_DIR"), Some("/p".to_string()));
    }

    #[test]
    fn include_guard_skips_second_inclusion() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        ctx.current_file = "/p/guarded.cmake".to_string();
        handle_include_guard(&mut ctx, &node("include_guard"), &[]);
        assert!(!ctx.control.is_active());
        handle_include_guard(&mut ctx, &node("include_guard"), &[]);
        assert!(ctx.control.is_active());
    }
}
