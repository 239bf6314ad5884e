//! `set()`, `unset()`, `message()`, and the control-flow commands
//! `break()`/`continue()`/`return()`.
//!
//! Thin handlers: validate arity, then mutate the evaluator context
//! directly.

use crate::ast::types::CommandNode;
use crate::diagnostics::{Diagnostic, Severity};

use super::super::context::EvaluatorContext;

pub fn handle_set(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    if args.is_empty() {
        super::arity_error(ctx, node, "set() requires at least a variable name");
        return;
    }

    let name = &args[0];
    let mut rest = &args[1..];
    let mut parent_scope = false;

    if rest.last().map(String::as_str) == Some("PARENT_SCOPE") {
        parent_scope = true;
        rest = &rest[..rest.len() - 1];
    } else if let Some(cache_pos) = rest.iter().position(|a| a == "CACHE") {
        // `set(VAR value CACHE TYPE docstring [FORCE])` — cache variables
        // are modeled as ordinary global-scope variables; the CACHE
        // metadata (type, docstring, FORCE) has no event-stream counterpart.
        rest = &rest[..cache_pos];
    }

    let value = rest.join(";");

    if rest.is_empty() && !parent_scope {
        // `set(VAR)` with no value unsets it in the current scope.
        ctx.scopes.unset_local(name);
        return;
    }

    if parent_scope {
        ctx.scopes.set_parent(name, value);
    } else {
        ctx.scopes.set_local(name, value);
    }
}

pub fn handle_unset(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    if args.is_empty() {
        super::arity_error(ctx, node, "unset() requires a variable name");
        return;
    }
    if args.last().map(String::as_str) == Some("PARENT_SCOPE") {
        ctx.scopes.unset_parent(&args[0]);
    } else {
        ctx.scopes.unset_local(&args[0]);
    }
}

pub fn handle_message(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    let (severity, text_start) = match args.first().map(String::as_str) {
        Some("FATAL_ERROR") => (Severity::FatalError, 1),
        Some("SEND_ERROR") => (Severity::Error, 1),
        Some("WARNING") | Some("AUTHOR_WARNING") => (Severity::Warning, 1),
        Some("STATUS") | Some("NOTICE") | Some("VERBOSE") | Some("DEBUG") | Some("TRACE") => {
            (Severity::Warning, 1)
        }
        _ => (Severity::Warning, 0),
    };
    let text = args[text_start..].join("");

    // Informational levels (STATUS/NOTICE/VERBOSE/DEBUG/TRACE) are
    // logged but not recorded as diagnostics — only WARNING and the
    // error levels participate in the compat-profile error policy.
    match args.first().map(String::as_str) {
        Some("STATUS") | Some("NOTICE") | Some("VERBOSE") | Some("DEBUG") | Some("TRACE")
        | None => {
            log::info!("{text}");
        }
        _ => {
            let diag = Diagnostic::new(
                severity,
                ctx.current_file.clone(),
                node.line,
                node.col,
                "evaluator",
                "message",
                text,
            );
            ctx.emit_diagnostic(diag, node.line, node.col);
        }
    }
}

pub fn handle_break(ctx: &mut EvaluatorContext) {
    ctx.control.set_break();
}

pub fn handle_continue(ctx: &mut EvaluatorContext) {
    ctx.control.set_continue();
}

pub fn handle_return(ctx: &mut EvaluatorContext, args: &[String]) {
    if !args.is_empty() {
        // `return(PROPAGATE var...)` is the only documented argument form;
        // modeled as a no-op since the event model has no notion of
        // property propagation across a scope boundary.
    }
    ctx.control.set_return();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    #[test]
    fn set_writes_local_scope() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        let node = CommandNode {
            name: "set".to_string(),
            args: vec![],
            line: 1,
            col: 1,
        };
        handle_set(&mut ctx, &node, &["X".to_string(), "1".to_string()]);
        assert_eq!(ctx.scopes.lookup("X"), Some("1".to_string()));
    }

    #[test]
    fn set_parent_scope_writes_enclosing_scope() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        ctx.scopes.push_scope();
        let node = CommandNode {
            name: "set".to_string(),
            args: vec![],
            line: 1,
            col: 1,
        };
        handle_set(
            &mut ctx,
            &node,
            &["X".to_string(), "1".to_string(), "PARENT_SCOPE".to_string()],
        );
        ctx.scopes.pop_scope();
        assert_eq!(ctx.scopes.lookup("X"), Some("1".to_string()));
    }

    #[test]
    fn unset_removes_from_innermost_scope() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        ctx.scopes.set_local("X", "1");
        let node = CommandNode {
            name: "unset".to_string(),
            args: vec![],
            line: 1,
            col: 1,
        };
        handle_unset(&mut ctx, &node, &["X".to_string()]);
        assert!(!ctx.scopes.is_defined("X"));
    }

    #[test]
    fn fatal_error_message_sets_stop_requested() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        let node = CommandNode {
            name: "message".to_string(),
            args: vec![],
            line: 1,
            col: 1,
        };
        handle_message(
            &mut ctx,
            &node,
            &["FATAL_ERROR".to_string(), "boom".to_string()],
        );
        assert!(ctx.stop_requested);
    }

    #[test]
    fn break_sets_control_signal() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_break(&mut ctx);
        assert!(ctx.control.is_active());
    }
}
