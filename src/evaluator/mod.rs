//! The evaluator: walks a parsed `Script`, maintaining scope,
//! control-flow, and arena discipline while dispatching each `Command` node
//! to a handler in `commands::*` and appending to the event stream.
//!
//! A statement-by-statement walker that checks control/short-circuit
//! state between statements rather than unwinding the Rust call stack,
//! over CMake's lexical function scopes plus macro frames.

pub mod args;
pub mod commands;
pub mod condition;
pub mod context;
pub mod control_flow;
pub mod expand;
pub mod policy;
pub mod scope;
pub mod user_commands;

use crate::ast::types::{
    CommandNode, ForeachNode, FunctionDefNode, IfNode, MacroDefNode, Node, Script, WhileNode,
};
use crate::diagnostics::{Diagnostic, Severity};

use condition::ConditionContext;
use context::EvaluatorContext;
use control_flow::{ControlSignal, WHILE_ITERATION_LIMIT};
use user_commands::{UserCommand, UserCommandKind};

/// Every builtin command name this interpreter dispatches, seeded into
/// `known_commands` so `if(COMMAND ...)` sees them even before any
/// `function()`/`macro()` definition runs.
const BUILTIN_COMMANDS: &[&str] = &[
    "set",
    "unset",
    "message",
    "break",
    "continue",
    "return",
    "project",
    "add_executable",
    "add_library",
    "target_sources",
    "target_link_libraries",
    "target_link_options",
    "target_link_directories",
    "target_include_directories",
    "target_compile_definitions",
    "target_compile_options",
    "set_target_properties",
    "include_directories",
    "link_directories",
    "add_compile_options",
    "add_definitions",
    "link_libraries",
    "add_link_options",
    "file",
    "list",
    "math",
    "string",
    "cmake_path",
    "find_package",
    "include",
    "add_subdirectory",
    "include_guard",
    "install",
    "add_test",
    "enable_testing",
    "add_custom_command",
    "add_custom_target",
    "try_compile",
    "cmake_policy",
    "if",
    "foreach",
    "while",
    "function",
    "macro",
];

fn seed_known_commands(ctx: &mut EvaluatorContext) {
    for name in BUILTIN_COMMANDS {
        ctx.known_commands.insert((*name).to_string());
    }
}

/// Entry point: evaluates a top-level script against an already-constructed
/// context. `file_path` becomes `ctx.current_file` for the duration.
pub fn run(ctx: &mut EvaluatorContext, script: &Script, file_path: &str) {
    ctx.current_file = file_path.to_string();
    set_current_list_file_vars(ctx, file_path);
    seed_known_commands(ctx);
    ctx.refresh_settings();
    eval_statements(ctx, &script.statements);
}

/// Updates `CMAKE_CURRENT_LIST_FILE`/`CMAKE_CURRENT_LIST_DIR` to
/// track whichever file is currently being evaluated; callers that
/// recurse (`include()`, `add_subdirectory()`, `find_package()`) save and
/// restore the previous values around the nested evaluation.
pub fn set_current_list_file_vars(ctx: &mut EvaluatorContext, file_path: &str) {
    let dir = match file_path.rfind('/') {
        Some(idx) => &file_path[..idx],
        None => ".",
    };
    ctx.scopes.global().set("CMAKE_CURRENT_LIST_FILE", file_path);
    ctx.scopes.global().set("CMAKE_CURRENT_LIST_DIR", dir);
}

/// Evaluates a body of statements in the caller's current scope, honoring
/// the per-statement temp-arena mark/rewind discipline and
/// stopping early once a control signal or short-circuit condition is set.
pub fn eval_statements(ctx: &mut EvaluatorContext, nodes: &[Node]) {
    for node in nodes {
        if ctx.should_short_circuit() {
            break;
        }
        let mark = ctx.temp_arena.mark();
        eval_node(ctx, node);
        ctx.temp_arena.rewind_to(mark);
        if ctx.control.is_active() {
            break;
        }
    }
}

fn eval_node(ctx: &mut EvaluatorContext, node: &Node) {
    match node {
        Node::Command(c) => eval_command(ctx, c),
        Node::If(i) => eval_if(ctx, i),
        Node::Foreach(f) => eval_foreach(ctx, f),
        Node::While(w) => eval_while(ctx, w),
        Node::FunctionDef(f) => eval_function_def(ctx, f),
        Node::MacroDef(m) => eval_macro_def(ctx, m),
    }
}

fn eval_function_def(ctx: &mut EvaluatorContext, node: &FunctionDefNode) {
    ctx.user_commands.define(
        &node.name,
        UserCommand {
            kind: UserCommandKind::Function,
            params: node.params.clone(),
            body: node.body.clone(),
        },
    );
    ctx.known_commands.insert(node.name.to_ascii_lowercase());
}

fn eval_macro_def(ctx: &mut EvaluatorContext, node: &MacroDefNode) {
    ctx.user_commands.define(
        &node.name,
        UserCommand {
            kind: UserCommandKind::Macro,
            params: node.params.clone(),
            body: node.body.clone(),
        },
    );
    ctx.known_commands.insert(node.name.to_ascii_lowercase());
}

fn condition_context<'a>(ctx: &'a EvaluatorContext) -> ConditionContext<'a> {
    ConditionContext {
        scope: &ctx.scopes,
        fs: ctx.fs,
        base_dir: &ctx.source_dir,
        known_commands: &ctx.known_commands,
        known_targets: &ctx.known_targets,
    }
}

fn eval_if(ctx: &mut EvaluatorContext, node: &IfNode) {
    if eval_condition(ctx, &node.clause.condition, node.clause.line) {
        eval_statements(ctx, &node.clause.body);
        return;
    }
    for clause in &node.elseif_clauses {
        if ctx.should_short_circuit() {
            return;
        }
        if eval_condition(ctx, &clause.condition, clause.line) {
            eval_statements(ctx, &clause.body);
            return;
        }
    }
    if let Some(else_block) = &node.else_block {
        eval_statements(ctx, else_block);
    }
}

fn eval_condition(ctx: &mut EvaluatorContext, raw: &[crate::ast::types::Arg], line: usize) -> bool {
    let resolved = args::resolve_args(raw, &ctx.scopes);
    let result = {
        let cond_ctx = condition_context(ctx);
        condition::evaluate(&resolved.values, &cond_ctx)
    };
    match result {
        Ok(v) => v,
        Err(e) => {
            let diag = Diagnostic::new(
                Severity::Error,
                ctx.current_file.clone(),
                line,
                1,
                "evaluator",
                "if",
                e,
            );
            ctx.emit_diagnostic(diag, line, 1);
            false
        }
    }
}

fn eval_foreach(ctx: &mut EvaluatorContext, node: &ForeachNode) {
    let resolved = args::resolve_args(&node.args, &ctx.scopes);
    let values = resolved.values;
    let Some((var_name, rest)) = values.split_first() else {
        return;
    };
    let var_name = var_name.clone();

    let items: Vec<String> = match rest.first().map(String::as_str) {
        Some("RANGE") => foreach_range(&rest[1..]),
        Some("IN") => foreach_in(ctx, &rest[1..]),
        _ => rest.to_vec(),
    };

    for item in items {
        if ctx.should_short_circuit() {
            break;
        }
        ctx.scopes.set_local(&var_name, item);
        eval_statements(ctx, &node.body);
        if let ControlSignal::Break = ctx.control.consume_loop_exit() {
            break;
        }
        if ctx.control.signal() == ControlSignal::Return {
            break;
        }
    }
}

fn foreach_range(parts: &[String]) -> Vec<String> {
    let nums: Vec<i64> = parts.iter().filter_map(|p| p.parse::<i64>().ok()).collect();
    let (start, stop, step) = match nums.len() {
        0 => return Vec::new(),
        1 => (0, nums[0], 1),
        2 => (nums[0], nums[1], 1),
        _ => (nums[0], nums[1], nums[2]),
    };
    if step == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut i = start;
    if step > 0 {
        while i <= stop {
            out.push(i.to_string());
            i += step;
        }
    } else {
        while i >= stop {
            out.push(i.to_string());
            i += step;
        }
    }
    out
}

/// `foreach(V IN [LISTS l1 l2...] [ITEMS i1 i2...])`.
fn foreach_in(ctx: &EvaluatorContext, rest: &[String]) -> Vec<String> {
    let mut items = Vec::new();
    let mut mode: Option<&str> = None;
    for tok in rest {
        match tok.as_str() {
            "LISTS" => mode = Some("LISTS"),
            "ITEMS" => mode = Some("ITEMS"),
            other => match mode {
                Some("LISTS") => {
                    if let Some(list_val) = ctx.scopes.lookup(other) {
                        if !list_val.is_empty() {
                            items.extend(list_val.split(';').map(str::to_string));
                        }
                    }
                }
                _ => items.push(other.to_string()),
            },
        }
    }
    items
}

fn eval_while(ctx: &mut EvaluatorContext, node: &WhileNode) {
    let mut iterations: u64 = 0;
    loop {
        if ctx.should_short_circuit() {
            break;
        }
        if iterations >= WHILE_ITERATION_LIMIT {
            let diag = Diagnostic::new(
                Severity::Error,
                ctx.current_file.clone(),
                node.line,
                1,
                "evaluator",
                "while",
                format!("while() exceeded the {WHILE_ITERATION_LIMIT}-iteration limit"),
            );
            ctx.emit_diagnostic(diag, node.line, 1);
            break;
        }
        if !eval_condition(ctx, &node.condition, node.line) {
            break;
        }
        eval_statements(ctx, &node.body);
        iterations += 1;
        if let ControlSignal::Break = ctx.control.consume_loop_exit() {
            break;
        }
        if ctx.control.signal() == ControlSignal::Return {
            break;
        }
    }
}

/// Dispatches one `Command` node: the static builtin table takes priority,
/// then user-defined macros/functions as the fallback for names the table
/// doesn't recognize, then an "unknown command" warning.
fn eval_command(ctx: &mut EvaluatorContext, node: &CommandNode) {
    if ctx.should_short_circuit() {
        return;
    }
    ctx.scopes.global().set("CMAKE_CURRENT_LIST_LINE", node.line.to_string());
    let name_lower = node.name.to_ascii_lowercase();

    if !BUILTIN_COMMANDS.contains(&name_lower.as_str()) {
        if let Some(user_cmd) = ctx.user_commands.get(&name_lower).cloned() {
            match user_cmd.kind {
                UserCommandKind::Macro => call_macro(ctx, node, &user_cmd),
                UserCommandKind::Function => call_function(ctx, node, &user_cmd),
            }
            return;
        }
    }

    let resolved = args::resolve_args(&node.args, &ctx.scopes);
    for warning in resolved.warnings {
        let diag = Diagnostic::new(
            Severity::Warning,
            ctx.current_file.clone(),
            node.line,
            node.col,
            "evaluator",
            node.name.clone(),
            warning,
        );
        ctx.emit_diagnostic(diag, node.line, node.col);
        if ctx.should_short_circuit() {
            return;
        }
    }
    let values = resolved.values;

    use commands::{cmake_path_cmd, core, file_cmd, find_package_cmd, include_cmd, install_cmd, list_cmd, math_cmd, policy_cmd, string_cmd, targets};

    match name_lower.as_str() {
        "set" => core::handle_set(ctx, node, &values),
        "unset" => core::handle_unset(ctx, node, &values),
        "message" => core::handle_message(ctx, node, &values),
        "break" => core::handle_break(ctx),
        "continue" => core::handle_continue(ctx),
        "return" => core::handle_return(ctx, &values),
        "project" => targets::handle_project(ctx, node, &values),
        "add_executable" => targets::handle_add_executable(ctx, node, &values),
        "add_library" => targets::handle_add_library(ctx, node, &values),
        "target_sources" => targets::handle_target_sources(ctx, node, &values),
        "target_link_libraries" => targets::handle_target_link_libraries(ctx, node, &values),
        "target_link_options" => targets::handle_target_link_options(ctx, node, &values),
        "target_link_directories" => targets::handle_target_link_directories(ctx, node, &values),
        "target_include_directories" => targets::handle_target_include_directories(ctx, node, &values),
        "target_compile_definitions" => targets::handle_target_compile_definitions(ctx, node, &values),
        "target_compile_options" => targets::handle_target_compile_options(ctx, node, &values),
        "set_target_properties" => targets::handle_set_target_properties(ctx, node, &values),
        "include_directories" => targets::handle_include_directories(ctx, node, &values),
        "link_directories" => targets::handle_link_directories(ctx, node, &values),
        "add_compile_options" => targets::handle_add_compile_options(ctx, node, &values),
        "add_definitions" => targets::handle_add_definitions(ctx, node, &values),
        "link_libraries" => targets::handle_link_libraries(ctx, node, &values),
        "add_link_options" => targets::handle_add_link_options(ctx, node, &values),
        "file" => file_cmd::handle_file(ctx, node, &values),
        "list" => list_cmd::handle_list(ctx, node, &values),
        "math" => math_cmd::handle_math(ctx, node, &values),
        "string" => string_cmd::handle_string(ctx, node, &values),
        "cmake_path" => cmake_path_cmd::handle_cmake_path(ctx, node, &values),
        "find_package" => find_package_cmd::handle_find_package(ctx, node, &values),
        "include" => include_cmd::handle_include(ctx, node, &values),
        "add_subdirectory" => include_cmd::handle_add_subdirectory(ctx, node, &values),
        "include_guard" => include_cmd::handle_include_guard(ctx, node, &values),
        "install" => install_cmd::handle_install(ctx, node, &values),
        "add_test" => install_cmd::handle_add_test(ctx, node, &values),
        "enable_testing" => install_cmd::handle_enable_testing(ctx, node, &values),
        "add_custom_command" => install_cmd::handle_add_custom_command(ctx, node, &values),
        "add_custom_target" => install_cmd::handle_add_custom_target(ctx, node, &values),
        "try_compile" => install_cmd::handle_try_compile(ctx, node, &values),
        "cmake_policy" => policy_cmd::handle_cmake_policy(ctx, node, &values),
        _ => {
            let diag = Diagnostic::new(
                Severity::Warning,
                ctx.current_file.clone(),
                node.line,
                node.col,
                "dispatcher",
                node.name.clone(),
                format!("Unknown CMake command \"{}\"", node.name),
            );
            ctx.emit_diagnostic(diag, node.line, node.col);
        }
    }
}

/// `function()` call: standard argument resolution, a fresh lexical scope,
/// and `return()` is consumed at this boundary.
fn call_function(ctx: &mut EvaluatorContext, node: &CommandNode, cmd: &UserCommand) {
    let resolved = args::resolve_args(&node.args, &ctx.scopes);
    let bindings = user_commands::build_call_bindings(&cmd.params, &resolved.values);

    ctx.scopes.push_scope();
    for (key, value) in bindings {
        ctx.scopes.set_local(&key, value);
    }
    eval_statements(ctx, &cmd.body);
    ctx.scopes.pop_scope();

    if ctx.control.signal() == ControlSignal::Return {
        ctx.control.clear();
    }
}

/// `macro()` call: literal (unexpanded) argument resolution and a macro
/// frame instead of a lexical scope — the body replays in the caller's
/// scope, so a nested `set()` inside it mutates the caller directly, and
/// `return()` keeps propagating to the enclosing function boundary.
fn call_macro(ctx: &mut EvaluatorContext, node: &CommandNode, cmd: &UserCommand) {
    let call_args = args::resolve_args_literal(&node.args);
    let bindings = user_commands::build_call_bindings(&cmd.params, &call_args);

    ctx.enter_macro(bindings);
    eval_statements(ctx, &cmd.body);
    ctx.exit_macro();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use crate::parser::parse;

    fn run_source(ctx: &mut EvaluatorContext, source: &str) {
        let script = parse(source).expect("parse");
        eval_statements(ctx, &script.statements);
    }

    #[test]
    fn set_and_if_select_the_true_branch() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        run_source(
            &mut ctx,
            r#"
            set(X 1)
            if(X)
                set(RESULT yes)
            else()
                set(RESULT no)
            endif()
            "#,
        );
        assert_eq!(ctx.scopes.lookup("RESULT"), Some("yes".to_string()));
    }

    #[test]
    fn foreach_binds_loop_variable_and_honors_break() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        run_source(
            &mut ctx,
            r#"
            set(SEEN "")
            foreach(I a b c)
                if(I STREQUAL "b")
                    break()
                endif()
                set(SEEN "${SEEN}${I}")
            endforeach()
            "#,
        );
        assert_eq!(ctx.scopes.lookup("SEEN"), Some("a".to_string()));
    }

    #[test]
    fn while_loop_counts_down() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        run_source(
            &mut ctx,
            r#"
            set(N 3)
            set(TOTAL 0)
            while(N GREATER 0)
                math(EXPR TOTAL "${TOTAL} + ${N}")
                math(EXPR N "${N} - 1")
            endwhile()
            "#,
        );
        assert_eq!(ctx.scopes.lookup("TOTAL"), Some("6".to_string()));
    }

    #[test]
    fn function_call_does_not_leak_locals_but_returns_value_via_parent_scope() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        run_source(
            &mut ctx,
            r#"
            function(double n)
                math(EXPR DOUBLED "${n} * 2")
                set(DOUBLED "${DOUBLED}" PARENT_SCOPE)
            endfunction()
            double(21)
            "#,
        );
        assert_eq!(ctx.scopes.lookup("DOUBLED"), Some("42".to_string()));
    }

    #[test]
    fn macro_call_mutates_caller_scope_directly() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        run_source(
            &mut ctx,
            r#"
            macro(set_flag)
                set(FLAG_SET 1)
            endmacro()
            set_flag()
            "#,
        );
        assert_eq!(ctx.scopes.lookup("FLAG_SET"), Some("1".to_string()));
    }

    #[test]
    fn unknown_command_emits_a_warning_diagnostic() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        ctx.compat_profile = context::CompatProfile::Permissive;
        run_source(&mut ctx, "frobnicate(widget)\n");
        assert_eq!(ctx.diagnostics.warning_count(), 1);
    }
}
