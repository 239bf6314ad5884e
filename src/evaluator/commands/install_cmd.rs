//! `install()`, `enable_testing()`/`add_test()`, `add_custom_command()`/
//! `add_custom_target()`, and a minimal `try_compile()`:
//! these commands don't execute a build, they only record the rule as a
//! structured event for a downstream build-model consumer.
//!
//! Each handler validates its options, then emits one outcome record
//! rather than performing the underlying effect itself.

use crate::ast::types::CommandNode;
use crate::events::{CustomCommandOutput, EventKind};

use super::super::context::EvaluatorContext;
use super::{arity_error, parse_options, OptionKind, OptionSpec};

const OPT_TARGETS: u32 = 1;
const OPT_FILES: u32 = 2;
const OPT_PROGRAMS: u32 = 3;
const OPT_DIRECTORY: u32 = 4;
const OPT_DESTINATION: u32 = 5;

pub fn handle_install(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    let specs = [
        OptionSpec { id: OPT_TARGETS, keyword: "TARGETS", kind: OptionKind::Multi },
        OptionSpec { id: OPT_FILES, keyword: "FILES", kind: OptionKind::Multi },
        OptionSpec { id: OPT_PROGRAMS, keyword: "PROGRAMS", kind: OptionKind::Multi },
        OptionSpec { id: OPT_DIRECTORY, keyword: "DIRECTORY", kind: OptionKind::Multi },
        OptionSpec { id: OPT_DESTINATION, keyword: "DESTINATION", kind: OptionKind::Single },
        OptionSpec { id: 6, keyword: "RUNTIME", kind: OptionKind::Flag },
        OptionSpec { id: 7, keyword: "LIBRARY", kind: OptionKind::Flag },
        OptionSpec { id: 8, keyword: "ARCHIVE", kind: OptionKind::Flag },
        OptionSpec { id: 9, keyword: "OPTIONAL", kind: OptionKind::Flag },
    ];
    let parsed = parse_options(args, &specs);
    let destination = parsed.single(OPT_DESTINATION).unwrap_or("").to_string();

    let (kind, items): (&str, &[String]) = if !parsed.multi(OPT_TARGETS).is_empty() {
        ("TARGETS", parsed.multi(OPT_TARGETS))
    } else if !parsed.multi(OPT_FILES).is_empty() {
        ("FILES", parsed.multi(OPT_FILES))
    } else if !parsed.multi(OPT_PROGRAMS).is_empty() {
        ("PROGRAMS", parsed.multi(OPT_PROGRAMS))
    } else if !parsed.multi(OPT_DIRECTORY).is_empty() {
        ("DIRECTORY", parsed.multi(OPT_DIRECTORY))
    } else {
        arity_error(ctx, node, "install() requires TARGETS, FILES, PROGRAMS, or DIRECTORY");
        return;
    };

    ctx.push_event(
        EventKind::InstallAddRule {
            kind: kind.to_string(),
            targets: items.to_vec(),
            destination,
        },
        node.line,
        node.col,
    );
}

pub fn handle_enable_testing(ctx: &mut EvaluatorContext, node: &CommandNode, _args: &[String]) {
    ctx.push_event(EventKind::TestingEnable, node.line, node.col);
}

pub fn handle_add_test(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    let specs = [
        OptionSpec { id: 1, keyword: "NAME", kind: OptionKind::Single },
        OptionSpec { id: 2, keyword: "COMMAND", kind: OptionKind::Multi },
        OptionSpec { id: 3, keyword: "WORKING_DIRECTORY", kind: OptionKind::Single },
        OptionSpec { id: 4, keyword: "CONFIGURATIONS", kind: OptionKind::Multi },
    ];
    let parsed = parse_options(args, &specs);

    let (name, command): (String, Vec<String>) = if let Some(name) = parsed.single(1) {
        (name.to_string(), parsed.multi(2).to_vec())
    } else if args.len() >= 2 {
        (args[0].clone(), args[1..].to_vec())
    } else {
        arity_error(ctx, node, "add_test() requires NAME and COMMAND, or a legacy name + command form");
        return;
    };

    ctx.push_event(EventKind::TestAdd { name, command }, node.line, node.col);
}

pub fn handle_add_custom_target(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    let Some((target, rest)) = args.split_first() else {
        arity_error(ctx, node, "add_custom_target() requires a target name");
        return;
    };
    let specs = [OptionSpec { id: 1, keyword: "COMMAND", kind: OptionKind::Multi }];
    let parsed = parse_options(rest, &specs);
    ctx.push_event(
        EventKind::CustomCommandTarget { target: target.clone(), command: parsed.multi(1).to_vec() },
        node.line,
        node.col,
    );
}

pub fn handle_add_custom_command(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    let specs = [
        OptionSpec { id: 1, keyword: "OUTPUT", kind: OptionKind::Multi },
        OptionSpec { id: 2, keyword: "COMMAND", kind: OptionKind::Multi },
        OptionSpec { id: 3, keyword: "DEPENDS", kind: OptionKind::Multi },
        OptionSpec { id: 4, keyword: "TARGET", kind: OptionKind::Single },
        OptionSpec { id: 5, keyword: "WORKING_DIRECTORY", kind: OptionKind::Single },
        OptionSpec { id: 6, keyword: "COMMENT", kind: OptionKind::Single },
        OptionSpec { id: 7, keyword: "VERBATIM", kind: OptionKind::Flag },
    ];
    let parsed = parse_options(args, &specs);

    if let Some(target) = parsed.single(4) {
        ctx.push_event(
            EventKind::CustomCommandTarget { target: target.to_string(), command: parsed.multi(2).to_vec() },
            node.line,
            node.col,
        );
        return;
    }

    if parsed.multi(1).is_empty() {
        arity_error(ctx, node, "add_custom_command() requires OUTPUT or TARGET");
        return;
    }

    ctx.push_event(
        EventKind::CustomCommandOutput(CustomCommandOutput {
            outputs: parsed.multi(1).to_vec(),
            command: parsed.multi(2).to_vec(),
            depends: parsed.multi(3).to_vec(),
        }),
        node.line,
        node.col,
    );
}

/// Always reports success without actually invoking a compiler — real
/// toolchain probing is out of scope for this evaluator.
pub fn handle_try_compile(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    let Some(result_var) = args.first() else {
        arity_error(ctx, node, "try_compile() requires a result variable");
        return;
    };
    ctx.scopes.set_local(result_var, "1");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    fn node(name: &str) -> CommandNode {
        CommandNode { name: name.to_string(), args: vec![], line: 1, col: 1 }
    }

    #[test]
    fn install_targets_emits_install_add_rule() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_install(
            &mut ctx,
            &node("install"),
            &["TARGETS".to_string(), "app".to_string(), "DESTINATION".to_string(), "bin".to_string()],
        );
        assert_eq!(ctx.events.len(), 1);
    }

    #[test]
    fn add_test_legacy_form_is_supported() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_add_test(&mut ctx, &node("add_test"), &["mytest".to_string(), "app".to_string(), "--flag".to_string()]);
        assert_eq!(ctx.events.len(), 1);
    }

    #[test]
    fn custom_command_with_output_is_distinct_from_target_form() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_add_custom_command(
            &mut ctx,
            &node("add_custom_command"),
            &["OUTPUT".to_string(), "gen.cpp".to_string(), "COMMAND".to_string(), "gen".to_string()],
        );
        assert_eq!(ctx.events.len(), 1);
    }

    #[test]
    fn try_compile_always_reports_success() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_try_compile(&mut ctx, &node("try_compile"), &["RESULT".to_string()]);
        assert_eq!(ctx.scopes.lookup("RESULT"), Some("1".to_string()));
    }
}
