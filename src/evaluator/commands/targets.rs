//! Target/directory/global declaration commands: `project`, `add_executable`, `add_library`, `target_*`,
//! directory- and global-scoped property commands.
//!
//! Each handler validates its option shape, then records one structured
//! fact onto the event stream rather than mutating a build graph directly.

use crate::ast::types::CommandNode;
use crate::events::{EventKind, PropOp, TargetPropSet};

use super::super::context::EvaluatorContext;

pub fn handle_project(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    if args.is_empty() {
        super::arity_error(ctx, node, "project() requires a name");
        return;
    }
    let name = args[0].clone();
    let languages: Vec<String> = args[1..]
        .iter()
        .filter(|a| {
            !matches!(
                a.as_str(),
                "VERSION" | "DESCRIPTION" | "HOMEPAGE_URL" | "LANGUAGES"
            )
        })
        .cloned()
        .collect();
    ctx.scopes.global().set("PROJECT_NAME", name.clone());
    ctx.push_event(EventKind::ProjectDeclare { name, languages }, node.line, node.col);
}

fn declare_target(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String], target_type: &str) {
    if args.is_empty() {
        super::arity_error(ctx, node, format!("{} requires a target name", node.name));
        return;
    }
    let name = args[0].clone();
    ctx.known_targets.insert(name.clone());
    ctx.push_event(
        EventKind::TargetDeclare {
            name: name.clone(),
            target_type: target_type.to_string(),
        },
        node.line,
        node.col,
    );
    let sources: Vec<String> = args[1..]
        .iter()
        .filter(|a| !matches!(a.as_str(), "STATIC" | "SHARED" | "MODULE" | "INTERFACE" | "OBJECT" | "EXCLUDE_FROM_ALL"))
        .cloned()
        .collect();
    if !sources.is_empty() {
        ctx.push_event(
            EventKind::TargetAddSource { target: name, sources },
            node.line,
            node.col,
        );
    }
}

pub fn handle_add_executable(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    declare_target(ctx, node, args, "EXECUTABLE");
}

pub fn handle_add_library(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    let kind = args
        .get(1)
        .filter(|a| matches!(a.as_str(), "STATIC" | "SHARED" | "MODULE" | "INTERFACE" | "OBJECT"))
        .cloned()
        .unwrap_or_else(|| "STATIC".to_string());
    declare_target(ctx, node, args, &kind);
}

pub fn handle_target_sources(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    if args.is_empty() {
        super::arity_error(ctx, node, "target_sources() requires a target name");
        return;
    }
    let target = args[0].clone();
    let sources: Vec<String> = args[1..]
        .iter()
        .filter(|a| !matches!(a.as_str(), "PRIVATE" | "PUBLIC" | "INTERFACE"))
        .cloned()
        .collect();
    ctx.push_event(
        EventKind::TargetAddSource { target, sources },
        node.line,
        node.col,
    );
}

fn scoped_values(args: &[String]) -> Vec<String> {
    args.iter()
        .filter(|a| !matches!(a.as_str(), "PRIVATE" | "PUBLIC" | "INTERFACE" | "BEFORE" | "SYSTEM"))
        .cloned()
        .collect()
}

macro_rules! target_multi_handler {
    ($fn_name:ident, $event:ident, $field:ident) => {
        pub fn $fn_name(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
            if args.is_empty() {
                super::arity_error(ctx, node, format!("{} requires a target name", node.name));
                return;
            }
            let target = args[0].clone();
            let values = scoped_values(&args[1..]);
            ctx.push_event(
                EventKind::$event { target, $field: values },
                node.line,
                node.col,
            );
        }
    };
}

target_multi_handler!(handle_target_link_libraries, TargetLinkLibraries, libraries);
target_multi_handler!(handle_target_link_options, TargetLinkOptions, options);
target_multi_handler!(handle_target_link_directories, TargetLinkDirectories, directories);
target_multi_handler!(handle_target_include_directories, TargetIncludeDirectories, directories);
target_multi_handler!(handle_target_compile_definitions, TargetCompileDefinitions, definitions);
target_multi_handler!(handle_target_compile_options, TargetCompileOptions, options);

pub fn handle_set_target_properties(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    // `set_target_properties(t1 t2 ... PROPERTIES p1 v1 p2 v2 ...)`
    let Some(props_pos) = args.iter().position(|a| a == "PROPERTIES") else {
        super::arity_error(ctx, node, "set_target_properties() requires PROPERTIES");
        return;
    };
    let targets = &args[..props_pos];
    let kv = &args[props_pos + 1..];
    for target in targets {
        let mut i = 0;
        while i + 2 <= kv.len() {
            let property = kv[i].clone();
            let value = kv[i + 1].clone();
            ctx.push_event(
                EventKind::TargetPropSet(TargetPropSet {
                    target: target.clone(),
                    property,
                    value,
                    op: PropOp::Set,
                }),
                node.line,
                node.col,
            );
            i += 2;
        }
    }
}

pub fn handle_include_directories(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    let directories = scoped_values(args);
    ctx.push_event(
        EventKind::DirectoryIncludeDirectories { directories },
        node.line,
        node.col,
    );
}

pub fn handle_link_directories(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    let directories = scoped_values(args);
    ctx.push_event(
        EventKind::DirectoryLinkDirectories { directories },
        node.line,
        node.col,
    );
}

pub fn handle_add_compile_options(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    ctx.push_event(
        EventKind::GlobalCompileOptions {
            options: args.to_vec(),
        },
        node.line,
        node.col,
    );
}

pub fn handle_add_definitions(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    ctx.push_event(
        EventKind::GlobalCompileDefinitions {
            definitions: args.to_vec(),
        },
        node.line,
        node.col,
    );
}

pub fn handle_link_libraries(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    ctx.push_event(
        EventKind::GlobalLinkLibraries {
            libraries: scoped_values(args),
        },
        node.line,
        node.col,
    );
}

pub fn handle_add_link_options(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    ctx.push_event(
        EventKind::GlobalLinkOptions {
            options: args.to_vec(),
        },
        node.line,
        node.col,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    fn node(name: &str) -> CommandNode {
        CommandNode {
            name: name.to_string(),
            args: vec![],
            line: 1,
            col: 1,
        }
    }

    #[test]
    fn add_executable_registers_target_and_sources() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_add_executable(
            &mut ctx,
            &node("add_executable"),
            &["app".to_string(), "main.cpp".to_string()],
        );
        assert!(ctx.known_targets.contains("app"));
        assert_eq!(ctx.events.len(), 2);
    }

    #[test]
    fn set_target_properties_emits_one_event_per_property() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_set_target_properties(
            &mut ctx,
            &node("set_target_properties"),
            &[
                "app".to_string(),
                "PROPERTIES".to_string(),
                "CXX_STANDARD".to_string(),
                "20".to_string(),
            ],
        );
        assert_eq!(ctx.events.len(), 1);
        match &ctx.events.events()[0].kind {
            EventKind::TargetPropSet(prop) => {
                assert_eq!(prop.target, "app");
                assert_eq!(prop.property, "CXX_STANDARD");
                assert_eq!(prop.value, "20");
                assert_eq!(prop.op, PropOp::Set);
            }
            other => panic!("expected TargetPropSet event, got {other:?}"),
        }
    }

    #[test]
    fn target_link_libraries_strips_visibility_keywords() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_target_link_libraries(
            &mut ctx,
            &node("target_link_libraries"),
            &["app".to_string(), "PRIVATE".to_string(), "m".to_string()],
        );
        match &ctx.events.events()[0].kind {
            EventKind::TargetLinkLibraries { libraries, .. } => {
                assert_eq!(libraries, &vec!["m".to_string()])
            }
            _ => panic!("expected TargetLinkLibraries"),
        }
    }
}
