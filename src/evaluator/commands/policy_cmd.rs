//! `cmake_policy()`: thin dispatcher over the `policy` engine's
//! PUSH/POP/SET/GET/VERSION operations.
//!
//! A small keyword-dispatch wrapper over a handful of plain functions, one
//! per `cmake_policy()` sub-form.

use crate::ast::types::CommandNode;

use super::super::context::EvaluatorContext;
use super::super::policy;
use super::arity_error;

fn is_policy_id(token: &str) -> bool {
    token.len() == 7 && token.starts_with("CMP") && token[3..].chars().all(|c| c.is_ascii_digit())
}

pub fn handle_cmake_policy(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    let Some((subcommand, rest)) = args.split_first() else {
        arity_error(ctx, node, "cmake_policy() requires a subcommand");
        return;
    };

    match subcommand.as_str() {
        "PUSH" => policy::push(&mut ctx.scopes),
        "POP" => {
            if let Err(e) = policy::pop(&mut ctx.scopes) {
                arity_error(ctx, node, e);
            }
        }
        "SET" => {
            let (Some(id), Some(value)) = (rest.first(), rest.get(1)) else {
                arity_error(ctx, node, "cmake_policy(SET) requires <CMP####> NEW|OLD");
                return;
            };
            if !is_policy_id(id) {
                arity_error(ctx, node, format!("cmake_policy(SET): \"{id}\" is not a valid policy id"));
                return;
            }
            if value != "NEW" && value != "OLD" {
                arity_error(ctx, node, "cmake_policy(SET) value must be NEW or OLD");
                return;
            }
            policy::set(&mut ctx.scopes, id, value);
        }
        "GET" => {
            let (Some(id), Some(out)) = (rest.first(), rest.get(1)) else {
                arity_error(ctx, node, "cmake_policy(GET) requires <CMP####> <out-var>");
                return;
            };
            let value = policy::effective_value(&ctx.scopes, id);
            ctx.scopes.set_local(out, value);
        }
        "VERSION" => {
            let Some(version) = rest.first() else {
                arity_error(ctx, node, "cmake_policy(VERSION) requires a version string");
                return;
            };
            ctx.scopes.global().set("CMAKE_POLICY_VERSION", version.clone());
        }
        other => arity_error(ctx, node, format!("cmake_policy({other}) is not implemented")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    fn node() -> CommandNode {
        CommandNode { name: "cmake_policy".to_string(), args: vec![], line: 1, col: 1 }
    }

    #[test]
    fn set_then_get_round_trips() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_cmake_policy(&mut ctx, &node(), &["SET".to_string(), "CMP0054".to_string(), "NEW".to_string()]);
        handle_cmake_policy(&mut ctx, &node(), &["GET".to_string(), "CMP0054".to_string(), "OUT".to_string()]);
        assert_eq!(ctx.scopes.lookup("OUT"), Some("NEW".to_string()));
    }

    #[test]
    fn push_pop_scopes_a_policy_change() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_cmake_policy(&mut ctx, &node(), &["SET".to_string(), "CMP0054".to_string(), "OLD".to_string()]);
        handle_cmake_policy(&mut ctx, &node(), &["PUSH".to_string()]);
        handle_cmake_policy(&mut ctx, &node(), &["SET".to_string(), "CMP0054".to_string(), "NEW".to_string()]);
        assert_eq!(policy::effective_value(&ctx.scopes, "CMP0054"), "NEW");
        handle_cmake_policy(&mut ctx, &node(), &["POP".to_string()]);
    }

    #[test]
    fn version_sets_the_floor_variable() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_cmake_policy(&mut ctx, &node(), &["VERSION".to_string(), "3.20".to_string()]);
        assert_eq!(ctx.scopes.lookup("CMAKE_POLICY_VERSION"), Some("3.20".to_string()));
    }

    #[test]
    fn pop_without_push_emits_error() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_cmake_policy(&mut ctx, &node(), &["POP".to_string()]);
        assert!(ctx.stop_requested);
    }
}
