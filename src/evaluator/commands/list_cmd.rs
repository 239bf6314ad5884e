//! `list()`: APPEND/PREPEND/INSERT/REMOVE_ITEM/REMOVE_AT/
//! REMOVE_DUPLICATES/LENGTH/GET/FIND/JOIN/SUBLIST/POP_BACK/POP_FRONT/
//! FILTER/TRANSFORM/REVERSE/SORT, all addressing the `;`-joined string
//! stored in a variable. Negative indices address from the end.
//!
//! Every operation splits the stored value into a `Vec<String>`, mutates
//! it, and rejoins with `;` rather than editing the delimited string in
//! place.

use crate::ast::types::CommandNode;

use super::super::context::EvaluatorContext;
use super::arity_error;

fn read_list(ctx: &EvaluatorContext, name: &str) -> Vec<String> {
    match ctx.scopes.lookup(name) {
        Some(v) if !v.is_empty() => v.split(';').map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

fn write_list(ctx: &mut EvaluatorContext, name: &str, items: &[String]) {
    ctx.scopes.set_local(name, items.join(";"));
}

/// Resolves a (possibly negative) list index; `None` if out of bounds.
fn resolve_index(len: usize, idx: i64) -> Option<usize> {
    if idx >= 0 {
        let idx = idx as usize;
        (idx < len).then_some(idx)
    } else {
        let from_end = (-idx) as usize;
        (from_end <= len).then(|| len - from_end)
    }
}

pub fn handle_list(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    let Some((subcommand, rest)) = args.split_first() else {
        arity_error(ctx, node, "list() requires a subcommand");
        return;
    };
    let Some(var_name) = rest.first() else {
        arity_error(ctx, node, format!("list({subcommand}) requires a list variable"));
        return;
    };
    let var_name = var_name.clone();
    let rest = &rest[1..];
    let mut items = read_list(ctx, &var_name);

    match subcommand.as_str() {
        "APPEND" => {
            items.extend(rest.iter().cloned());
            write_list(ctx, &var_name, &items);
        }
        "PREPEND" => {
            let mut new_items: Vec<String> = rest.to_vec();
            new_items.extend(items);
            write_list(ctx, &var_name, &new_items);
        }
        "INSERT" => {
            let Some(idx_str) = rest.first() else {
                arity_error(ctx, node, "list(INSERT) requires an index");
                return;
            };
            let Ok(idx) = idx_str.parse::<i64>() else {
                arity_error(ctx, node, "list(INSERT) index must be an integer");
                return;
            };
            let insert_at = if idx < 0 {
                (items.len() as i64 + idx).max(0) as usize
            } else {
                (idx as usize).min(items.len())
            };
            for (offset, value) in rest[1..].iter().enumerate() {
                items.insert(insert_at + offset, value.clone());
            }
            write_list(ctx, &var_name, &items);
        }
        "REMOVE_ITEM" => {
            items.retain(|item| !rest.contains(item));
            write_list(ctx, &var_name, &items);
        }
        "REMOVE_AT" => {
            let mut indices: Vec<usize> = rest
                .iter()
                .filter_map(|s| s.parse::<i64>().ok())
                .filter_map(|i| resolve_index(items.len(), i))
                .collect();
            indices.sort_unstable_by(|a, b| b.cmp(a));
            indices.dedup();
            for idx in indices {
                items.remove(idx);
            }
            write_list(ctx, &var_name, &items);
        }
        "REMOVE_DUPLICATES" => {
            let mut seen = std::collections::HashSet::new();
            items.retain(|item| seen.insert(item.clone()));
            write_list(ctx, &var_name, &items);
        }
        "LENGTH" => {
            if let Some(out) = rest.first() {
                ctx.scopes.set_local(out, items.len().to_string());
            }
        }
        "GET" => {
            let Some(out) = rest.last() else {
                arity_error(ctx, node, "list(GET) requires an output variable");
                return;
            };
            let values: Vec<String> = rest[..rest.len() - 1]
                .iter()
                .filter_map(|s| s.parse::<i64>().ok())
                .filter_map(|i| resolve_index(items.len(), i))
                .map(|i| items[i].clone())
                .collect();
            ctx.scopes.set_local(out, values.join(";"));
        }
        "FIND" => {
            let (Some(value), Some(out)) = (rest.first(), rest.get(1)) else {
                arity_error(ctx, node, "list(FIND) requires a value and output variable");
                return;
            };
            let position = items
                .iter()
                .position(|item| item == value)
                .map(|p| p as i64)
                .unwrap_or(-1);
            ctx.scopes.set_local(out, position.to_string());
        }
        "JOIN" => {
            let (Some(glue), Some(out)) = (rest.first(), rest.get(1)) else {
                arity_error(ctx, node, "list(JOIN) requires a glue string and output variable");
                return;
            };
            ctx.scopes.set_local(out, items.join(glue));
        }
        "SUBLIST" => {
            let (Some(start), Some(length), Some(out)) = (rest.first(), rest.get(1), rest.get(2)) else {
                arity_error(ctx, node, "list(SUBLIST) requires start, length, and output variable");
                return;
            };
            let Ok(start) = start.parse::<usize>() else {
                arity_error(ctx, node, "list(SUBLIST) start must be a non-negative integer");
                return;
            };
            let length: i64 = length.parse().unwrap_or(-1);
            let end = if length < 0 {
                items.len()
            } else {
                (start + length as usize).min(items.len())
            };
            let slice = if start <= items.len() && start <= end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            };
            ctx.scopes.set_local(out, slice.join(";"));
        }
        "POP_BACK" => {
            let popped = items.pop();
            if let (Some(out), Some(value)) = (rest.first(), popped.clone()) {
                ctx.scopes.set_local(out, value);
            }
            write_list(ctx, &var_name, &items);
        }
        "POP_FRONT" => {
            let popped = if items.is_empty() { None } else { Some(items.remove(0)) };
            if let (Some(out), Some(value)) = (rest.first(), popped) {
                ctx.scopes.set_local(out, value);
            }
            write_list(ctx, &var_name, &items);
        }
        "REVERSE" => {
            items.reverse();
            write_list(ctx, &var_name, &items);
        }
        "SORT" => {
            let ascending = !rest.iter().any(|a| a == "DESCENDING");
            let insensitive = rest.iter().any(|a| a == "INSENSITIVE");
            insertion_sort(&mut items, insensitive);
            if !ascending {
                items.reverse();
            }
            write_list(ctx, &var_name, &items);
        }
        "FILTER" => {
            let (Some(mode), Some(kw), Some(pattern)) = (rest.first(), rest.get(1), rest.get(2)) else {
                arity_error(ctx, node, "list(FILTER) requires INCLUDE|EXCLUDE REGEX pattern");
                return;
            };
            if kw != "REGEX" {
                arity_error(ctx, node, "list(FILTER) only supports REGEX");
                return;
            }
            let Ok(re) = regex_lite::Regex::new(pattern) else {
                arity_error(ctx, node, format!("list(FILTER): invalid regex '{pattern}'"));
                return;
            };
            let include = mode == "INCLUDE";
            items.retain(|item| re.is_match(item) == include);
            write_list(ctx, &var_name, &items);
        }
        "TRANSFORM" => {
            let Some(action) = rest.first() else {
                arity_error(ctx, node, "list(TRANSFORM) requires an action");
                return;
            };
            match action.as_str() {
                "TOUPPER" => items.iter_mut().for_each(|i| *i = i.to_ascii_uppercase()),
                "TOLOWER" => items.iter_mut().for_each(|i| *i = i.to_ascii_lowercase()),
                "STRIP" => items.iter_mut().for_each(|i| *i = i.trim().to_string()),
                other => {
                    arity_error(ctx, node, format!("list(TRANSFORM {other}) is not implemented"));
                    return;
                }
            }
            write_list(ctx, &var_name, &items);
        }
        other => arity_error(ctx, node, format!("list({other}) is not implemented")),
    }
}

/// Stable insertion sort — simple and fine since lists stay small in practice.
fn insertion_sort(items: &mut [String], insensitive: bool) {
    let key = |s: &str| if insensitive { s.to_ascii_lowercase() } else { s.to_string() };
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && key(&items[j - 1]) > key(&items[j]) {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    fn node() -> CommandNode {
        CommandNode { name: "list".to_string(), args: vec![], line: 1, col: 1 }
    }

    #[test]
    fn append_and_length() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_list(&mut ctx, &node(), &["APPEND".to_string(), "L".to_string(), "a".to_string(), "b".to_string()]);
        handle_list(&mut ctx, &node(), &["LENGTH".to_string(), "L".to_string(), "N".to_string()]);
        assert_eq!(ctx.scopes.lookup("N"), Some("2".to_string()));
    }

    #[test]
    fn negative_index_get() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        ctx.scopes.set_local("L", "a;b;c");
        handle_list(&mut ctx, &node(), &["GET".to_string(), "L".to_string(), "-1".to_string(), "OUT".to_string()]);
        assert_eq!(ctx.scopes.lookup("OUT"), Some("c".to_string()));
    }

    #[test]
    fn sort_is_stable_ascending_by_default() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        ctx.scopes.set_local("L", "b;a;c");
        handle_list(&mut ctx, &node(), &["SORT".to_string(), "L".to_string()]);
        assert_eq!(ctx.scopes.lookup("L"), Some("a;b;c".to_string()));
    }

    #[test]
    fn filter_regex_include() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        ctx.scopes.set_local("L", "foo.cpp;bar.h;baz.cpp");
        handle_list(
            &mut ctx,
            &node(),
            &["FILTER".to_string(), "L".to_string(), "INCLUDE".to_string(), "REGEX".to_string(), "\\.cpp$".to_string()],
        );
        assert_eq!(ctx.scopes.lookup("L"), Some("foo.cpp;baz.cpp".to_string()));
    }

    #[test]
    fn remove_at_handles_multiple_indices() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        ctx.scopes.set_local("L", "a;b;c;d");
        handle_list(&mut ctx, &node(), &["REMOVE_AT".to_string(), "L".to_string(), "0".to_string(), "2".to_string()]);
        assert_eq!(ctx.scopes.lookup("L"), Some("b;d".to_string()));
    }
}
