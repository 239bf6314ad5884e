//! `cmake_path()`: SET/GET/APPEND/
//! APPEND_STRING/REMOVE_FILENAME/REPLACE_FILENAME/REMOVE_EXTENSION/
//! REPLACE_EXTENSION/NORMAL_PATH/RELATIVE_PATH/ABSOLUTE_PATH/NATIVE_PATH/
//! CONVERT/COMPARE/HAS_*/IS_*, decomposing POSIX, drive-letter, and UNC
//! paths into root-name/root-directory/relative-part.
//!
//! Path joining and normalization helpers generalized from a single POSIX
//! path model to CMake's root-name-aware decomposition.

use crate::ast::types::CommandNode;

use super::super::context::EvaluatorContext;
use super::arity_error;

/// Splits `path` into `(root_name, root_directory, relative_part)`.
fn decompose(path: &str) -> (String, String, String) {
    if let Some(rest) = path.strip_prefix("//") {
        if let Some(first_slash) = rest.find('/') {
            let end = rest[first_slash + 1..]
                .find('/')
                .map(|i| first_slash + 1 + i)
                .unwrap_or(rest.len());
            let root_name = format!("//{}", &rest[..end]);
            let (root_dir, relative) = split_root_dir(&rest[end..]);
            return (root_name, root_dir, relative);
        }
        let root_name = format!("//{rest}");
        return (root_name, String::new(), String::new());
    }
    if path.len() >= 2 && path.as_bytes()[1] == b':' && path.as_bytes()[0].is_ascii_alphabetic() {
        let root_name = path[..2].to_string();
        let (root_dir, relative) = split_root_dir(&path[2..]);
        return (root_name, root_dir, relative);
    }
    let (root_dir, relative) = split_root_dir(path);
    (String::new(), root_dir, relative)
}

fn split_root_dir(s: &str) -> (String, String) {
    match s.strip_prefix('/') {
        Some(rest) => ("/".to_string(), rest.to_string()),
        None => (String::new(), s.to_string()),
    }
}

fn root_path(path: &str) -> String {
    let (name, dir, _) = decompose(path);
    format!("{name}{dir}")
}

fn filename(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn parent_path(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

fn stem(path: &str) -> String {
    let name = filename(path);
    if name == "." || name == ".." {
        return name;
    }
    match name.rfind('.') {
        Some(0) => name,
        Some(idx) => name[..idx].to_string(),
        None => name,
    }
}

fn extension(path: &str) -> String {
    let name = filename(path);
    if name == "." || name == ".." {
        return String::new();
    }
    match name.rfind('.') {
        Some(0) => String::new(),
        Some(idx) => name[idx..].to_string(),
        None => String::new(),
    }
}

fn is_absolute(path: &str) -> bool {
    let (root_name, root_dir, _) = decompose(path);
    !root_dir.is_empty() || root_name.starts_with("//")
}

fn normal_path(path: &str) -> String {
    let (root_name, root_dir, relative) = decompose(path);
    let mut stack: Vec<&str> = Vec::new();
    for seg in relative.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if stack.last().map(|s| *s != "..").unwrap_or(false) {
                    stack.pop();
                } else if root_dir.is_empty() {
                    stack.push("..");
                }
            }
            other => stack.push(other),
        }
    }
    let joined = stack.join("/");
    let result = format!("{root_name}{root_dir}{joined}");
    if result.is_empty() {
        ".".to_string()
    } else {
        result
    }
}

fn path_parts(normalized: &str) -> Vec<&str> {
    normalized
        .trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

fn relative_path(base: &str, target: &str) -> String {
    let base_n = normal_path(base);
    let target_n = normal_path(target);
    let base_parts = path_parts(&base_n);
    let target_parts = path_parts(&target_n);
    let mut common = 0;
    while common < base_parts.len()
        && common < target_parts.len()
        && base_parts[common] == target_parts[common]
    {
        common += 1;
    }
    let mut out: Vec<String> = (common..base_parts.len()).map(|_| "..".to_string()).collect();
    out.extend(target_parts[common..].iter().map(|s| s.to_string()));
    if out.is_empty() {
        ".".to_string()
    } else {
        out.join("/")
    }
}

fn absolute_path(base_dir: &str, path: &str) -> String {
    if is_absolute(path) {
        normal_path(path)
    } else {
        normal_path(&format!("{}/{}", base_dir.trim_end_matches('/'), path))
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "TRUE"
    } else {
        "FALSE"
    }
}

pub fn handle_cmake_path(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    let Some((subcommand, rest)) = args.split_first() else {
        arity_error(ctx, node, "cmake_path() requires a subcommand");
        return;
    };

    match subcommand.as_str() {
        "COMPARE" => {
            let (Some(a), Some(op), Some(b), Some(out)) =
                (rest.first(), rest.get(1), rest.get(2), rest.get(3))
            else {
                arity_error(ctx, node, "cmake_path(COMPARE) requires path1 OP path2 out");
                return;
            };
            let result = match op.as_str() {
                "EQUAL" => normal_path(a) == normal_path(b),
                "NOT_EQUAL" => normal_path(a) != normal_path(b),
                other => {
                    arity_error(ctx, node, format!("cmake_path(COMPARE {other}) is not implemented"));
                    return;
                }
            };
            ctx.scopes.set_local(out, bool_str(result));
            return;
        }
        "HAS_ROOT_NAME" | "HAS_ROOT_DIRECTORY" | "HAS_ROOT_PATH" | "HAS_FILENAME"
        | "HAS_EXTENSION" | "HAS_STEM" | "HAS_RELATIVE_PART" | "HAS_PARENT_PATH" => {
            let (Some(path), Some(out)) = (rest.first(), rest.get(1)) else {
                arity_error(ctx, node, format!("cmake_path({subcommand}) requires a path and output variable"));
                return;
            };
            let has = match subcommand.as_str() {
                "HAS_ROOT_NAME" => !decompose(path).0.is_empty(),
                "HAS_ROOT_DIRECTORY" => !decompose(path).1.is_empty(),
                "HAS_ROOT_PATH" => !root_path(path).is_empty(),
                "HAS_FILENAME" => !filename(path).is_empty(),
                "HAS_EXTENSION" => !extension(path).is_empty(),
                "HAS_STEM" => !stem(path).is_empty(),
                "HAS_RELATIVE_PART" => !decompose(path).2.is_empty(),
                "HAS_PARENT_PATH" => !parent_path(path).is_empty(),
                _ => unreachable!(),
            };
            ctx.scopes.set_local(out, bool_str(has));
            return;
        }
        "IS_ABSOLUTE" | "IS_RELATIVE" => {
            let (Some(path), Some(out)) = (rest.first(), rest.get(1)) else {
                arity_error(ctx, node, format!("cmake_path({subcommand}) requires a path and output variable"));
                return;
            };
            let abs = is_absolute(path);
            let result = if subcommand == "IS_ABSOLUTE" { abs } else { !abs };
            ctx.scopes.set_local(out, bool_str(result));
            return;
        }
        _ => {}
    }

    let Some(var_name) = rest.first() else {
        arity_error(ctx, node, format!("cmake_path({subcommand}) requires a path variable"));
        return;
    };
    let var_name = var_name.clone();
    let rest = &rest[1..];
    let current = ctx.scopes.lookup(&var_name).unwrap_or_default();

    match subcommand.as_str() {
        "SET" => {
            let Some(value) = rest.first() else {
                arity_error(ctx, node, "cmake_path(SET) requires a value");
                return;
            };
            ctx.scopes.set_local(&var_name, value.clone());
        }
        "APPEND" => {
            let mut path = current;
            for part in rest.iter().filter(|a| a.as_str() != "OUTPUT_VARIABLE") {
                if is_absolute(part) {
                    path = part.clone();
                } else if path.is_empty() || path.ends_with('/') {
                    path.push_str(part);
                } else {
                    path.push('/');
                    path.push_str(part);
                }
            }
            ctx.scopes.set_local(&var_name, path);
        }
        "APPEND_STRING" => {
            let mut path = current;
            for part in rest {
                path.push_str(part);
            }
            ctx.scopes.set_local(&var_name, path);
        }
        "GET" => {
            let (Some(component), Some(out)) = (rest.first(), rest.last()) else {
                arity_error(ctx, node, "cmake_path(GET) requires a component and output variable");
                return;
            };
            let value = match component.as_str() {
                "ROOT_NAME" => decompose(&current).0,
                "ROOT_DIRECTORY" => decompose(&current).1,
                "ROOT_PATH" => root_path(&current),
                "FILENAME" => filename(&current),
                "EXTENSION" => extension(&current),
                "STEM" => stem(&current),
                "RELATIVE_PART" => decompose(&current).2,
                "PARENT_PATH" => parent_path(&current),
                other => {
                    arity_error(ctx, node, format!("cmake_path(GET {other}) is not implemented"));
                    return;
                }
            };
            ctx.scopes.set_local(out, value);
        }
        "REMOVE_FILENAME" => {
            ctx.scopes.set_local(&var_name, parent_path(&current));
        }
        "REPLACE_FILENAME" => {
            let Some(new_name) = rest.first() else {
                arity_error(ctx, node, "cmake_path(REPLACE_FILENAME) requires a new name");
                return;
            };
            let parent = parent_path(&current);
            let joined = if parent.is_empty() {
                new_name.clone()
            } else {
                format!("{}/{}", parent.trim_end_matches('/'), new_name)
            };
            ctx.scopes.set_local(&var_name, joined);
        }
        "REMOVE_EXTENSION" => {
            let ext = extension(&current);
            let trimmed = if ext.is_empty() {
                current
            } else {
                current[..current.len() - ext.len()].to_string()
            };
            ctx.scopes.set_local(&var_name, trimmed);
        }
        "REPLACE_EXTENSION" => {
            let Some(new_ext) = rest.first() else {
                arity_error(ctx, node, "cmake_path(REPLACE_EXTENSION) requires a new extension");
                return;
            };
            let ext = extension(&current);
            let base = if ext.is_empty() {
                current.clone()
            } else {
                current[..current.len() - ext.len()].to_string()
            };
            let new_ext = if new_ext.is_empty() || new_ext.starts_with('.') {
                new_ext.clone()
            } else {
                format!(".{new_ext}")
            };
            ctx.scopes.set_local(&var_name, format!("{base}{new_ext}"));
        }
        "NORMAL_PATH" => {
            ctx.scopes.set_local(&var_name, normal_path(&current));
        }
        "RELATIVE_PATH" => {
            let Some(base) = rest.first() else {
                arity_error(ctx, node, "cmake_path(RELATIVE_PATH) requires a base path");
                return;
            };
            ctx.scopes.set_local(&var_name, relative_path(base, &current));
        }
        "ABSOLUTE_PATH" => {
            let base_dir = rest
                .iter()
                .find(|a| a.as_str() != "NORMALIZE")
                .cloned()
                .unwrap_or_else(|| ctx.scopes.lookup("CMAKE_CURRENT_SOURCE_DIR").unwrap_or_else(|| ctx.source_dir.clone()));
            ctx.scopes.set_local(&var_name, absolute_path(&base_dir, &current));
        }
        "NATIVE_PATH" | "CONVERT" => {
            ctx.scopes.set_local(&var_name, current.replace('\\', "/"));
        }
        other => arity_error(ctx, node, format!("cmake_path({other}) is not implemented")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    fn node() -> CommandNode {
        CommandNode { name: "cmake_path".to_string(), args: vec![], line: 1, col: 1 }
    }

    #[test]
    fn get_filename_and_extension() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        ctx.scopes.set_local("P", "/a/b/c.txt");
        handle_cmake_path(&mut ctx, &node(), &["GET".into(), "P".into(), "FILENAME".into(), "OUT".into()]);
        assert_eq!(ctx.scopes.lookup("OUT"), Some("c.txt".to_string()));
        handle_cmake_path(&mut ctx, &node(), &["GET".into(), "P".into(), "EXTENSION".into(), "EXT".into()]);
        assert_eq!(ctx.scopes.lookup("EXT"), Some(".txt".to_string()));
    }

    #[test]
    fn normal_path_collapses_dot_dot() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        ctx.scopes.set_local("P", "/a/b/../c");
        handle_cmake_path(&mut ctx, &node(), &["NORMAL_PATH".into(), "P".into()]);
        assert_eq!(ctx.scopes.lookup("P"), Some("/a/c".to_string()));
    }

    #[test]
    fn is_absolute_distinguishes_relative_paths() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_cmake_path(&mut ctx, &node(), &["IS_ABSOLUTE".into(), "/a/b".into(), "OUT1".into()]);
        handle_cmake_path(&mut ctx, &node(), &["IS_ABSOLUTE".into(), "a/b".into(), "OUT2".into()]);
        assert_eq!(ctx.scopes.lookup("OUT1"), Some("TRUE".to_string()));
        assert_eq!(ctx.scopes.lookup("OUT2"), Some("FALSE".to_string()));
    }

    #[test]
    fn relative_path_computes_common_prefix() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        ctx.scopes.set_local("P", "/a/b/c");
        handle_cmake_path(&mut ctx, &node(), &["RELATIVE_PATH".into(), "P".into(), "/a/x".into()]);
        assert_eq!(ctx.scopes.lookup("P"), Some("../b/c".to_string()));
    }
}
