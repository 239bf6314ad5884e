//! `file()` handler: READ/STRINGS/WRITE/MAKE_DIRECTORY/
//! GLOB/COPY, all routed through the project-scope [`Sandbox`] guard.
//!
//! Every path argument is resolved, checked, then handed to the
//! filesystem — the [`Sandbox`] guard wraps each filesystem operation so no
//! handler can touch a path outside the project scope.

use crate::ast::types::CommandNode;
use crate::fs::{BufferEncoding, MkdirOptions};
use crate::sandbox::Sandbox;

use super::super::context::EvaluatorContext;
use super::{arity_error, parse_options, security_error, OptionKind, OptionSpec};

const OPT_OFFSET: u32 = 1;
const OPT_LIMIT: u32 = 2;
const OPT_HEX: u32 = 3;
const OPT_LENGTH_MINIMUM: u32 = 4;
const OPT_LENGTH_MAXIMUM: u32 = 5;
const OPT_REGEX: u32 = 6;
const OPT_DESTINATION: u32 = 7;
const OPT_LIST_DIRECTORIES: u32 = 8;
const OPT_RELATIVE: u32 = 9;
const OPT_CONFIGURE_DEPENDS: u32 = 10;

pub fn handle_file(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    let Some((subcommand, rest)) = args.split_first() else {
        arity_error(ctx, node, "file() requires a subcommand");
        return;
    };

    let sandbox = Sandbox::new(ctx.fs, &ctx.source_dir, &ctx.binary_dir);

    match subcommand.as_str() {
        "READ" => handle_read(ctx, node, rest, &sandbox),
        "STRINGS" => handle_strings(ctx, node, rest, &sandbox),
        "WRITE" | "APPEND" => handle_write(ctx, node, rest, &sandbox, subcommand == "APPEND"),
        "MAKE_DIRECTORY" => handle_make_directory(ctx, node, rest, &sandbox),
        "GLOB" | "GLOB_RECURSE" => handle_glob(ctx, node, rest, &sandbox, subcommand == "GLOB_RECURSE"),
        "COPY" => handle_copy(ctx, node, rest, &sandbox),
        _ => arity_error(ctx, node, format!("file({subcommand}) is not implemented")),
    }
}

fn resolve_and_check(
    ctx: &mut EvaluatorContext,
    node: &CommandNode,
    sandbox: &Sandbox,
    path: &str,
) -> Option<String> {
    match sandbox.enforce(ctx.fs, &ctx.source_dir, path) {
        Ok(resolved) => Some(resolved),
        Err(e) => {
            security_error(ctx, node, e.to_string());
            None
        }
    }
}

fn handle_read(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String], sandbox: &Sandbox) {
    if args.len() < 2 {
        arity_error(ctx, node, "file(READ path out) requires a path and output variable");
        return;
    }
    let path = args[0].clone();
    let out_var = args[1].clone();
    let specs = [
        OptionSpec { id: OPT_OFFSET, keyword: "OFFSET", kind: OptionKind::Single },
        OptionSpec { id: OPT_LIMIT, keyword: "LIMIT", kind: OptionKind::Single },
        OptionSpec { id: OPT_HEX, keyword: "HEX", kind: OptionKind::Flag },
    ];
    let parsed = parse_options(&args[2..], &specs);

    let Some(resolved) = resolve_and_check(ctx, node, sandbox, &path) else { return };
    match ctx.fs.read_file_buffer(&resolved) {
        Ok(mut bytes) => {
            let offset = parsed.single(OPT_OFFSET).and_then(|v| v.parse::<usize>().ok()).unwrap_or(0);
            if offset < bytes.len() {
                bytes = bytes[offset..].to_vec();
            }
            if let Some(limit) = parsed.single(OPT_LIMIT).and_then(|v| v.parse::<usize>().ok()) {
                bytes.truncate(limit);
            }
            let encoding = if parsed.has_flag(OPT_HEX) {
                BufferEncoding::Hex
            } else {
                BufferEncoding::Utf8
            };
            let value = crate::fs::from_buffer(&bytes, encoding);
            ctx.scopes.set_local(&out_var, value);
        }
        Err(e) => arity_error(ctx, node, format!("file(READ): {e}")),
    }
}

fn handle_strings(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String], sandbox: &Sandbox) {
    if args.len() < 2 {
        arity_error(ctx, node, "file(STRINGS path out) requires a path and output variable");
        return;
    }
    let path = args[0].clone();
    let out_var = args[1].clone();
    let specs = [
        OptionSpec { id: OPT_LENGTH_MINIMUM, keyword: "LENGTH_MINIMUM", kind: OptionKind::Single },
        OptionSpec { id: OPT_LENGTH_MAXIMUM, keyword: "LENGTH_MAXIMUM", kind: OptionKind::Single },
        OptionSpec { id: OPT_LIMIT, keyword: "LIMIT_COUNT", kind: OptionKind::Single },
        OptionSpec { id: OPT_REGEX, keyword: "REGEX", kind: OptionKind::Single },
    ];
    let parsed = parse_options(&args[2..], &specs);

    let Some(resolved) = resolve_and_check(ctx, node, sandbox, &path) else { return };
    match ctx.fs.read_file(&resolved) {
        Ok(text) => {
            let min_len = parsed.single(OPT_LENGTH_MINIMUM).and_then(|v| v.parse::<usize>().ok());
            let max_len = parsed.single(OPT_LENGTH_MAXIMUM).and_then(|v| v.parse::<usize>().ok());
            let regex = parsed
                .single(OPT_REGEX)
                .and_then(|p| regex_lite::Regex::new(p).ok());
            let limit = parsed.single(OPT_LIMIT).and_then(|v| v.parse::<usize>().ok());

            let mut lines: Vec<String> = Vec::new();
            for line in text.split(['\n', '\0']) {
                if line.is_empty() {
                    continue;
                }
                if let Some(min) = min_len {
                    if line.len() < min {
                        continue;
                    }
                }
                let line_clipped = match max_len {
                    Some(max) if line.len() > max => &line[..max],
                    _ => line,
                };
                if let Some(re) = &regex {
                    if !re.is_match(line_clipped) {
                        continue;
                    }
                }
                lines.push(line_clipped.to_string());
                if let Some(limit) = limit {
                    if lines.len() >= limit {
                        break;
                    }
                }
            }
            ctx.scopes.set_local(&out_var, lines.join(";"));
        }
        Err(e) => arity_error(ctx, node, format!("file(STRINGS): {e}")),
    }
}

fn handle_write(
    ctx: &mut EvaluatorContext,
    node: &CommandNode,
    args: &[String],
    sandbox: &Sandbox,
    append: bool,
) {
    if args.is_empty() {
        arity_error(ctx, node, "file(WRITE path content...) requires a path");
        return;
    }
    let path = args[0].clone();
    let content = args[1..].join("");
    let Some(resolved) = resolve_and_check(ctx, node, sandbox, &path) else { return };

    if let Some(parent) = resolved.rsplit_once('/').map(|(dir, _)| dir) {
        if !parent.is_empty() {
            let _ = ctx.fs.mkdir(parent, &MkdirOptions { recursive: true });
        }
    }

    let result = if append {
        ctx.fs.append_file(&resolved, content.as_bytes())
    } else {
        ctx.fs.write_file(&resolved, content.as_bytes())
    };
    if let Err(e) = result {
        arity_error(ctx, node, format!("file(WRITE): {e}"));
    }
}

fn handle_make_directory(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String], sandbox: &Sandbox) {
    for path in args {
        let Some(resolved) = resolve_and_check(ctx, node, sandbox, path) else { return };
        if let Err(e) = ctx.fs.mkdir(&resolved, &MkdirOptions { recursive: true }) {
            arity_error(ctx, node, format!("file(MAKE_DIRECTORY): {e}"));
            return;
        }
    }
}

fn handle_glob(
    ctx: &mut EvaluatorContext,
    node: &CommandNode,
    args: &[String],
    sandbox: &Sandbox,
    recurse: bool,
) {
    if args.is_empty() {
        arity_error(ctx, node, "file(GLOB out pattern...) requires an output variable");
        return;
    }
    let specs = [
        OptionSpec { id: OPT_LIST_DIRECTORIES, keyword: "LIST_DIRECTORIES", kind: OptionKind::Single },
        OptionSpec { id: OPT_RELATIVE, keyword: "RELATIVE", kind: OptionKind::Single },
        OptionSpec { id: OPT_CONFIGURE_DEPENDS, keyword: "CONFIGURE_DEPENDS", kind: OptionKind::Flag },
    ];
    let parsed = parse_options(&args[1..], &specs);
    let out_var = args[0].clone();
    let list_directories = parsed
        .single(OPT_LIST_DIRECTORIES)
        .map(|v| v != "false" && v != "FALSE" && v != "0")
        .unwrap_or(true);
    let relative_base = parsed.single(OPT_RELATIVE).map(str::to_string);
    let patterns = parsed.positional;
    if patterns.is_empty() {
        arity_error(ctx, node, "file(GLOB out pattern...) requires at least one pattern");
        return;
    }

    let current_source = ctx
        .scopes
        .lookup("CMAKE_CURRENT_SOURCE_DIR")
        .unwrap_or_else(|| ctx.source_dir.clone());
    let Some(root) = resolve_and_check(ctx, node, sandbox, &current_source) else { return };

    let strict = ctx
        .scopes
        .lookup("CMAKE_NOBIFY_FILE_GLOB_STRICT")
        .map(|v| super::super::condition::eval_truthy(&v, &ctx.scopes))
        .unwrap_or(false);

    let mut all_paths: Vec<(String, bool)> = Vec::new();
    if let Err(e) = walk_dir(ctx.fs, &root, true, &mut all_paths) {
        if strict {
            arity_error(ctx, node, format!("file(GLOB): {e}"));
            return;
        }
    }

    let case_insensitive = cfg!(target_os = "windows") || cfg!(target_os = "macos");
    let match_options = glob::MatchOptions {
        case_sensitive: !case_insensitive,
        require_literal_separator: !recurse,
        require_literal_leading_dot: false,
    };

    let mut matches: Vec<String> = Vec::new();
    for (path, is_dir) in &all_paths {
        if *is_dir && !list_directories {
            continue;
        }
        for pattern_raw in &patterns {
            let abs_pattern = if pattern_raw.starts_with('/') {
                pattern_raw.clone()
            } else {
                format!("{}/{}", root.trim_end_matches('/'), pattern_raw)
            };
            let Ok(compiled) = glob::Pattern::new(&abs_pattern) else { continue };
            if compiled.matches_with(path, match_options) {
                matches.push(path.clone());
                break;
            }
        }
    }
    matches.sort();
    matches.dedup();

    if let Some(base) = relative_base {
        let base = base.trim_end_matches('/').to_string();
        matches = matches
            .into_iter()
            .map(|p| p.strip_prefix(&format!("{base}/")).map(str::to_string).unwrap_or(p))
            .collect();
    }

    ctx.scopes.set_local(&out_var, matches.join(";"));
}

/// Recursively walks `dir`, collecting `(path, is_directory)` pairs for
/// every entry reachable from it. `top` is the directory GLOB was invoked
/// against; open failures on nested directories are always tolerated (they
/// simply aren't descended into further), matching upstream CMake's
/// glob semantics — `CMAKE_NOBIFY_FILE_GLOB_STRICT` governs only whether a
/// failure to open `top` itself is fatal.
fn walk_dir(
    fs: &dyn crate::fs::FileSystem,
    dir: &str,
    top: bool,
    out: &mut Vec<(String, bool)>,
) -> Result<(), crate::fs::FsError> {
    let entries = match fs.readdir_with_file_types(dir) {
        Ok(entries) => entries,
        Err(e) if top => return Err(e),
        Err(_) => return Ok(()),
    };
    for entry in entries {
        let path = format!("{}/{}", dir.trim_end_matches('/'), entry.name);
        out.push((path.clone(), entry.is_directory));
        if entry.is_directory {
            let _ = walk_dir(fs, &path, false, out);
        }
    }
    Ok(())
}

fn handle_copy(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String], sandbox: &Sandbox) {
    let specs = [OptionSpec {
        id: OPT_DESTINATION,
        keyword: "DESTINATION",
        kind: OptionKind::Single,
    }];
    let parsed = parse_options(args, &specs);
    let Some(destination) = parsed.single(OPT_DESTINATION) else {
        arity_error(ctx, node, "file(COPY ... DESTINATION dir) requires DESTINATION");
        return;
    };
    let destination = destination.to_string();
    let Some(dest_resolved) = resolve_and_check(ctx, node, sandbox, &destination) else { return };

    for src in &parsed.positional {
        let Some(src_resolved) = resolve_and_check(ctx, node, sandbox, src) else { return };
        let file_name = src_resolved.rsplit('/').next().unwrap_or(&src_resolved);
        let dest_path = format!("{}/{}", dest_resolved.trim_end_matches('/'), file_name);
        match ctx.fs.stat(&src_resolved) {
            Ok(stat) if stat.is_directory => {
                let _ = ctx.fs.mkdir(&dest_path, &MkdirOptions { recursive: true });
                let _ = ctx.fs.cp(&src_resolved, &dest_path, &crate::fs::CpOptions { recursive: true });
            }
            Ok(_) => {
                let _ = ctx.fs.mkdir(&dest_resolved, &MkdirOptions { recursive: true });
                match ctx.fs.read_file_buffer(&src_resolved) {
                    Ok(bytes) => {
                        if let Err(e) = ctx.fs.write_file(&dest_path, &bytes) {
                            arity_error(ctx, node, format!("file(COPY): {e}"));
                            return;
                        }
                    }
                    Err(e) => {
                        arity_error(ctx, node, format!("file(COPY): {e}"));
                        return;
                    }
                }
            }
            Err(e) => {
                arity_error(ctx, node, format!("file(COPY): {e}"));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    fn node(name: &str) -> CommandNode {
        CommandNode { name: name.to_string(), args: vec![], line: 1, col: 1 }
    }

    #[test]
    fn write_then_read_round_trips_within_scope() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/project", "/project/build");
        handle_file(
            &mut ctx,
            &node("file"),
            &["WRITE".to_string(), "/project/out.txt".to_string(), "hello".to_string()],
        );
        handle_file(
            &mut ctx,
            &node("file"),
            &["READ".to_string(), "/project/out.txt".to_string(), "OUT".to_string()],
        );
        assert_eq!(ctx.scopes.lookup("OUT"), Some("hello".to_string()));
    }

    #[test]
    fn write_outside_scope_is_a_security_violation() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/project", "/project/build");
        handle_file(
            &mut ctx,
            &node("file"),
            &["WRITE".to_string(), "/etc/passwd".to_string(), "x".to_string()],
        );
        assert!(ctx.diagnostics.has_errors());
    }

    #[test]
    fn make_directory_is_recursive() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/project", "/project/build");
        handle_file(
            &mut ctx,
            &node("file"),
            &["MAKE_DIRECTORY".to_string(), "/project/a/b/c".to_string()],
        );
        assert!(ctx.fs.stat("/project/a/b/c").map(|s| s.is_directory).unwrap_or(false));
    }

    #[test]
    fn glob_matches_top_level_files_only() {
        let fs = InMemoryFs::new();
        fs.write_file_sync("/project/a.cpp", b"");
        fs.write_file_sync("/project/b.cpp", b"");
        fs.write_file_sync("/project/sub/c.cpp", b"");
        let mut ctx = EvaluatorContext::new(&fs, "/project", "/project/build");
        handle_file(&mut ctx, &node("file"), &["GLOB".to_string(), "OUT".to_string(), "*.cpp".to_string()]);
        assert_eq!(
            ctx.scopes.lookup("OUT"),
            Some("/project/a.cpp;/project/b.cpp".to_string())
        );
    }

    #[test]
    fn glob_recurse_descends_into_subdirectories() {
        let fs = InMemoryFs::new();
        fs.write_file_sync("/project/a.cpp", b"");
        fs.write_file_sync("/project/sub/c.cpp", b"");
        let mut ctx = EvaluatorContext::new(&fs, "/project", "/project/build");
        handle_file(
            &mut ctx,
            &node("file"),
            &["GLOB_RECURSE".to_string(), "OUT".to_string(), "*.cpp".to_string()],
        );
        assert_eq!(
            ctx.scopes.lookup("OUT"),
            Some("/project/a.cpp;/project/sub/c.cpp".to_string())
        );
    }

    #[test]
    fn glob_relative_strips_base_prefix() {
        let fs = InMemoryFs::new();
        fs.write_file_sync("/project/sub/c.cpp", b"");
        let mut ctx = EvaluatorContext::new(&fs, "/project", "/project/build");
        handle_file(
            &mut ctx,
            &node("file"),
            &[
                "GLOB_RECURSE".to_string(),
                "OUT".to_string(),
                "RELATIVE".to_string(),
                "/project".to_string(),
                "*.cpp".to_string(),
            ],
        );
        assert_eq!(ctx.scopes.lookup("OUT"), Some("sub/c.cpp".to_string()));
    }

    #[test]
    fn glob_finds_files_on_a_real_on_disk_tree() {
        use crate::fs::RealFs;

        let tmp_dir = tempdir::TempDir::new("nobify_file_glob").unwrap();
        let root = tmp_dir.path().to_str().unwrap().to_string();
        std::fs::write(format!("{root}/a.cpp"), b"").unwrap();
        std::fs::create_dir(format!("{root}/sub")).unwrap();
        std::fs::write(format!("{root}/sub/b.cpp"), b"").unwrap();

        let fs = RealFs::new();
        let mut ctx = EvaluatorContext::new(&fs, &root, &root);
        handle_file(
            &mut ctx,
            &node("file"),
            &["GLOB_RECURSE".to_string(), "OUT".to_string(), "*.cpp".to_string()],
        );
        let out = ctx.scopes.lookup("OUT").unwrap_or_default();
        assert!(out.contains("a.cpp"));
        assert!(out.contains("b.cpp"));
    }
}
