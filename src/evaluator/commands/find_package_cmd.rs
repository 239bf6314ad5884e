//! `find_package()`: MODULE and CONFIG
//! resolution, `AUTO` defaulting to CONFIG only when
//! `CMAKE_FIND_PACKAGE_PREFER_CONFIG` is set, and the prefix search order
//! `<Pkg>_DIR` short-circuit → HINTS → PATHS → `<Pkg>_ROOT` → `CMAKE_PREFIX_PATH`
//! → `CMAKE_INSTALL_PREFIX` → platform defaults. `NAMES` overrides the
//! candidate package name(s) probed at each search location; `CONFIGS`
//! overrides the config filename(s) tried within a prefix. `REGISTRY_VIEW`
//! is accepted and recorded but never consulted.
//!
//! Probes a list of candidate directories in priority order and stops at
//! the first hit, the same shape for both MODULE and CONFIG resolution.

use crate::ast::types::CommandNode;
use crate::diagnostics::{Diagnostic, Severity};
use crate::events::EventKind;
use crate::fs::FileSystem;

use super::super::condition::eval_truthy;
use super::super::context::EvaluatorContext;
use super::{arity_error, parse_options, OptionKind, OptionSpec};

const OPT_REQUIRED: u32 = 1;
const OPT_QUIET: u32 = 2;
const OPT_COMPONENTS: u32 = 3;
const OPT_MODULE: u32 = 4;
const OPT_CONFIG: u32 = 5;
const OPT_NO_MODULE: u32 = 6;
const OPT_HINTS: u32 = 7;
const OPT_PATHS: u32 = 8;
const OPT_NAMES: u32 = 9;
const OPT_CONFIGS: u32 = 10;
const OPT_REGISTRY_VIEW: u32 = 11;

pub fn handle_find_package(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    let Some((name, rest)) = args.split_first() else {
        arity_error(ctx, node, "find_package() requires a package name");
        return;
    };
    let name = name.clone();

    let (version, rest) = match rest.first() {
        Some(v) if v.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) => {
            (Some(v.clone()), &rest[1..])
        }
        _ => (None, rest),
    };

    let specs = [
        OptionSpec { id: OPT_REQUIRED, keyword: "REQUIRED", kind: OptionKind::Flag },
        OptionSpec { id: OPT_QUIET, keyword: "QUIET", kind: OptionKind::Flag },
        OptionSpec { id: OPT_COMPONENTS, keyword: "COMPONENTS", kind: OptionKind::Multi },
        OptionSpec { id: OPT_MODULE, keyword: "MODULE", kind: OptionKind::Flag },
        OptionSpec { id: OPT_CONFIG, keyword: "CONFIG", kind: OptionKind::Flag },
        OptionSpec { id: OPT_NO_MODULE, keyword: "NO_MODULE", kind: OptionKind::Flag },
        OptionSpec { id: OPT_HINTS, keyword: "HINTS", kind: OptionKind::Multi },
        OptionSpec { id: OPT_PATHS, keyword: "PATHS", kind: OptionKind::Multi },
        OptionSpec { id: OPT_NAMES, keyword: "NAMES", kind: OptionKind::Multi },
        OptionSpec { id: OPT_CONFIGS, keyword: "CONFIGS", kind: OptionKind::Multi },
        OptionSpec { id: OPT_REGISTRY_VIEW, keyword: "REGISTRY_VIEW", kind: OptionKind::Single },
    ];
    let parsed = parse_options(rest, &specs);
    let required = parsed.has_flag(OPT_REQUIRED);
    let quiet = parsed.has_flag(OPT_QUIET);
    let components = parsed.multi(OPT_COMPONENTS).to_vec();

    if let Some(view) = parsed.single(OPT_REGISTRY_VIEW) {
        // Registry-view-aware discovery is plumbing only, never consulted
        // during the prefix search below.
        log::warn!("find_package({name}): REGISTRY_VIEW {view} accepted but not consulted (Windows registry probing is a no-op)");
        ctx.scopes.global().set(&format!("{name}_REGISTRY_VIEW"), view);
    }

    seed_find_vars(ctx, &name, required, quiet, version.as_deref(), &components);

    let prefer_config = ctx
        .scopes
        .lookup("CMAKE_FIND_PACKAGE_PREFER_CONFIG")
        .map(|v| eval_truthy(&v, &ctx.scopes))
        .unwrap_or(false);

    let use_config = parsed.has_flag(OPT_CONFIG) || parsed.has_flag(OPT_NO_MODULE)
        || (!parsed.has_flag(OPT_MODULE) && prefer_config);

    let names: Vec<String> = if parsed.multi(OPT_NAMES).is_empty() {
        vec![name.clone()]
    } else {
        parsed.multi(OPT_NAMES).to_vec()
    };

    let mode = if use_config { "CONFIG" } else { "MODULE" };
    let location = if use_config {
        try_config(ctx, &name, &names, parsed.multi(OPT_CONFIGS), parsed.multi(OPT_HINTS), parsed.multi(OPT_PATHS))
    } else {
        try_module(ctx, &names)
    };

    let already_set = ctx
        .scopes
        .lookup(&format!("{name}_FOUND"))
        .map(|v| !v.is_empty() && v != "0")
        .unwrap_or(false);
    let found = location.is_some() || already_set;

    ctx.scopes
        .global()
        .set(&format!("{name}_FOUND"), if found { "1" } else { "0" });

    let reported_version = ctx.scopes.lookup(&format!("{name}_VERSION"));
    ctx.push_event(
        EventKind::FindPackage {
            name: name.clone(),
            mode: mode.to_string(),
            required,
            found,
            version: reported_version,
            location,
        },
        node.line,
        node.col,
    );

    if required && !found {
        let diag = Diagnostic::new(
            Severity::FatalError,
            ctx.current_file.clone(),
            node.line,
            node.col,
            "evaluator",
            "find_package",
            format!("Could not find a package configuration file for \"{name}\""),
        );
        ctx.emit_diagnostic(diag, node.line, node.col);
    } else if !found && !quiet {
        let diag = Diagnostic::new(
            Severity::Warning,
            ctx.current_file.clone(),
            node.line,
            node.col,
            "evaluator",
            "find_package",
            format!("Could not find package \"{name}\""),
        );
        ctx.emit_diagnostic(diag, node.line, node.col);
    }
}

fn seed_find_vars(
    ctx: &mut EvaluatorContext,
    name: &str,
    required: bool,
    quiet: bool,
    version: Option<&str>,
    components: &[String],
) {
    let global = ctx.scopes.global();
    global.set(&format!("{name}_FIND_REQUIRED"), if required { "1" } else { "0" });
    global.set(&format!("{name}_FIND_QUIETLY"), if quiet { "1" } else { "0" });
    if let Some(v) = version {
        global.set(&format!("{name}_FIND_VERSION"), v);
    }
    if !components.is_empty() {
        let joined = components.join(";");
        global.set(&format!("{name}_FIND_COMPONENTS"), joined.clone());
        global.set(&format!("{name}_REQUIRED_COMPONENTS"), joined);
    }
}

fn try_module(ctx: &mut EvaluatorContext, names: &[String]) -> Option<String> {
    let mut search_dirs: Vec<String> = Vec::new();
    if let Some(v) = ctx.scopes.lookup("CMAKE_MODULE_PATH") {
        search_dirs.extend(v.split(';').filter(|s| !s.is_empty()).map(str::to_string));
    }
    let current_source = ctx
        .scopes
        .lookup("CMAKE_CURRENT_SOURCE_DIR")
        .unwrap_or_else(|| ctx.source_dir.clone());
    search_dirs.push(format!("{}/cmake", current_source.trim_end_matches('/')));

    for dir in &search_dirs {
        for candidate_name in names {
            let candidate = format!("{}/Find{}.cmake", dir.trim_end_matches('/'), candidate_name);
            if ctx.fs.exists(&candidate) {
                if let Ok(source) = ctx.fs.read_file(&candidate) {
                    include_module(ctx, &candidate, &source);
                    return Some(candidate);
                }
            }
        }
    }
    None
}

fn try_config(
    ctx: &mut EvaluatorContext,
    name: &str,
    names: &[String],
    configs: &[String],
    hints: &[String],
    paths: &[String],
) -> Option<String> {
    if let Some(dir) = ctx.scopes.lookup(&format!("{name}_DIR")) {
        if !dir.is_empty() {
            if let Some(location) = probe_config_prefix(ctx, names, configs, &dir) {
                return Some(location);
            }
        }
    }

    let mut prefixes: Vec<String> = Vec::new();
    prefixes.extend(hints.iter().cloned());
    prefixes.extend(paths.iter().cloned());
    if let Some(v) = ctx.scopes.lookup(&format!("{name}_ROOT")) {
        prefixes.extend(v.split(';').filter(|s| !s.is_empty()).map(str::to_string));
    }
    if let Some(v) = ctx.scopes.lookup("CMAKE_PREFIX_PATH") {
        prefixes.extend(v.split(';').filter(|s| !s.is_empty()).map(str::to_string));
    }
    if let Some(v) = ctx.scopes.lookup("CMAKE_INSTALL_PREFIX") {
        prefixes.push(v);
    }
    for default in ["/usr", "/usr/local"] {
        prefixes.push(default.to_string());
    }

    for prefix in &prefixes {
        let prefix = prefix.trim_end_matches('/');
        for candidate_name in names {
            for probe in ["lib/cmake", "lib64/cmake", "share/cmake"] {
                let dir = format!("{prefix}/{probe}/{candidate_name}");
                if let Some(location) = probe_config_prefix(ctx, names, configs, &dir) {
                    return Some(location);
                }
            }
        }
        if let Some(location) = probe_config_prefix(ctx, names, configs, prefix) {
            return Some(location);
        }
    }
    None
}

/// Probes `dir` for a config file under each `names` candidate, preferring
/// `CONFIGS`-overridden filenames when given. Returns the path of the
/// config file that was included.
fn probe_config_prefix(ctx: &mut EvaluatorContext, names: &[String], configs: &[String], dir: &str) -> Option<String> {
    let dir = dir.trim_end_matches('/');
    for candidate_name in names {
        let mut candidates: Vec<String> = Vec::new();
        if !configs.is_empty() {
            candidates.extend(configs.iter().map(|c| format!("{dir}/{c}")));
            candidates.extend(configs.iter().map(|c| format!("{dir}/{candidate_name}/{c}")));
        } else {
            candidates.push(format!("{dir}/{candidate_name}Config.cmake"));
            candidates.push(format!("{dir}/{}-config.cmake", candidate_name.to_ascii_lowercase()));
            candidates.push(format!("{dir}/{candidate_name}/{candidate_name}Config.cmake"));
            candidates.push(format!(
                "{dir}/{candidate_name}/{}-config.cmake",
                candidate_name.to_ascii_lowercase()
            ));
        }
        for candidate in &candidates {
            if ctx.fs.exists(candidate) {
                if let Ok(source) = ctx.fs.read_file(candidate) {
                    include_module(ctx, candidate, &source);
                    let version_file = candidate.replace("Config.cmake", "ConfigVersion.cmake");
                    if ctx.fs.exists(&version_file) {
                        if let Ok(vsource) = ctx.fs.read_file(&version_file) {
                            include_module(ctx, &version_file, &vsource);
                        }
                    }
                    return Some(candidate.clone());
                }
            }
        }
    }
    None
}

fn include_module(ctx: &mut EvaluatorContext, path: &str, source: &str) {
    match crate::parser::parse(source) {
        Ok(script) => {
            let saved_file = ctx.current_file.clone();
            ctx.current_file = path.to_string();
            super::super::eval_statements(ctx, &script.statements);
            ctx.current_file = saved_file;
        }
        Err(e) => {
            let diag = Diagnostic::new(
                Severity::Error,
                path.to_string(),
                0,
                0,
                "parser",
                "find_package",
                e.to_string(),
            );
            ctx.emit_diagnostic(diag, 0, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    fn node() -> CommandNode {
        CommandNode { name: "find_package".to_string(), args: vec![], line: 1, col: 1 }
    }

    #[test]
    fn module_mode_includes_find_module_and_sets_found() {
        let fs = InMemoryFs::new();
        fs.mkdir_sync("/p/cmake");
        fs.write_file_sync("/p/cmake/FindWidgets.cmake", b"set(WIDGETS_FOUND 1)");
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_find_package(&mut ctx, &node(), &["Widgets".to_string(), "MODULE".to_string()]);
        assert_eq!(ctx.scopes.lookup("WIDGETS_FOUND"), Some("1".to_string()));
    }

    #[test]
    fn required_and_not_found_is_fatal() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_find_package(&mut ctx, &node(), &["Nope".to_string(), "REQUIRED".to_string()]);
        assert!(ctx.stop_requested);
    }

    #[test]
    fn config_mode_honors_explicit_dir_hint() {
        let fs = InMemoryFs::new();
        fs.mkdir_sync("/opt/widgets");
        fs.write_file_sync("/opt/widgets/WidgetsConfig.cmake", b"set(FOUND_VIA_CONFIG 1)");
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        ctx.scopes.set_local("Widgets_DIR", "/opt/widgets");
        handle_find_package(&mut ctx, &node(), &["Widgets".to_string(), "CONFIG".to_string()]);
        assert_eq!(ctx.scopes.lookup("FOUND_VIA_CONFIG"), Some("1".to_string()));
        assert_eq!(ctx.scopes.lookup("Widgets_FOUND"), Some("1".to_string()));
    }

    #[test]
    fn names_override_probes_alternate_package_name() {
        let fs = InMemoryFs::new();
        fs.mkdir_sync("/p/cmake");
        fs.write_file_sync("/p/cmake/FindWidgetsAlt.cmake", b"set(FOUND_VIA_ALT_NAME 1)");
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_find_package(
            &mut ctx,
            &node(),
            &[
                "Widgets".to_string(),
                "MODULE".to_string(),
                "NAMES".to_string(),
                "WidgetsAlt".to_string(),
            ],
        );
        assert_eq!(ctx.scopes.lookup("FOUND_VIA_ALT_NAME"), Some("1".to_string()));
        assert_eq!(ctx.scopes.lookup("Widgets_FOUND"), Some("1".to_string()));
    }

    #[test]
    fn module_mode_emits_find_package_event_with_mode_and_location() {
        let fs = InMemoryFs::new();
        fs.mkdir_sync("/p/cmake");
        fs.write_file_sync("/p/cmake/FindWidgets.cmake", b"set(WIDGETS_FOUND 1)");
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_find_package(
            &mut ctx,
            &node(),
            &["Widgets".to_string(), "MODULE".to_string(), "REQUIRED".to_string()],
        );
        match &ctx.events.events().last().unwrap().kind {
            EventKind::FindPackage { name, mode, required, found, location, .. } => {
                assert_eq!(name, "Widgets");
                assert_eq!(mode, "MODULE");
                assert!(*required);
                assert!(*found);
                assert_eq!(location.as_deref(), Some("/p/cmake/FindWidgets.cmake"));
            }
            other => panic!("expected FindPackage event, got {other:?}"),
        }
    }

    #[test]
    fn registry_view_is_recorded_without_affecting_search() {
        let fs = InMemoryFs::new();
        let mut ctx = EvaluatorContext::new(&fs, "/p", "/p/build");
        handle_find_package(
            &mut ctx,
            &node(),
            &["Widgets".to_string(), "REGISTRY_VIEW".to_string(), "64".to_string()],
        );
        assert_eq!(ctx.scopes.lookup("Widgets_REGISTRY_VIEW"), Some("64".to_string()));
    }
}
