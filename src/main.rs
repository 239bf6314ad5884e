use clap::{Parser, Subcommand};

use nobify_cmake::evaluator::{self, context::EvaluatorContext};
use nobify_cmake::fs::{InMemoryFs, RealFs};
use nobify_cmake::parser;

#[derive(Parser)]
#[command(name = "nobify-cmake")]
#[command(about = "A CMake-language lexer, parser, and evaluator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Harness>,

    /// Script file to evaluate (default mode, when no harness subcommand is given)
    script_file: Option<String>,

    /// Emit the event stream as JSON instead of a human-readable summary
    #[arg(long)]
    json: bool,

    /// CMAKE_SOURCE_DIR for the run (defaults to the script's directory)
    #[arg(long)]
    source_dir: Option<String>,

    /// CMAKE_BINARY_DIR for the run (defaults to `<source-dir>/build`)
    #[arg(long)]
    binary_dir: Option<String>,
}

/// Each subcommand exercises one pipeline stage end to end against a
/// throwaway workspace and reports pass/fail.
#[derive(Subcommand)]
enum Harness {
    TestArena,
    TestLexer,
    TestParser,
    TestEvaluator,
    TestPipeline,
    TestV2,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let exit_code = match &cli.command {
        Some(harness) => run_harness(harness),
        None => run_script(&cli),
    };
    std::process::exit(exit_code);
}

fn run_script(cli: &Cli) -> i32 {
    let Some(path) = cli.script_file.as_ref() else {
        eprintln!("Error: provide a script file, or one of the test-* harness subcommands (see --help)");
        return 1;
    };

    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: cannot read {path}: {e}");
            return 1;
        }
    };

    let source_dir = cli.source_dir.clone().unwrap_or_else(|| {
        std::path::Path::new(path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ".".to_string())
    });
    let binary_dir = cli
        .binary_dir
        .clone()
        .unwrap_or_else(|| format!("{}/build", source_dir.trim_end_matches('/')));

    let script = match parser::parse(&source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Parse error: {e}");
            return 1;
        }
    };

    let fs = RealFs::default();
    let mut ctx = EvaluatorContext::new(&fs, source_dir, binary_dir);
    evaluator::run(&mut ctx, &script, path);

    if cli.json {
        let rendered: Vec<String> = ctx.events.events().iter().map(|e| format!("{e:?}")).collect();
        println!("{}", serde_json::json!({ "events": rendered }));
    } else {
        for diag in ctx.diagnostics.records() {
            eprintln!("{diag}");
        }
        println!(
            "{} events, {} errors, {} warnings",
            ctx.events.len(),
            ctx.diagnostics.error_count(),
            ctx.diagnostics.warning_count()
        );
    }

    if ctx.diagnostics.has_errors() { 1 } else { 0 }
}

/// Prepares a throwaway workspace under the system temp directory, runs
/// `body`, then removes the workspace regardless of outcome.
fn with_workspace(name: &str, body: impl FnOnce(&std::path::Path) -> Result<(), String>) -> i32 {
    let workspace = std::env::temp_dir().join(format!("nobify-cmake-{name}-{}", std::process::id()));
    if let Err(e) = std::fs::create_dir_all(&workspace) {
        eprintln!("{name}: FAIL (could not create workspace: {e})");
        return 1;
    }

    let result = body(&workspace);
    let _ = std::fs::remove_dir_all(&workspace);

    match result {
        Ok(()) => {
            println!("{name}: PASS");
            0
        }
        Err(e) => {
            eprintln!("{name}: FAIL ({e})");
            1
        }
    }
}

fn run_harness(harness: &Harness) -> i32 {
    match harness {
        Harness::TestArena => with_workspace("test-arena", smoke_arena),
        Harness::TestLexer => with_workspace("test-lexer", smoke_lexer),
        Harness::TestParser => with_workspace("test-parser", smoke_parser),
        Harness::TestEvaluator => with_workspace("test-evaluator", smoke_evaluator),
        Harness::TestPipeline => with_workspace("test-pipeline", smoke_pipeline),
        Harness::TestV2 => with_workspace("test-v2", smoke_v2),
    }
}

fn smoke_arena(_workspace: &std::path::Path) -> Result<(), String> {
    let mut arena = nobify_cmake::arena::Arena::new();
    let mark = arena.mark();
    let a = arena.alloc("hello");
    let b = arena.alloc("world");
    if arena.get(a) != "hello" || arena.get(b) != "world" {
        return Err("round-tripped strings did not match".to_string());
    }
    arena.rewind_to(mark);
    Ok(())
}

fn smoke_lexer(_workspace: &std::path::Path) -> Result<(), String> {
    let tokens = nobify_cmake::lexer::tokenize("set(X 1)\n").map_err(|e| e.to_string())?;
    if tokens.is_empty() {
        return Err("lexer produced no tokens for a non-empty script".to_string());
    }
    Ok(())
}

fn smoke_parser(workspace: &std::path::Path) -> Result<(), String> {
    let path = workspace.join("CMakeLists.txt");
    std::fs::write(&path, "project(demo)\nadd_executable(demo main.cpp)\n")
        .map_err(|e| e.to_string())?;
    let source = std::fs::read_to_string(&path).map_err(|e| e.to_string())?;
    let script = parser::parse(&source).map_err(|e| e.to_string())?;
    if script.statements.is_empty() {
        return Err("parser produced an empty script".to_string());
    }
    Ok(())
}

fn smoke_evaluator(_workspace: &std::path::Path) -> Result<(), String> {
    let fs = InMemoryFs::new();
    let script = parser::parse("set(X 1)\nif(X)\nset(Y yes)\nendif()\n").map_err(|e| e.to_string())?;
    let mut ctx = EvaluatorContext::new(&fs, "/project", "/project/build");
    evaluator::run(&mut ctx, &script, "CMakeLists.txt");
    if ctx.scopes.lookup("Y").as_deref() != Some("yes") {
        return Err("if() branch did not run as expected".to_string());
    }
    Ok(())
}

fn smoke_pipeline(workspace: &std::path::Path) -> Result<(), String> {
    let root = workspace.to_string_lossy().into_owned();
    let list_path = workspace.join("CMakeLists.txt");
    std::fs::write(
        &list_path,
        "project(demo)\nset(SRCS a.cpp b.cpp)\nadd_executable(demo ${SRCS})\n",
    )
    .map_err(|e| e.to_string())?;

    let source = std::fs::read_to_string(&list_path).map_err(|e| e.to_string())?;
    let script = parser::parse(&source).map_err(|e| e.to_string())?;
    let fs = RealFs::default();
    let mut ctx = EvaluatorContext::new(&fs, root.clone(), format!("{root}/build"));
    evaluator::run(&mut ctx, &script, list_path.to_string_lossy().as_ref());

    if ctx.diagnostics.has_errors() {
        return Err("pipeline run produced unexpected errors".to_string());
    }
    if ctx.events.is_empty() {
        return Err("pipeline run produced no events".to_string());
    }
    Ok(())
}

/// Exercises the macro/function/control-flow interplay together, the part
/// of the evaluator closest to the original's `test_evaluator_v2.c` suite.
fn smoke_v2(_workspace: &std::path::Path) -> Result<(), String> {
    let fs = InMemoryFs::new();
    let script = parser::parse(
        r#"
        function(double n)
            math(EXPR DOUBLED "${n} * 2")
            set(DOUBLED "${DOUBLED}" PARENT_SCOPE)
        endfunction()
        double(21)
        "#,
    )
    .map_err(|e| e.to_string())?;
    let mut ctx = EvaluatorContext::new(&fs, "/project", "/project/build");
    evaluator::run(&mut ctx, &script, "CMakeLists.txt");
    if ctx.scopes.lookup("DOUBLED").as_deref() != Some("42") {
        return Err("function() + PARENT_SCOPE did not round-trip".to_string());
    }
    Ok(())
}
