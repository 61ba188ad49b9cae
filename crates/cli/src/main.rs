mod config;
mod logging;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use shire_core::{
    compile, parse_front_matter, split_document, ActionLocation, CompiledDocument, FrontMatter,
};
use shire_eval::{
    is_diagnostic, ActionRegistry, AgentRegistry, CancellationToken, CommandDispatcher, Console,
    DocumentRunner, ItemSource, NullConsole, RunContext, ShireAction, StdoutConsole,
};

use config::ShireConfig;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Extension of script files picked up by `shire actions`.
const SCRIPT_EXTENSION: &str = "shire";

/// Shire script toolchain.
#[derive(Parser)]
#[command(name = "shire", version, about = "Shire script toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log at debug level
    #[arg(long, global = true)]
    verbose: bool,

    /// Path to a shire.toml (default: <root>/shire.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project root used as the item source
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a script and print its front matter
    Parse {
        /// Path to the .shire script
        file: PathBuf,
    },

    /// Compile a script and print its symbol table
    Check {
        /// Path to the .shire script
        file: PathBuf,
    },

    /// Compile and run a script against the project
    Run {
        /// Path to the .shire script
        file: PathBuf,
        /// Runtime value for a built-in variable (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,
    },

    /// Dispatch one inline command, e.g. regex(".*\.kt")
    Exec {
        /// The call expression
        call: String,
    },

    /// List the enabled actions defined by the scripts in a directory
    Actions {
        /// Directory containing .shire scripts
        dir: PathBuf,
        /// Only actions shown at this location
        #[arg(long)]
        location: Option<ActionLocation>,
    },
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))
}

fn main() {
    let cli = Cli::parse();

    let config = match config::load_config(cli.config.as_deref(), &cli.root) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    logging::init_tracing(cli.verbose, config.log.filter.as_deref());
    tracing::debug!(
        root = %cli.root.display(),
        ignore = ?config.index.ignore,
        max_file_size = config.index.max_file_size,
        "config loaded"
    );

    match cli.command {
        Commands::Parse { file } => {
            cmd_parse(&file, cli.output, cli.quiet);
        }
        Commands::Check { file } => {
            cmd_check(&file, cli.output, cli.quiet);
        }
        Commands::Run { file, vars } => {
            cmd_run(&file, &vars, &cli.root, &config, cli.output, cli.quiet);
        }
        Commands::Exec { call } => {
            cmd_exec(&call, &cli.root, &config, cli.output);
        }
        Commands::Actions { dir, location } => {
            cmd_actions(&dir, location, cli.output, cli.quiet);
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn read_script(file: &Path) -> String {
    match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: could not read '{}': {}", file.display(), e);
            process::exit(1);
        }
    }
}

fn compile_or_exit(file: &Path, output: OutputFormat, quiet: bool) -> CompiledDocument {
    match compile(&read_script(file)) {
        Ok(doc) => doc,
        Err(e) => {
            match output {
                OutputFormat::Json => {
                    let err_json = serde_json::to_string_pretty(&e.to_json_value())
                        .unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", e));
                    eprintln!("{}", err_json);
                }
                OutputFormat::Text => {
                    if !quiet {
                        eprintln!("{}: {}", file.display(), e);
                    }
                }
            }
            process::exit(1);
        }
    }
}

fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {}", e);
            process::exit(1);
        }
    }
}

fn print_json(value: &impl serde::Serialize) {
    let pretty =
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("serialization error: {}", e));
    println!("{}", pretty);
}

// ── Subcommands ───────────────────────────────────────────────────────────────

fn cmd_parse(file: &Path, output: OutputFormat, quiet: bool) {
    let text = read_script(file);
    let parsed = split_document(&text).and_then(|doc| match doc.header {
        Some(header) => parse_front_matter(header, doc.header_line),
        None => Ok(FrontMatter::default()),
    });
    match parsed {
        Ok(fm) => match output {
            OutputFormat::Json => print_json(&fm),
            OutputFormat::Text => print_front_matter(&fm),
        },
        Err(e) => {
            match output {
                OutputFormat::Json => eprintln!("{}", e.to_json_value()),
                OutputFormat::Text => {
                    if !quiet {
                        eprintln!("{}: {}", file.display(), e);
                    }
                }
            }
            process::exit(1);
        }
    }
}

fn print_front_matter(fm: &FrontMatter) {
    if let Some(name) = &fm.name {
        println!("name: {}", name);
    }
    if let Some(description) = &fm.description {
        println!("description: {}", description);
    }
    println!("actionLocation: {}", fm.action_location);
    println!("enabled: {}", fm.enabled);
    if let Some(agent) = &fm.agent {
        println!("agent: {}", agent);
    }
    if !fm.variables.is_empty() {
        println!("variables:");
        for decl in &fm.variables {
            println!(
                "  {} (line {}): {}",
                decl.name,
                decl.line,
                decl.value.kind_name()
            );
        }
    }
    for (key, value) in &fm.entries {
        println!("{}: {}", key, value.kind_name());
    }
}

fn cmd_check(file: &Path, output: OutputFormat, quiet: bool) {
    let doc = compile_or_exit(file, output, quiet);
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({ "symbols": doc.symbols })),
        OutputFormat::Text => {
            if !quiet {
                println!("{}: ok, {} symbols", file.display(), doc.symbols.len());
            }
            for (name, info) in &doc.symbols {
                println!(
                    "{:<20} {:<8} {:<12} line {}",
                    name,
                    info.var_type.to_string(),
                    info.scope.to_string(),
                    info.line_declared
                );
            }
        }
    }
}

fn cmd_run(
    file: &Path,
    vars: &[(String, String)],
    root: &Path,
    config: &ShireConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let doc = compile_or_exit(file, output, quiet);

    let mut ctx = RunContext::new();
    ctx.set("filePath", file.display().to_string());
    if let Some(name) = file.file_name() {
        ctx.set("fileName", name.to_string_lossy());
    }
    for (key, value) in vars {
        ctx.set(key, value.as_str());
    }

    let streams = output == OutputFormat::Text && doc.front_matter.agent.is_some();
    let console: Arc<dyn Console> = if streams {
        Arc::new(StdoutConsole)
    } else {
        Arc::new(NullConsole)
    };
    let cancel = CancellationToken::new();
    let source: Arc<dyn ItemSource> = Arc::new(config.source(root));
    let runner = DocumentRunner::new(source)
        .with_agents(AgentRegistry::with_echo())
        .with_console(console)
        .with_cancellation(cancel.clone());

    let script_path = file.display().to_string();
    let rt = runtime();
    let result = rt.block_on(async {
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });
        runner.run(&script_path, &doc, &ctx).await
    });

    match result {
        Ok(out) => match output {
            OutputFormat::Json => print_json(&out),
            OutputFormat::Text => {
                if !streams {
                    print!("{}", out.text);
                }
                if !quiet {
                    for failure in &out.failures {
                        eprintln!("warning: xargs '{}': {}", failure.item, failure.message);
                    }
                }
            }
        },
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

fn cmd_exec(call: &str, root: &Path, config: &ShireConfig, output: OutputFormat) {
    let source: Arc<dyn ItemSource> = Arc::new(config.source(root));
    let dispatcher = CommandDispatcher::new(source);
    let result = runtime().block_on(dispatcher.execute(call));
    let failed = is_diagnostic(&result);
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "result": result,
            "error": failed,
        })),
        OutputFormat::Text => println!("{}", result),
    }
    if failed {
        process::exit(1);
    }
}

fn cmd_actions(dir: &Path, location: Option<ActionLocation>, output: OutputFormat, quiet: bool) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("error: could not read '{}': {}", dir.display(), e);
            process::exit(1);
        }
    };
    let mut scripts: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|x| x == SCRIPT_EXTENSION))
        .collect();
    scripts.sort();

    let mut registry = ActionRegistry::new();
    let mut failed = 0usize;
    for script in &scripts {
        match compile(&read_script(script)) {
            Ok(doc) => {
                let key = script.display().to_string();
                tracing::debug!(script = %key, "action registered");
                registry.put_action(key.clone(), ShireAction::new(key, doc));
            }
            Err(e) => {
                failed += 1;
                tracing::debug!(script = %script.display(), error = %e, "script skipped");
                if !quiet {
                    eprintln!("warning: skipping {}: {}", script.display(), e);
                }
            }
        }
    }

    let listed: Vec<&ShireAction> = match location {
        Some(loc) => registry.actions_at(loc),
        None => registry
            .all_actions()
            .into_iter()
            .filter(|a| a.enabled())
            .collect(),
    };
    match output {
        OutputFormat::Json => {
            let summaries: Vec<_> = listed.iter().map(|a| a.summary()).collect();
            print_json(&summaries);
        }
        OutputFormat::Text => {
            for action in &listed {
                println!(
                    "{:<24} {:<14} {}",
                    action.name,
                    action.location().to_string(),
                    action.script_path
                );
            }
            if !quiet {
                eprintln!(
                    "{} action(s), {} script(s) skipped",
                    listed.len(),
                    failed
                );
            }
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_splits_on_first_equals() {
        assert_eq!(
            parse_var("selection=a=b").unwrap(),
            ("selection".to_string(), "a=b".to_string())
        );
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
