//! calcol CLI - evaluate and check custom-column formulas

mod workspace;

use anyhow::{bail, Context, Result};
use calcol::{
    function_registry, parse_datetime, CalculationOptions, CalculationStats, Engine, RowContext,
};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value as Json};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use workspace::{row_from_json, value_to_json, Workspace};

#[derive(Parser)]
#[command(name = "calcol")]
#[command(
    author,
    version,
    about = "Custom-column formula evaluator and checker"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a formula against a single row
    Eval {
        /// Formula text, e.g. 'field("Budget") - field("Spent")'
        formula: String,

        /// Row fields as a JSON object
        #[arg(short, long, default_value = "{}")]
        row: String,

        /// Workspace whose calculated columns the formula may reference
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Pin the clock (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        now: Option<String>,
    },

    /// Validate a workspace's columns and print the evaluation order
    Check {
        /// Workspace file (JSON)
        workspace: PathBuf,
    },

    /// Recompute the calculated columns of every row in a workspace
    Recompute {
        /// Workspace file (JSON)
        workspace: PathBuf,

        /// Fields that changed (default: evaluate every calculated column)
        #[arg(short, long = "changed")]
        changed: Vec<String>,

        /// Also refresh columns that read NOW() or TODAY()
        #[arg(long)]
        volatile: bool,

        /// Worker threads for bulk recalculation (default: rayon's choice)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Pin the clock (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        now: Option<String>,
    },

    /// List the built-in functions
    Functions,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Eval {
            formula,
            row,
            workspace,
            now,
        } => eval(&formula, &row, workspace.as_deref(), now.as_deref()),
        Commands::Check { workspace } => check(&workspace),
        Commands::Recompute {
            workspace,
            changed,
            volatile,
            threads,
            now,
        } => recompute(&workspace, &changed, volatile, threads, now.as_deref()),
        Commands::Functions => list_functions(),
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default: warnings)
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .init();
}

fn options(now: Option<&str>, include_volatile: bool) -> Result<CalculationOptions> {
    let mut options = CalculationOptions::new().with_volatile(include_volatile);
    if let Some(text) = now {
        let now = parse_datetime(text).with_context(|| format!("Invalid --now '{}'", text))?;
        options = options.at(now);
    }
    Ok(options)
}

/// Register a workspace's columns, failing on the first rejected one
fn load_engine(path: &Path) -> Result<(Workspace, Engine)> {
    let workspace = Workspace::load(path)?;
    let (registry, failures) = workspace.register();
    if let Some((column, error)) = failures.into_iter().next() {
        return Err(error).with_context(|| format!("Column '{}' was rejected", column));
    }
    info!(columns = registry.len(), path = %path.display(), "loaded workspace");
    Ok((workspace, Engine::with_registry(registry)))
}

fn eval(formula: &str, row: &str, workspace: Option<&Path>, now: Option<&str>) -> Result<()> {
    let engine = match workspace {
        Some(path) => load_engine(path)?.1,
        None => Engine::new(),
    };
    let engine = engine.with_options(options(now, false)?);

    let fields: Map<String, Json> =
        serde_json::from_str(row).context("--row must be a JSON object")?;
    let row = row_from_json(&fields)?;

    let value = engine
        .preview_evaluate(formula, &row)
        .with_context(|| format!("Invalid formula '{}'", formula))?;
    debug!(value = %value, "evaluated formula");

    if value.is_error() {
        eprintln!("{}", value);
    }
    print_json(&value_to_json(&value))
}

fn check(path: &Path) -> Result<()> {
    let workspace = Workspace::load(path)?;
    let (registry, failures) = workspace.register();

    for (column, error) in &failures {
        eprintln!("error: {}: {}", column, error);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for name in registry.full_evaluation_order() {
        let Some(column) = registry.column(&name) else {
            continue;
        };
        let formula = column
            .formula()
            .map(|ast| ast.to_string())
            .unwrap_or_default();
        let volatile = if column.is_volatile() { " (volatile)" } else { "" };
        writeln!(
            out,
            "{}: {} = {}{}",
            column.name(),
            column.declared_type().as_str(),
            formula,
            volatile
        )?;
    }

    if !failures.is_empty() {
        bail!("{} of {} columns rejected", failures.len(), workspace.columns.len());
    }
    Ok(())
}

fn recompute(
    path: &Path,
    changed: &[String],
    include_volatile: bool,
    threads: Option<usize>,
    now: Option<&str>,
) -> Result<()> {
    let (workspace, engine) = load_engine(path)?;
    let rows: Vec<RowContext> = workspace.row_contexts()?;

    let mut engine = engine.with_options(options(now, include_volatile)?);
    if let Some(threads) = threads {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("Failed to build thread pool")?;
        engine = engine.with_thread_pool(Arc::new(pool));
    }

    let outcomes = if changed.is_empty() {
        engine.recompute_all_rows(&rows)
    } else {
        engine.recompute_rows(&rows, changed)
    };

    let mut total = CalculationStats::default();
    let results: Vec<Json> = outcomes
        .iter()
        .enumerate()
        .map(|(index, outcome)| {
            total.merge(&outcome.stats);
            let mut changed: Vec<_> = outcome.changed.iter().collect();
            changed.sort_by(|a, b| a.0.cmp(b.0));
            let changed: Map<String, Json> = changed
                .into_iter()
                .map(|(column, value)| (column.clone(), value_to_json(value)))
                .collect();
            json!({ "row": index, "changed": changed })
        })
        .collect();

    eprintln!(
        "{} rows: {} columns evaluated, {} changed, {} errors",
        rows.len(),
        total.columns_evaluated,
        total.columns_changed,
        total.errors
    );
    print_json(&Json::Array(results))
}

fn list_functions() -> Result<()> {
    let functions = function_registry();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for name in functions.names() {
        let Some(def) = functions.get(name) else {
            continue;
        };
        let arity = match def.max_args {
            Some(max) if max == def.min_args => format!("{}", max),
            Some(max) => format!("{}..{}", def.min_args, max),
            None => format!("{}..", def.min_args),
        };
        let volatile = if def.volatile { " (volatile)" } else { "" };
        writeln!(out, "{:<10} {}{}", name, arity, volatile)?;
    }
    Ok(())
}

fn print_json(value: &Json) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_recompute() {
        let cli = Cli::try_parse_from([
            "calcol",
            "recompute",
            "ws.json",
            "--changed",
            "Spent",
            "-c",
            "Budget",
            "--threads",
            "2",
        ])
        .unwrap();

        match cli.command {
            Commands::Recompute {
                changed, threads, ..
            } => {
                assert_eq!(changed, vec!["Spent", "Budget"]);
                assert_eq!(threads, Some(2));
            }
            _ => panic!("expected recompute"),
        }
    }

    #[test]
    fn test_options_pin_the_clock() {
        let options = options(Some("2024-05-01"), true).unwrap();
        assert!(options.include_volatile);
        assert_eq!(options.now, Some(parse_datetime("2024-05-01").unwrap()));
        assert!(super::options(Some("yesterday"), false).is_err());
    }
}
