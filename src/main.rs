use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use verbena_config::GraphDef;
use verbena_engine::{Engine, LiteralOverrides, RunStatus};
use verbena_plan::compile;
use verbena_tasks_web::builtin_registry;

/// Verbena - a workflow automation engine for web tasks
#[derive(Parser)]
#[command(name = "verbena")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile a graph definition and print the execution plan
  Compile {
    /// Path to the graph definition file (JSON)
    workflow_file: PathBuf,
  },

  /// Compile a graph definition and run it
  Run {
    /// Path to the graph definition file (JSON)
    workflow_file: PathBuf,

    /// JSON file with literal overrides, shaped {"node": {"input": "value"}}.
    /// When omitted and stdin is piped, overrides are read from stdin.
    #[arg(long)]
    overrides: Option<PathBuf>,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
    )
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Compile { workflow_file } => compile_workflow(&workflow_file),
    Commands::Run {
      workflow_file,
      overrides,
    } => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_workflow(&workflow_file, overrides))
    }
  }
}

fn compile_workflow(workflow_file: &Path) -> Result<()> {
  let def = load_definition(workflow_file)?;
  let registry = builtin_registry();
  let plan = compile(&def, &registry)?;

  println!("{}", serde_json::to_string_pretty(&plan)?);
  Ok(())
}

async fn run_workflow(workflow_file: &Path, overrides: Option<PathBuf>) -> Result<()> {
  let def = load_definition(workflow_file)?;
  let registry = Arc::new(builtin_registry());
  let plan = compile(&def, &registry)?;
  let overrides = read_overrides(overrides)?;

  // Ctrl-C cancels cooperatively: in-flight nodes finish, the rest skip.
  let cancel = CancellationToken::new();
  let signal_cancel = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      eprintln!("cancelling run...");
      signal_cancel.cancel();
    }
  });

  let engine = Engine::new(registry);
  let result = engine.run(&plan, &overrides, cancel).await;

  println!("{}", serde_json::to_string_pretty(&result)?);

  if result.status == RunStatus::Failed {
    anyhow::bail!("run {} failed", result.run_id);
  }
  Ok(())
}

fn load_definition(path: &Path) -> Result<GraphDef> {
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read workflow file: {}", path.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse workflow file: {}", path.display()))
}

fn read_overrides(path: Option<PathBuf>) -> Result<LiteralOverrides> {
  match path {
    Some(path) => {
      let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read overrides file: {}", path.display()))?;
      serde_json::from_str(&content)
        .with_context(|| format!("failed to parse overrides file: {}", path.display()))
    }
    None if !io::stdin().is_terminal() => {
      let mut content = String::new();
      io::stdin().read_to_string(&mut content)?;
      if content.trim().is_empty() {
        Ok(LiteralOverrides::new())
      } else {
        serde_json::from_str(&content).context("failed to parse overrides from stdin")
      }
    }
    None => Ok(LiteralOverrides::new()),
  }
}
