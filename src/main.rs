use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sequin_engine::{ExecutionState, ExecutorConfig, WorkflowExecutor};
use sequin_workflow::{BlockKind, MemoryWorkflowStore, Workflow};

/// Sequin - run step-by-step workflows with loops, branches and sub-workflows
#[derive(Parser)]
#[command(name = "sequin")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.sequin)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow file; the trigger payload is read from stdin
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    /// Directory of workflow files available to sub-workflow calls
    /// (default: <data-dir>/workflows)
    #[arg(long)]
    workflows_dir: Option<PathBuf>,

    /// Directory for per-execution work directories
    #[arg(long, env = "SEQUIN_WORK_DIR")]
    work_dir: Option<PathBuf>,
  },

  /// List the built-in step types
  Steps,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".sequin"),
  };

  match cli.command {
    Some(Commands::Run {
      workflow_file,
      workflows_dir,
      work_dir,
    }) => {
      let workflows_dir = workflows_dir.unwrap_or_else(|| data_dir.join("workflows"));
      let work_dir = work_dir.unwrap_or_else(|| data_dir.join("work"));
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_workflow(workflow_file, workflows_dir, work_dir))?;
    }
    Some(Commands::Steps) => list_steps(),
    None => {
      println!("sequin - use --help to see available commands");
    }
  }

  Ok(())
}

async fn run_workflow(workflow_file: PathBuf, workflows_dir: PathBuf, work_dir: PathBuf) -> Result<()> {
  let workflow = load_workflow(&workflow_file).await?;
  eprintln!("Loaded workflow: {} ({} steps)", workflow.name, workflow.len());

  let store = Arc::new(load_workflow_dir(&workflows_dir).await?);
  store.insert(workflow.clone());

  let payload = read_payload_from_stdin()?;
  eprintln!("Payload: {payload}");

  let config = ExecutorConfig {
    work_root: work_dir,
    ..ExecutorConfig::default()
  };
  let executor = WorkflowExecutor::new(Arc::new(sequin_steps::builtin_registry()), store, config);

  let workflow_id = workflow.workflow_id.clone();
  let mut states = executor.subscribe_to(&workflow_id);
  executor.execute(workflow, payload);

  let terminal = loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => {
        eprintln!("Interrupted, stopping {workflow_id}");
        executor.stop(&workflow_id);
      }
      state = states.recv() => match state {
        Some(ExecutionState::Running { pc, .. }) => eprintln!("Running step {pc}"),
        Some(state) => break state,
        None => bail!("state bus closed before {workflow_id} finished"),
      },
    }
  };

  match terminal {
    ExecutionState::Finished { log, .. } => {
      println!("{log}");
      eprintln!("Execution finished");
      Ok(())
    }
    ExecutionState::Cancelled { log, .. } => {
      println!("{log}");
      bail!("execution cancelled")
    }
    ExecutionState::Failure { pc, log, .. } => {
      println!("{log}");
      bail!("execution failed at step {pc}")
    }
    ExecutionState::Running { .. } => bail!("execution ended without a terminal state"),
  }
}

async fn load_workflow(path: &Path) -> Result<Workflow> {
  let content = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read workflow file: {}", path.display()))?;

  Workflow::from_json(&content)
    .with_context(|| format!("failed to parse workflow file: {}", path.display()))
}

async fn load_workflow_dir(dir: &Path) -> Result<MemoryWorkflowStore> {
  let store = MemoryWorkflowStore::new();
  if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
    return Ok(store);
  }

  let mut entries = tokio::fs::read_dir(dir)
    .await
    .with_context(|| format!("failed to read workflows directory: {}", dir.display()))?;
  while let Some(entry) = entries.next_entry().await? {
    let path = entry.path();
    if path.extension().is_some_and(|ext| ext == "json") {
      store.insert(load_workflow(&path).await?);
    }
  }

  eprintln!("Loaded {} workflows from {}", store.len(), dir.display());
  Ok(store)
}

fn list_steps() {
  let registry = sequin_steps::builtin_registry();
  for type_id in registry.type_ids() {
    let behavior = registry.behavior(type_id);
    let role = match behavior.kind {
      BlockKind::None => String::new(),
      kind => format!(
        " [{:?} {}]",
        kind,
        behavior.pairing_id.as_deref().unwrap_or_default()
      ),
    };
    println!("{type_id}{role}");
  }
}

fn read_payload_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, use empty object
    Ok(serde_json::json!({}))
  } else {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read payload from stdin")?;

    if input.trim().is_empty() {
      Ok(serde_json::json!({}))
    } else {
      serde_json::from_str(&input).context("failed to parse payload JSON from stdin")
    }
  }
}
