use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use mediaflow_config::WorkflowDef;
use mediaflow_runtime::{DependencyPolicy, ProcessExecutor, Runtime, RuntimeConfig};
use mediaflow_workflow::Workflow;

/// Mediaflow - run media-processing node graphs
#[derive(Parser)]
#[command(name = "mediaflow")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.mediaflow)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Skip nodes whose upstream nodes failed instead of running them with partial input
  #[arg(long, global = true)]
  strict: bool,

  /// Default per-node timeout in milliseconds
  #[arg(long, global = true)]
  timeout_ms: Option<u64>,

  /// Maximum number of nodes executing at once
  #[arg(long, global = true)]
  max_concurrency: Option<usize>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Validate a workflow and print its execution batches
  Plan {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Run a workflow or a single node
  Run {
    #[command(subcommand)]
    target: RunTarget,
  },
}

#[derive(Subcommand)]
enum RunTarget {
  /// Run an entire workflow
  Workflow {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Run a single node with inputs read from stdin
  Node {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    /// The node ID to execute
    #[arg(long)]
    node: String,
  },
}

fn main() -> Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mediaflow=info,warn")),
    )
    .with_writer(io::stderr)
    .with_target(false)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir.clone() {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".mediaflow"),
  };

  let config = RuntimeConfig {
    dependency_policy: if cli.strict {
      DependencyPolicy::Strict
    } else {
      DependencyPolicy::Lenient
    },
    node_timeout: cli.timeout_ms.map(Duration::from_millis),
    max_concurrency: cli.max_concurrency,
    ..RuntimeConfig::default()
  };

  match cli.command {
    Some(Commands::Plan { workflow_file }) => plan(&workflow_file),
    Some(Commands::Run { target }) => {
      let rt = tokio::runtime::Runtime::new()?;
      match target {
        RunTarget::Workflow { workflow_file } => {
          rt.block_on(run_workflow(&workflow_file, &data_dir, config))
        }
        RunTarget::Node {
          workflow_file,
          node,
        } => rt.block_on(run_node(&workflow_file, &node, &data_dir, config)),
      }
    }
    None => {
      println!("mediaflow - use --help to see available commands");
      Ok(ExitCode::SUCCESS)
    }
  }
}

fn load_workflow(workflow_file: &Path) -> Result<Workflow> {
  let content = std::fs::read_to_string(workflow_file)
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;

  let def: WorkflowDef = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))?;

  Workflow::from_def(def)
    .with_context(|| format!("invalid workflow: {}", workflow_file.display()))
}

fn plan(workflow_file: &Path) -> Result<ExitCode> {
  let workflow = load_workflow(workflow_file)?;
  let plan = workflow.plan().context("failed to plan workflow")?;

  eprintln!(
    "Workflow {} has {} nodes in {} batches",
    workflow.workflow_id,
    workflow.nodes().len(),
    plan.len()
  );
  println!("{}", serde_json::to_string_pretty(plan.batches())?);

  Ok(ExitCode::SUCCESS)
}

/// Cancellation token that fires on Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
  let cancel = CancellationToken::new();
  let trigger = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupted, cancelling run");
      trigger.cancel();
    }
  });
  cancel
}

async fn run_workflow(workflow_file: &Path, data_dir: &Path, config: RuntimeConfig) -> Result<ExitCode> {
  let workflow = load_workflow(workflow_file)?;
  eprintln!(
    "Loaded workflow: {}",
    workflow.name.as_deref().unwrap_or(&workflow.workflow_id)
  );

  let runtime = Runtime::new(ProcessExecutor::new(data_dir.join("handlers")), config);
  let result = runtime
    .execute(&workflow, cancel_on_ctrl_c())
    .await
    .context("workflow execution failed")?;

  eprintln!("Execution completed: {}", result.execution_id);
  let failed = result.failed_nodes();
  if !failed.is_empty() {
    eprintln!("Failed nodes: {}", failed.join(", "));
  }

  println!("{}", serde_json::to_string_pretty(&result.results)?);

  Ok(if failed.is_empty() {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}

async fn run_node(
  workflow_file: &Path,
  node_id: &str,
  data_dir: &Path,
  config: RuntimeConfig,
) -> Result<ExitCode> {
  let workflow = load_workflow(workflow_file)?;
  let payloads = read_payloads_from_stdin()?;

  eprintln!("Running node: {} ({} inputs)", node_id, payloads.len());

  let runtime = Runtime::new(ProcessExecutor::new(data_dir.join("handlers")), config);
  let outcome = runtime
    .execute_node(&workflow, node_id, payloads, cancel_on_ctrl_c())
    .await
    .context("node execution failed")?;

  println!("{}", serde_json::to_string_pretty(&outcome)?);

  Ok(if outcome.is_success() {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}

/// Read node inputs from stdin.
///
/// A JSON array is taken as the input list, any other value as a single
/// input. Nothing on stdin means no inputs.
fn read_payloads_from_stdin() -> Result<Vec<serde_json::Value>> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(Vec::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read inputs from stdin")?;

  if input.trim().is_empty() {
    return Ok(Vec::new());
  }

  let value: serde_json::Value =
    serde_json::from_str(&input).context("failed to parse input JSON from stdin")?;
  Ok(match value {
    serde_json::Value::Array(items) => items,
    other => vec![other],
  })
}
