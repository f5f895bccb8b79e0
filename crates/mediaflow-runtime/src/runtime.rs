//! Workflow runtime.
//!
//! [`Runtime`] executes validated workflows batch by batch. A batch with one
//! node runs inline; a larger batch spawns one task per node and waits for
//! all of them before the next batch starts. Whatever happens inside a node
//! (an error, a panic, a timeout, cancellation) is recorded against that node
//! and the run carries on.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use mediaflow_config::WorkflowDef;
use mediaflow_workflow::{ExecutionPlan, Node, Workflow};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::RuntimeError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::executor::NodeExecutor;
use crate::input::{DependencyPolicy, NodeInput, Resolution, resolve_inputs};
use crate::result::{ErrorKind, NodeFailure, NodeOutcome, Results, RunResult};
use crate::store::ResultStore;

/// Configuration for the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
  /// How nodes with failed upstreams are treated.
  pub dependency_policy: DependencyPolicy,
  /// Default time budget per node. Workflow and node `timeout_ms` override it.
  pub node_timeout: Option<Duration>,
  /// Maximum number of nodes executing at once. `None` or `0` is unbounded.
  pub max_concurrency: Option<usize>,
  /// Config key a node without incoming connections reads its input from.
  pub static_input_key: String,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      dependency_policy: DependencyPolicy::Lenient,
      node_timeout: None,
      max_concurrency: None,
      static_input_key: "input".to_string(),
    }
  }
}

/// Lifecycle of a [`WorkflowRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
  /// Validated and planned; nothing has executed.
  Planned,
  /// Walking the batches.
  Running,
  /// Every node has a recorded outcome.
  Completed,
}

/// The workflow runtime.
///
/// Owns the node executor and the notifier; a single runtime can execute
/// any number of workflows, concurrently or one after another.
pub struct Runtime<E, N = NoopNotifier> {
  executor: Arc<E>,
  notifier: Arc<N>,
  config: RuntimeConfig,
}

impl<E: NodeExecutor> Runtime<E> {
  pub fn new(executor: E, config: RuntimeConfig) -> Self {
    Self {
      executor: Arc::new(executor),
      notifier: Arc::new(NoopNotifier),
      config,
    }
  }
}

impl<E: NodeExecutor, N: ExecutionNotifier> Runtime<E, N> {
  /// Replace the notifier that receives execution events.
  pub fn with_notifier<M: ExecutionNotifier>(self, notifier: M) -> Runtime<E, M> {
    Runtime {
      executor: self.executor,
      notifier: Arc::new(notifier),
      config: self.config,
    }
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  pub fn executor(&self) -> &E {
    &self.executor
  }

  /// Plan a run without executing anything.
  ///
  /// Fails if the graph cannot be planned; no node has run at that point.
  pub fn prepare<'a>(&'a self, workflow: &'a Workflow) -> Result<WorkflowRun<'a, E, N>, RuntimeError> {
    let plan = workflow.plan()?;
    let execution_id = uuid::Uuid::new_v4().to_string();

    Ok(WorkflowRun {
      runtime: self,
      workflow,
      execution_id,
      plan,
      state: RunState::Planned,
    })
  }

  /// Execute a workflow to completion.
  ///
  /// Returns an error only when the workflow is refused before any node
  /// runs. Node failures are part of the returned [`RunResult`].
  #[instrument(
    name = "runtime_execute",
    skip(self, workflow, cancel),
    fields(workflow_id = %workflow.workflow_id)
  )]
  pub async fn execute(
    &self,
    workflow: &Workflow,
    cancel: CancellationToken,
  ) -> Result<RunResult, RuntimeError> {
    let run = self.prepare(workflow).inspect_err(|e| {
      error!(workflow_id = %workflow.workflow_id, error = %e, "workflow_rejected");
    })?;
    Ok(run.run(cancel).await)
  }

  /// Validate a workflow definition and execute it.
  pub async fn execute_workflow(
    &self,
    def: WorkflowDef,
    cancel: CancellationToken,
  ) -> Result<RunResult, RuntimeError> {
    let workflow = Workflow::from_def(def).inspect_err(|e| {
      error!(error = %e, "workflow_rejected");
    })?;
    self.execute(&workflow, cancel).await
  }

  /// Execute a single node in isolation.
  ///
  /// For debugging: the node runs with `payloads` as its input list instead
  /// of upstream outputs, and nothing else in the workflow executes. An empty
  /// payload list falls back to the node's static input like a root node.
  #[instrument(
    name = "runtime_execute_node",
    skip(self, workflow, payloads, cancel),
    fields(workflow_id = %workflow.workflow_id, node_id = %node_id)
  )]
  pub async fn execute_node(
    &self,
    workflow: &Workflow,
    node_id: &str,
    payloads: Vec<serde_json::Value>,
    cancel: CancellationToken,
  ) -> Result<NodeOutcome, RuntimeError> {
    let node = workflow
      .get_node(node_id)
      .ok_or_else(|| RuntimeError::NodeNotFound {
        node_id: node_id.to_string(),
      })?;

    let mut inputs: Vec<NodeInput> = payloads.into_iter().map(NodeInput::direct).collect();
    if inputs.is_empty() {
      if let Some(value) = node.config.get(&self.config.static_input_key) {
        inputs.push(NodeInput::direct(value.clone()));
      }
    }

    let ctx = self.unit_context(uuid::Uuid::new_v4().to_string(), ResultStore::new(), cancel);
    let unit = Unit {
      node: node.clone(),
      inputs,
      timeout: self.node_timeout(workflow, node_id),
    };

    info!(execution_id = %ctx.execution_id, node_id = %node_id, "execute_node_started");
    let outcome = run_unit(&ctx, &unit).await;
    ctx.commit(node_id, outcome.clone());

    Ok(outcome)
  }

  fn node_timeout(&self, workflow: &Workflow, node_id: &str) -> Option<Duration> {
    node_timeout(&self.config, workflow, node_id)
  }

  fn unit_context(
    &self,
    execution_id: String,
    store: ResultStore,
    cancel: CancellationToken,
  ) -> UnitContext<E, N> {
    let semaphore = self
      .config
      .max_concurrency
      .filter(|limit| *limit > 0)
      .map(|limit| Arc::new(Semaphore::new(limit)));

    UnitContext {
      executor: self.executor.clone(),
      notifier: self.notifier.clone(),
      store,
      execution_id: execution_id.into(),
      semaphore,
      cancel,
    }
  }
}

/// A planned execution of one workflow.
///
/// Created by [`Runtime::prepare`]; [`run`](Self::run) walks the batches.
pub struct WorkflowRun<'a, E, N> {
  runtime: &'a Runtime<E, N>,
  workflow: &'a Workflow,
  execution_id: String,
  plan: ExecutionPlan,
  state: RunState,
}

impl<E: NodeExecutor, N: ExecutionNotifier> WorkflowRun<'_, E, N> {
  pub fn execution_id(&self) -> &str {
    &self.execution_id
  }

  pub fn plan(&self) -> &ExecutionPlan {
    &self.plan
  }

  pub fn state(&self) -> RunState {
    self.state
  }

  /// Execute every batch and return the results.
  ///
  /// Always completes with exactly one outcome per node. Once `cancel`
  /// fires, running nodes are dropped and every node without an outcome is
  /// recorded as cancelled.
  #[instrument(
    name = "workflow_run",
    skip(self, cancel),
    fields(execution_id = %self.execution_id, workflow_id = %self.workflow.workflow_id)
  )]
  pub async fn run(mut self, cancel: CancellationToken) -> RunResult {
    let runtime = self.runtime;
    let workflow = self.workflow;
    let store = ResultStore::new();
    let ctx = runtime.unit_context(self.execution_id.clone(), store.clone(), cancel.clone());

    self.state = RunState::Running;
    info!(
      execution_id = %self.execution_id,
      workflow_id = %workflow.workflow_id,
      batches = self.plan.len(),
      nodes = workflow.nodes().len(),
      "workflow_started"
    );
    runtime.notifier.notify(ExecutionEvent::WorkflowStarted {
      execution_id: self.execution_id.clone(),
      workflow_id: workflow.workflow_id.clone(),
      batches: self.plan.len(),
    });

    for (batch_index, batch) in self.plan.batches().iter().enumerate() {
      if cancel.is_cancelled() {
        warn!(execution_id = %self.execution_id, batch = batch_index, "workflow cancelled");
        for node_id in self.plan.batches()[batch_index..].iter().flatten() {
          if !store.contains(node_id) {
            ctx.commit(
              node_id,
              NodeOutcome::failure(ErrorKind::Cancelled, "run cancelled before node started"),
            );
          }
        }
        break;
      }

      info!(
        execution_id = %self.execution_id,
        batch = batch_index,
        node_ids = ?batch,
        "batch_started"
      );
      runtime.notifier.notify(ExecutionEvent::BatchStarted {
        execution_id: self.execution_id.clone(),
        batch: batch_index,
        node_ids: batch.clone(),
      });

      // Every unit of the batch resolves against the same snapshot.
      let (mut units, blocked) =
        partition_batch(&runtime.config, workflow, batch, &store.snapshot());
      for (node_id, failure) in blocked {
        ctx.commit(&node_id, NodeOutcome::Failure(failure));
      }

      if units.len() == 1 {
        if let Some(unit) = units.pop() {
          execute_unit(ctx.clone(), unit).await;
        }
      } else if !units.is_empty() {
        let node_ids: Vec<String> = units.iter().map(|u| u.node.node_id.clone()).collect();
        let handles: Vec<_> = units
          .into_iter()
          .map(|unit| tokio::spawn(execute_unit(ctx.clone(), unit)))
          .collect();

        let joined = futures::future::join_all(handles).await;
        for (node_id, result) in node_ids.iter().zip(joined) {
          if let Err(e) = result {
            if !store.contains(node_id) {
              ctx.commit(
                node_id,
                NodeOutcome::failure(ErrorKind::Panicked, format!("task join error: {e}")),
              );
            }
          }
        }
      }

      runtime.notifier.notify(ExecutionEvent::BatchCompleted {
        execution_id: self.execution_id.clone(),
        batch: batch_index,
      });
    }

    let results = store.snapshot();
    let failed = results.values().filter(|o| !o.is_success()).count();
    let succeeded = results.len() - failed;

    self.state = RunState::Completed;
    info!(
      execution_id = %self.execution_id,
      succeeded,
      failed,
      "workflow_completed"
    );
    runtime.notifier.notify(ExecutionEvent::WorkflowCompleted {
      execution_id: self.execution_id.clone(),
      succeeded,
      failed,
    });

    RunResult {
      execution_id: self.execution_id,
      workflow_id: workflow.workflow_id.clone(),
      plan: self.plan,
      results,
    }
  }
}

fn node_timeout(config: &RuntimeConfig, workflow: &Workflow, node_id: &str) -> Option<Duration> {
  workflow
    .node_timeout_ms(node_id)
    .map(Duration::from_millis)
    .or(config.node_timeout)
}

/// Split a batch into units to execute and failures to record without running.
///
/// A planned node that can't be found in the workflow is recorded as failed
/// rather than dropped, so the run still ends with one outcome per node.
fn partition_batch(
  config: &RuntimeConfig,
  workflow: &Workflow,
  batch: &[String],
  snapshot: &Results,
) -> (Vec<Unit>, Vec<(String, NodeFailure)>) {
  let mut units = Vec::with_capacity(batch.len());
  let mut blocked = Vec::new();

  for node_id in batch {
    let Some(node) = workflow.get_node(node_id) else {
      error!(node_id = %node_id, "planned node missing from workflow");
      blocked.push((
        node_id.clone(),
        NodeFailure::new(ErrorKind::Execution, "node missing from workflow"),
      ));
      continue;
    };

    match resolve_inputs(
      workflow,
      node,
      snapshot,
      config.dependency_policy,
      &config.static_input_key,
    ) {
      Resolution::Ready(inputs) => units.push(Unit {
        node: node.clone(),
        inputs,
        timeout: node_timeout(config, workflow, node_id),
      }),
      Resolution::Blocked(failure) => blocked.push((node_id.clone(), failure)),
    }
  }

  (units, blocked)
}

/// One node ready to execute.
struct Unit {
  node: Node,
  inputs: Vec<NodeInput>,
  timeout: Option<Duration>,
}

/// Everything a spawned unit needs, owned so the task is `'static`.
struct UnitContext<E, N> {
  executor: Arc<E>,
  notifier: Arc<N>,
  store: ResultStore,
  execution_id: Arc<str>,
  semaphore: Option<Arc<Semaphore>>,
  cancel: CancellationToken,
}

impl<E, N> Clone for UnitContext<E, N> {
  fn clone(&self) -> Self {
    Self {
      executor: self.executor.clone(),
      notifier: self.notifier.clone(),
      store: self.store.clone(),
      execution_id: self.execution_id.clone(),
      semaphore: self.semaphore.clone(),
      cancel: self.cancel.clone(),
    }
  }
}

impl<E: NodeExecutor, N: ExecutionNotifier> UnitContext<E, N> {
  /// Record an outcome, then log and announce it.
  fn commit(&self, node_id: &str, outcome: NodeOutcome) {
    let event = match &outcome {
      NodeOutcome::Success { output } => {
        info!(execution_id = %self.execution_id, node_id = %node_id, "task_completed");
        ExecutionEvent::NodeCompleted {
          execution_id: self.execution_id.to_string(),
          node_id: node_id.to_string(),
          output: output.clone(),
        }
      }
      NodeOutcome::Failure(failure) => {
        error!(
          execution_id = %self.execution_id,
          node_id = %node_id,
          error_kind = %failure.kind,
          error = %failure.message,
          "task_failed"
        );
        ExecutionEvent::NodeFailed {
          execution_id: self.execution_id.to_string(),
          node_id: node_id.to_string(),
          error: failure.clone(),
        }
      }
    };

    if let Err(e) = self.store.record(node_id, outcome) {
      error!(execution_id = %self.execution_id, error = %e, "result_rejected");
      return;
    }
    self.notifier.notify(event);
  }
}

/// Run one unit and record its outcome.
async fn execute_unit<E: NodeExecutor, N: ExecutionNotifier>(ctx: UnitContext<E, N>, unit: Unit) {
  let outcome = run_unit(&ctx, &unit).await;
  ctx.commit(&unit.node.node_id, outcome);
}

/// Run one unit, racing it against cancellation.
async fn run_unit<E: NodeExecutor, N: ExecutionNotifier>(
  ctx: &UnitContext<E, N>,
  unit: &Unit,
) -> NodeOutcome {
  tokio::select! {
    biased;
    _ = ctx.cancel.cancelled() => {
      NodeOutcome::failure(ErrorKind::Cancelled, "run cancelled while node was running")
    }
    outcome = invoke(ctx, unit) => outcome,
  }
}

async fn invoke<E: NodeExecutor, N: ExecutionNotifier>(
  ctx: &UnitContext<E, N>,
  unit: &Unit,
) -> NodeOutcome {
  let _permit = match &ctx.semaphore {
    Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
    None => None,
  };

  let node_id = &unit.node.node_id;
  info!(
    execution_id = %ctx.execution_id,
    node_id = %node_id,
    node_type = %unit.node.node_type,
    inputs = unit.inputs.len(),
    "task_started"
  );
  ctx.notifier.notify(ExecutionEvent::NodeStarted {
    execution_id: ctx.execution_id.to_string(),
    node_id: node_id.clone(),
  });

  // The future is built on first poll so a panic inside `execute` itself is
  // caught along with panics raised while polling.
  let work = AssertUnwindSafe(
    futures::future::lazy(|_| ctx.executor.execute(&unit.node, &unit.inputs)).flatten(),
  )
  .catch_unwind();
  let finished = match unit.timeout {
    Some(limit) => tokio::time::timeout(limit, work).await.ok(),
    None => Some(work.await),
  };

  match finished {
    Some(Ok(result)) => NodeOutcome::from(result),
    Some(Err(panic)) => {
      let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "executor panicked".to_string());
      NodeOutcome::failure(ErrorKind::Panicked, message)
    }
    None => NodeOutcome::failure(
      ErrorKind::Timeout,
      format!(
        "node did not finish within {}ms",
        unit.timeout.map(|t| t.as_millis()).unwrap_or_default()
      ),
    ),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use mediaflow_workflow::Connection;

  #[test]
  fn test_partition_batch_records_unknown_nodes() {
    let workflow = Workflow::new(
      "wf",
      vec![Node::new("a", "transcription").with_timeout_ms(250)],
      vec![],
    )
    .unwrap();
    let batch = vec!["a".to_string(), "ghost".to_string()];

    let (units, blocked) =
      partition_batch(&RuntimeConfig::default(), &workflow, &batch, &Results::new());

    assert_eq!(units.len(), 1);
    assert_eq!(units[0].node.node_id, "a");
    assert_eq!(units[0].timeout, Some(Duration::from_millis(250)));
    assert_eq!(
      blocked,
      vec![(
        "ghost".to_string(),
        NodeFailure::new(ErrorKind::Execution, "node missing from workflow")
      )]
    );
  }

  #[test]
  fn test_partition_batch_blocks_under_strict_policy() {
    let workflow = Workflow::new(
      "wf",
      vec![Node::new("a", "transcription"), Node::new("b", "captions")],
      vec![Connection::new("a", "b")],
    )
    .unwrap();
    let config = RuntimeConfig {
      dependency_policy: DependencyPolicy::Strict,
      node_timeout: Some(Duration::from_secs(1)),
      ..RuntimeConfig::default()
    };
    let snapshot = Results::from([(
      "a".to_string(),
      NodeOutcome::failure(ErrorKind::Execution, "no audio"),
    )]);

    let (units, blocked) = partition_batch(&config, &workflow, &["b".to_string()], &snapshot);
    assert!(units.is_empty());
    assert_eq!(blocked[0].1.kind, ErrorKind::DependencyFailed);

    let (units, blocked) =
      partition_batch(&RuntimeConfig::default(), &workflow, &["b".to_string()], &snapshot);
    assert!(blocked.is_empty());
    assert!(units[0].inputs.is_empty());
    assert_eq!(units[0].timeout, None);
  }
}
