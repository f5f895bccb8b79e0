//! Execution result types.

use std::collections::BTreeMap;
use std::fmt;

use mediaflow_workflow::ExecutionPlan;
use serde::{Deserialize, Serialize};

use crate::error::NodeError;

/// Why a node has no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  /// The executor ran the node and it failed.
  Execution,
  /// No executor handles the node type.
  UnsupportedNodeType,
  /// The executor rejected the node's config.
  InvalidConfig,
  /// The node did not finish within its time budget.
  Timeout,
  /// The executor panicked.
  Panicked,
  /// Strict dependency policy: an upstream node failed, so this one never ran.
  DependencyFailed,
  /// The run was cancelled before the node finished.
  Cancelled,
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::Execution => "execution",
      Self::UnsupportedNodeType => "unsupported_node_type",
      Self::InvalidConfig => "invalid_config",
      Self::Timeout => "timeout",
      Self::Panicked => "panicked",
      Self::DependencyFailed => "dependency_failed",
      Self::Cancelled => "cancelled",
    };
    f.write_str(s)
  }
}

/// A recorded node failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFailure {
  pub kind: ErrorKind,
  pub message: String,
}

impl NodeFailure {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
    }
  }
}

impl fmt::Display for NodeFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.kind, self.message)
  }
}

impl From<NodeError> for NodeFailure {
  fn from(err: NodeError) -> Self {
    Self::new(err.kind(), err.to_string())
  }
}

/// Outcome of one node in a run.
///
/// Serializes as `{"success": true, "output": ...}` or
/// `{"success": false, "error": {"kind": ..., "message": ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "OutcomeRepr", try_from = "OutcomeRepr")]
pub enum NodeOutcome {
  Success { output: serde_json::Value },
  Failure(NodeFailure),
}

impl NodeOutcome {
  pub fn success(output: serde_json::Value) -> Self {
    Self::Success { output }
  }

  pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self::Failure(NodeFailure::new(kind, message))
  }

  pub fn is_success(&self) -> bool {
    matches!(self, Self::Success { .. })
  }

  pub fn output(&self) -> Option<&serde_json::Value> {
    match self {
      Self::Success { output } => Some(output),
      Self::Failure(_) => None,
    }
  }

  pub fn error(&self) -> Option<&NodeFailure> {
    match self {
      Self::Success { .. } => None,
      Self::Failure(failure) => Some(failure),
    }
  }
}

impl From<Result<serde_json::Value, NodeError>> for NodeOutcome {
  fn from(result: Result<serde_json::Value, NodeError>) -> Self {
    match result {
      Ok(output) => Self::Success { output },
      Err(e) => Self::Failure(e.into()),
    }
  }
}

#[derive(Serialize, Deserialize)]
struct OutcomeRepr {
  success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  output: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  error: Option<NodeFailure>,
}

impl From<NodeOutcome> for OutcomeRepr {
  fn from(outcome: NodeOutcome) -> Self {
    match outcome {
      NodeOutcome::Success { output } => Self {
        success: true,
        output: Some(output),
        error: None,
      },
      NodeOutcome::Failure(failure) => Self {
        success: false,
        output: None,
        error: Some(failure),
      },
    }
  }
}

impl TryFrom<OutcomeRepr> for NodeOutcome {
  type Error = String;

  fn try_from(repr: OutcomeRepr) -> Result<Self, Self::Error> {
    match (repr.success, repr.error) {
      (true, _) => Ok(Self::Success {
        output: repr.output.unwrap_or(serde_json::Value::Null),
      }),
      (false, Some(failure)) => Ok(Self::Failure(failure)),
      (false, None) => Err("failed outcome is missing its error".to_string()),
    }
  }
}

/// Outcomes keyed by node ID.
pub type Results = BTreeMap<String, NodeOutcome>;

/// Result of a complete workflow run.
///
/// Holds exactly one outcome per node of the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
  /// Unique execution ID.
  pub execution_id: String,
  pub workflow_id: String,
  /// The batches the run walked.
  pub plan: ExecutionPlan,
  pub results: Results,
}

impl RunResult {
  pub fn get(&self, node_id: &str) -> Option<&NodeOutcome> {
    self.results.get(node_id)
  }

  /// Output of a node that succeeded.
  pub fn output(&self, node_id: &str) -> Option<&serde_json::Value> {
    self.get(node_id).and_then(NodeOutcome::output)
  }

  /// Failure of a node that failed.
  pub fn failure(&self, node_id: &str) -> Option<&NodeFailure> {
    self.get(node_id).and_then(NodeOutcome::error)
  }

  /// Node IDs that failed, sorted.
  pub fn failed_nodes(&self) -> Vec<&str> {
    self
      .results
      .iter()
      .filter(|(_, outcome)| !outcome.is_success())
      .map(|(id, _)| id.as_str())
      .collect()
  }

  pub fn all_succeeded(&self) -> bool {
    self.results.values().all(NodeOutcome::is_success)
  }
}
