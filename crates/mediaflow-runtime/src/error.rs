//! Runtime error types.

use mediaflow_workflow::WorkflowError;
use thiserror::Error;

use crate::result::ErrorKind;

/// Errors that refuse a run before any node executes.
#[derive(Debug, Error)]
pub enum RuntimeError {
  /// The workflow failed structural validation or planning.
  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  /// Node not found in workflow.
  #[error("node '{node_id}' not found in workflow")]
  NodeNotFound { node_id: String },
}

/// Error returned by a [`NodeExecutor`](crate::NodeExecutor).
///
/// These never abort a run; the runtime records them as a failure for the
/// node that raised them.
#[derive(Debug, Error)]
pub enum NodeError {
  /// The node ran and failed.
  #[error("{0}")]
  Failed(String),

  /// No handler exists for this node type.
  #[error("unsupported node type '{0}'")]
  UnsupportedType(String),

  /// The node's config is missing or has a bad value.
  #[error("invalid node config: {0}")]
  InvalidConfig(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("invalid JSON: {0}")]
  Json(#[from] serde_json::Error),
}

impl NodeError {
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed(message.into())
  }

  /// The failure kind recorded for this error.
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::UnsupportedType(_) => ErrorKind::UnsupportedNodeType,
      Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
      Self::Failed(_) | Self::Io(_) | Self::Json(_) => ErrorKind::Execution,
    }
  }
}

/// Error writing to the [`ResultStore`](crate::ResultStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
  #[error("result for node '{node_id}' was already recorded")]
  AlreadyRecorded { node_id: String },
}
