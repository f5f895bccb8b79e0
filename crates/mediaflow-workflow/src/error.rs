use thiserror::Error;

/// Structural problems found before any node runs.
///
/// Any of these refuses the whole run; no partial results are produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
  #[error("connection {from} -> {to} references unknown node '{node_id}'")]
  UnknownNodeReference {
    node_id: String,
    from: String,
    to: String,
  },

  #[error("duplicate node id: {node_id}")]
  DuplicateNodeId { node_id: String },

  #[error("cycle detected in workflow graph at node '{node_id}'")]
  CyclicGraph { node_id: String },

  #[error("graph cannot be planned, {} node(s) never became ready: {}", .remaining.len(), .remaining.join(", "))]
  UnplannableGraph { remaining: Vec<String> },

  #[error("node not found: {0}")]
  NodeNotFound(String),
}
